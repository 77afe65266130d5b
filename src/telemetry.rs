//! Consumption readings and the wire shapes used to deliver them.

use chrono::NaiveDateTime;
use reqwest::Url;
use serde::Serialize;

use crate::devices::{NodeType, WaveNode};

/// Query parameter of a node endpoint that identifies the hookup.
pub const HOOKUP_ID_PARAM: &str = "smart_furniture_hookup_id";

/// Timestamp format expected by device endpoints.
pub const DEVICE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One consumption sample for one node at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub node_id: String,
    pub node_name: String,
    pub node_type: NodeType,
    /// Hookup identifier parsed from the endpoint query string.
    pub hookup_id: String,
    /// Consumption at `timestamp` (>= 0).
    pub consumption: f64,
    pub username: Option<String>,
    /// Destination URL configured on the node.
    pub endpoint: String,
    pub timestamp: NaiveDateTime,
}

impl Reading {
    /// Builds the reading for `node` at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the endpoint is not a URL or
    /// lacks a non-empty `smart_furniture_hookup_id` parameter.
    pub fn for_node(node: &WaveNode, timestamp: NaiveDateTime) -> Result<Self, String> {
        let hookup_id = hookup_id(&node.endpoint)?;
        Ok(Self {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            node_type: node.node_type,
            hookup_id,
            consumption: node.real_time_consumption,
            username: node.assigned_user.clone(),
            endpoint: node.endpoint.clone(),
            timestamp,
        })
    }
}

/// Extracts the hookup identifier from a node endpoint URL.
///
/// The decoded identifier must be non-empty and free of control characters.
pub fn hookup_id(endpoint: &str) -> Result<String, String> {
    let url = Url::parse(endpoint.trim()).map_err(|e| format!("invalid endpoint URL: {e}"))?;
    let id = url
        .query_pairs()
        .find(|(key, _)| key == HOOKUP_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("endpoint has no `{HOOKUP_ID_PARAM}` query parameter"))?;
    // a decoded newline would split a line-protocol record in two
    if id.chars().any(char::is_control) {
        return Err(format!("`{HOOKUP_ID_PARAM}` contains control characters"));
    }
    Ok(id)
}

/// JSON body POSTed to a device endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRequest {
    pub real_time_consumption: f64,
    pub username: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

impl From<&Reading> for NodeRequest {
    fn from(r: &Reading) -> Self {
        Self {
            real_time_consumption: r.consumption,
            username: r.username.clone(),
            timestamp: r.timestamp.format(DEVICE_TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Record written to the time-series sink.
#[derive(Debug, Clone, Serialize)]
pub struct SinkRecord {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub smart_furniture_hookup_id: String,
    pub real_time_consumption: f64,
    /// ISO-8601 with a trailing `Z`.
    pub timestamp: String,
    #[serde(skip)]
    pub epoch_secs: i64,
}

impl From<&Reading> for SinkRecord {
    fn from(r: &Reading) -> Self {
        let utc = r.timestamp.and_utc();
        Self {
            node_type: r.node_type,
            smart_furniture_hookup_id: r.hookup_id.clone(),
            real_time_consumption: r.consumption,
            timestamp: utc.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            epoch_secs: utc.timestamp(),
        }
    }
}

impl SinkRecord {
    /// Encodes the record as one line of InfluxDB line protocol with
    /// second precision.
    ///
    /// ```
    /// use waveslab_sim::devices::NodeType;
    /// use waveslab_sim::telemetry::SinkRecord;
    ///
    /// let record = SinkRecord {
    ///     node_type: NodeType::Water,
    ///     smart_furniture_hookup_id: "abc-1".to_string(),
    ///     real_time_consumption: 2.5,
    ///     timestamp: "1970-01-01T00:01:40Z".to_string(),
    ///     epoch_secs: 100,
    /// };
    /// assert_eq!(record.line_protocol(), "WATER,smartFurnitureHookupID=abc-1 value=2.5 100");
    /// ```
    pub fn line_protocol(&self) -> String {
        format!(
            "{},smartFurnitureHookupID={} value={:?} {}",
            self.node_type.as_str(),
            escape_tag(&self.smart_furniture_hookup_id),
            self.real_time_consumption,
            self.epoch_secs
        )
    }
}

/// Escapes commas, equals signs and spaces in a line-protocol tag value.
fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
