//! Plain-text tables printed by the CLI.

use std::fmt::Write;

use crate::devices::{VirtualUser, WaveNode};

const RULE_WIDTH: usize = 60;

/// One line per node: bracketed id, status and name.
pub fn status_table(nodes: &[WaveNode]) -> String {
    table(nodes, |n| {
        format!("{:<30} {:3} - {}", format!("[{}]", n.id), n.status.as_str(), n.name)
    })
}

/// Like [`status_table`], prefixed with the endpoint tail, utility initial
/// and current consumption.
pub fn info_table(nodes: &[WaveNode]) -> String {
    table(nodes, info_line)
}

fn info_line(n: &WaveNode) -> String {
    let tail_start = n
        .endpoint
        .char_indices()
        .rev()
        .nth(1)
        .map_or(0, |(i, _)| i);
    let initial = n.node_type.as_str().chars().next().unwrap_or('?');
    format!(
        "[{}] [{} - {:<6}] {:<30} {:3} - {}",
        &n.endpoint[tail_start..],
        initial,
        n.real_time_consumption,
        format!("[{}]", n.id),
        n.status.as_str(),
        n.name
    )
}

fn table(nodes: &[WaveNode], line: impl Fn(&WaveNode) -> String) -> String {
    if nodes.is_empty() {
        return "No WaveNodes found.".to_string();
    }
    let mut out = String::from("WaveNodes:\n");
    out.push_str(&"-".repeat(RULE_WIDTH));
    for node in nodes {
        let _ = write!(out, "\n{}", line(node));
    }
    out
}

/// Username list, one per line.
pub fn users_table(users: &[VirtualUser]) -> String {
    if users.is_empty() {
        return "No VirtualUsers found.".to_string();
    }
    let mut out = String::from("Virtual Users:\n");
    out.push_str(&"-".repeat(30));
    for user in users {
        let _ = write!(out, "\n  {}", user.username);
    }
    out
}
