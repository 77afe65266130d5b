//! Integration tests for the HTTP transports against an in-process server.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;

use waveslab_sim::config::SinkConfig;
use waveslab_sim::telemetry::Reading;
use waveslab_sim::transport::{DeliveryOutcome, HttpEndpointTransport, InfluxSink, Transport};

use common::{at, kitchen_faucet};

/// Requests seen by the test server: (authorization, query, body).
type Seen = Arc<Mutex<Vec<(String, String, String)>>>;

async fn record(
    State(seen): State<Seen>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: String,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push((auth, query.unwrap_or_default(), body));
    StatusCode::NO_CONTENT
}

async fn fail() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::NO_CONTENT
}

async fn spawn_server() -> (SocketAddr, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/ok", post(record))
        .route("/fail", post(fail))
        .route("/slow", post(slow))
        .route("/api/v2/write", post(record))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (addr, seen)
}

fn reading_for(url: String) -> Reading {
    let node = kitchen_faucet().with_endpoint(url);
    Reading::for_node(&node, at(6, 30, 5)).expect("reading")
}

fn device_url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}?smart_furniture_hookup_id=hookup-faucet")
}

#[tokio::test]
async fn no_content_is_delivered_with_json_body() {
    let (addr, seen) = spawn_server().await;
    let transport = HttpEndpointTransport::new(Duration::from_secs(2)).expect("transport");

    let outcome = transport.deliver(&reading_for(device_url(addr, "/ok"))).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    let seen = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, "smart_furniture_hookup_id=hookup-faucet");
    let body: serde_json::Value = serde_json::from_str(&seen[0].2).expect("json body");
    assert_eq!(body["realTimeConsumption"], 2.5);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["timestamp"], "2025-10-01 06:30:05");
}

#[tokio::test]
async fn server_error_is_rejected() {
    let (addr, _) = spawn_server().await;
    let transport = HttpEndpointTransport::new(Duration::from_secs(2)).expect("transport");

    let outcome = transport.deliver(&reading_for(device_url(addr, "/fail"))).await;

    assert_eq!(outcome, DeliveryOutcome::Rejected(500));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let (addr, _) = spawn_server().await;
    let transport = HttpEndpointTransport::new(Duration::from_millis(200)).expect("transport");

    let outcome = transport.deliver(&reading_for(device_url(addr, "/slow"))).await;

    assert_eq!(outcome, DeliveryOutcome::TimedOut);
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let transport = HttpEndpointTransport::new(Duration::from_secs(2)).expect("transport");

    let outcome = transport.deliver(&reading_for(device_url(addr, "/ok"))).await;

    assert!(matches!(outcome, DeliveryOutcome::Network(_)), "got {outcome:?}");
}

#[tokio::test]
async fn closed_transport_refuses_new_deliveries() {
    let (addr, seen) = spawn_server().await;
    let transport = HttpEndpointTransport::new(Duration::from_secs(2)).expect("transport");
    transport.close();
    transport.close();

    let outcome = transport.deliver(&reading_for(device_url(addr, "/ok"))).await;

    assert!(matches!(outcome, DeliveryOutcome::Network(_)));
    assert!(seen.lock().unwrap_or_else(PoisonError::into_inner).is_empty());
}

#[tokio::test]
async fn influx_sink_writes_line_protocol() {
    let (addr, seen) = spawn_server().await;
    let sink = SinkConfig {
        url: format!("http://{addr}"),
        token: "secret".to_string(),
        org: "waves".to_string(),
        bucket: "household".to_string(),
    };
    let transport = InfluxSink::new(&sink, Duration::from_secs(2)).expect("sink");
    let reading = reading_for(device_url(addr, "/ignored"));

    let outcome = transport.deliver(&reading).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    let seen = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(seen.len(), 1);
    let (auth, query, body) = &seen[0];
    assert_eq!(auth, "Token secret");
    assert_eq!(query, "org=waves&bucket=household&precision=s");
    let epoch = at(6, 30, 5).and_utc().timestamp();
    assert_eq!(body, &format!("WATER,smartFurnitureHookupID=hookup-faucet value=2.5 {epoch}"));
}
