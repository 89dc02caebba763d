use aqmon_backend::config::AppConfig;
use aqmon_backend::module::dispatcher::{DispatchOutcome, Interaction};
use aqmon_backend::module::feed::{HttpPageFetcher, PageFetcher};
use aqmon_backend::module::geolocation::ConfiguredLocation;
use aqmon_backend::module::sync::SyncOutcome;
use aqmon_backend::service::AppState;

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn datastream(station_id: &str, city: &str, lng: f64, lat: f64, result: serde_json::Value) -> serde_json::Value {
    json!({
        "@iot.id": 1,
        "Thing": {
            "name": format!("Station {}", station_id),
            "properties": { "stationID": station_id, "city": city },
            "Locations": [ { "location": { "coordinates": [lng, lat] } } ]
        },
        "Observations": [ { "result": result, "phenomenonTime": "2026-05-01T00:00:00Z" } ]
    })
}

async fn first_page(State(addr): State<SocketAddr>) -> impl IntoResponse {
    axum::Json(json!({
        "value": [
            datastream("A", "Taipei", 121.5, 25.0, json!(12)),
            datastream("B", "Taipei", 121.6, 25.1, json!("88.5")),
        ],
        "@iot.nextLink": format!("http://{}/page2", addr)
    }))
}

async fn second_page() -> impl IntoResponse {
    axum::Json(json!({ "value": [ datastream("C", "Tainan", 120.2, 23.0, serde_json::Value::Null) ] }))
}

async fn server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn garbage() -> impl IntoResponse {
    "<html>not a feed</html>"
}

async fn stalled() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(3)).await;
    axum::Json(json!({ "value": [] }))
}

async fn spawn_feed() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/page1", get(first_page))
        .route("/page2", get(second_page))
        .route("/fail", get(server_error))
        .route("/garbage", get(garbage))
        .route("/stalled", get(stalled))
        .with_state(addr);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher() -> HttpPageFetcher {
    HttpPageFetcher::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetch_page_reports_next_link() {
    let addr = spawn_feed().await;

    let page = fetcher().fetch_page(&format!("http://{}/page1", addr)).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[1].value, Some(88.5));
    assert_eq!(page.next, Some(format!("http://{}/page2", addr)));

    let last = fetcher().fetch_page(&format!("http://{}/page2", addr)).await.unwrap();
    assert_eq!(last.records[0].value, None);
    assert!(last.next.is_none());
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let addr = spawn_feed().await;
    let err = fetcher().fetch_page(&format!("http://{}/fail", addr)).await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn unparseable_body_is_format_error() {
    let addr = spawn_feed().await;
    let err = fetcher().fetch_page(&format!("http://{}/garbage", addr)).await.unwrap_err();
    assert!(err.is_format());
}

#[tokio::test]
async fn slow_feed_times_out_as_transport_error() {
    let addr = spawn_feed().await;
    let fetcher = HttpPageFetcher::new(Duration::from_millis(200)).unwrap();

    let err = fetcher.fetch_page(&format!("http://{}/stalled", addr)).await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("timed out"), "unexpected error: {}", err);
}

#[tokio::test]
async fn full_sync_over_http() {
    let addr = spawn_feed().await;
    let mut config = AppConfig::default();
    config.feed.initial_url = Some(format!("http://{}/page1", addr));
    let state = AppState::build(&config, Arc::new(fetcher()), Arc::new(ConfiguredLocation::default()));

    let outcome = state.dispatcher.dispatch(Interaction::Refresh).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Synced(SyncOutcome::Completed { pages: 2, records: 3 })
    );

    let view = state.dashboard.view();
    assert_eq!(view.markers.len(), 3);
    assert_eq!(view.region_options, ["Tainan", "Taipei"]);
}
