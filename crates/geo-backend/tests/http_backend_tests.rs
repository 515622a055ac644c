//! Tests for the HTTP backend client against an in-process stub service.

use std::net::SocketAddr;

use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use geo_backend::{
    BackendError, CollectionQuery, GeoBackend, HandleKind, HttpBackendConfig, HttpGeoBackend,
    ImageHandle, Reducer, SourceKind, VisParams,
};
use serde_json::{json, Value};
use urban_common::{AreaOfInterest, GradientStyle, LayerStyle};

const TOKEN: &str = "test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

async fn session(headers: HeaderMap) -> StatusCode {
    if authorized(&headers) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn query(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["collection_id"] == "broken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unknown collection"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": format!("img-{}", body["collection_id"].as_str().unwrap_or("")),
            "kind": "raster",
            "bands": body["bands"].clone(),
        })),
    )
}

async fn reduce(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["reducer"], "mean");
    assert_eq!(body["scale"], 30.0);
    Json(json!({"values": {"NDVI": 0.42, "empty": null}}))
}

async fn timeseries() -> Json<Value> {
    Json(json!({"records": [
        {"timestamp": "2023-02-01T00:00:00Z", "values": {"t": 280.0}},
        {"timestamp": "2023-01-01T00:00:00Z", "values": {"t": 275.5}}
    ]}))
}

async fn thumbnail(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"url": format!("https://tiles.example/{}.png", body["handle"]["id"].as_str().unwrap_or(""))}))
}

async fn features() -> Json<Value> {
    Json(json!({"type": "FeatureCollection", "features": []}))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/v1/session", get(session))
        .route("/v1/query", post(query))
        .route("/v1/reduce", post(reduce))
        .route("/v1/timeseries", post(timeseries))
        .route("/v1/thumbnail", post(thumbnail))
        .route("/v1/features", post(features));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, token: Option<&str>) -> HttpGeoBackend {
    HttpGeoBackend::new(HttpBackendConfig {
        base_url: format!("http://{}", addr),
        token: token.map(str::to_string),
        request_timeout_secs: 5,
        connect_timeout_secs: 5,
    })
    .unwrap()
}

fn raster_handle() -> ImageHandle {
    ImageHandle {
        id: "img-1".to_string(),
        kind: HandleKind::Raster,
        bands: vec!["NDVI".to_string()],
    }
}

#[tokio::test]
async fn test_authenticate_with_token() {
    let addr = spawn_stub().await;
    assert!(client(addr, Some(TOKEN)).authenticate().await.is_ok());
}

#[tokio::test]
async fn test_authenticate_rejected_without_token() {
    let addr = spawn_stub().await;
    let err = client(addr, None).authenticate().await.unwrap_err();
    assert!(matches!(err, BackendError::Auth(_)));
}

#[tokio::test]
async fn test_authenticate_unreachable_is_connection_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, Some(TOKEN)).authenticate().await.unwrap_err();
    assert!(matches!(err, BackendError::Connection(_)));
}

#[tokio::test]
async fn test_query_returns_handle() {
    let addr = spawn_stub().await;
    let backend = client(addr, Some(TOKEN));
    let query = CollectionQuery::new(
        "COPERNICUS/S2_SR_HARMONIZED",
        SourceKind::ImageCollection,
        AreaOfInterest::erbil().geometry(),
    )
    .with_bands(["B8", "B4"]);

    let handle = backend.query(&query).await.unwrap();
    assert_eq!(handle.id, "img-COPERNICUS/S2_SR_HARMONIZED");
    assert_eq!(handle.kind, HandleKind::Raster);
    assert_eq!(handle.bands, vec!["B8", "B4"]);
}

#[tokio::test]
async fn test_query_error_status_is_query_error() {
    let addr = spawn_stub().await;
    let query = CollectionQuery::new(
        "broken",
        SourceKind::Image,
        AreaOfInterest::erbil().geometry(),
    );
    let err = client(addr, Some(TOKEN)).query(&query).await.unwrap_err();
    match err {
        BackendError::Query { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("unknown collection"));
        }
        other => panic!("expected Query error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reduce_region_keeps_null_values() {
    let addr = spawn_stub().await;
    let values = client(addr, Some(TOKEN))
        .reduce_region(
            &raster_handle(),
            Reducer::Mean,
            &AreaOfInterest::erbil().geometry(),
            30.0,
        )
        .await
        .unwrap();
    assert_eq!(values.get("NDVI"), Some(&Some(0.42)));
    assert_eq!(values.get("empty"), Some(&None));
}

#[tokio::test]
async fn test_time_series_records_decode() {
    let addr = spawn_stub().await;
    let records = client(addr, Some(TOKEN))
        .region_time_series(&raster_handle(), &AreaOfInterest::erbil().geometry(), 30.0)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].values.get("t"), Some(&Some(275.5)));
}

#[tokio::test]
async fn test_render_thumbnail_and_features() {
    let addr = spawn_stub().await;
    let backend = client(addr, Some(TOKEN));
    let vis = VisParams::from_style(&LayerStyle::Gradient(GradientStyle::ndvi()), Some("NDVI"), 512);

    let url = backend
        .render_thumbnail(&raster_handle(), &vis, &AreaOfInterest::erbil().geometry())
        .await
        .unwrap();
    assert_eq!(url, "https://tiles.example/img-1.png");

    let features = backend.fetch_features(&raster_handle()).await.unwrap();
    assert_eq!(features["type"], "FeatureCollection");
}
