use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use flate2::Compression;
use flate2::write::GzEncoder;
use metricsync::application::collector::CollectorApplication;
use metricsync::config::ServerConfig;
use metricsync::domain::message::{MetricMessage, Verification};
use metricsync::domain::metric::Metric;
use metricsync::interfaces::http::router;
use std::io::Write;
use tower::ServiceExt;

const KEY: &str = "Ayaka";

async fn collector(key: &str) -> Router {
    let config = ServerConfig {
        store_file: String::new(),
        key: key.to_string(),
        ..ServerConfig::default()
    };
    let app = CollectorApplication::build(config).await.unwrap();
    router(app.state())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_counter_accumulates_through_path_updates() {
    let app = collector("").await;

    assert_eq!(send(&app, post("/update/counter/PollCount/10")).await.0, StatusCode::OK);
    assert_eq!(send(&app, post("/update/counter/PollCount/5")).await.0, StatusCode::OK);

    let (status, body) = send(&app, get("/value/counter/PollCount")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "15");
}

#[tokio::test]
async fn test_gauge_value_is_rendered_trimmed() {
    let app = collector("").await;
    send(&app, post("/update/gauge/Alloc/12.133000")).await;
    send(&app, post("/update/gauge/Heap/5")).await;

    assert_eq!(send(&app, get("/value/gauge/Alloc")).await.1, "12.133");
    assert_eq!(send(&app, get("/value/gauge/Heap")).await.1, "5");
}

#[tokio::test]
async fn test_path_update_rejections() {
    let app = collector("").await;

    assert_eq!(
        send(&app, post("/update/histogram/Alloc/1")).await.0,
        StatusCode::NOT_IMPLEMENTED
    );
    assert_eq!(
        send(&app, post("/update/counter/PollCount/1.5")).await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        send(&app, post("/update/gauge/Alloc/abc")).await.0,
        StatusCode::BAD_REQUEST
    );

    send(&app, post("/update/gauge/Alloc/1")).await;
    assert_eq!(
        send(&app, post("/update/counter/Alloc/1")).await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(send(&app, get("/value/gauge/Alloc")).await.1, "1");
}

#[tokio::test]
async fn test_unknown_metric_is_not_found() {
    let app = collector("").await;
    let (status, body) = send(&app, get("/value/gauge/Missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "unknown metric");

    let request = serde_json::json!({ "id": "Missing", "type": "gauge" }).to_string();
    assert_eq!(
        send(&app, post_json("/value/", request)).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_json_update_returns_accumulated_counter() {
    let app = collector("").await;
    let message = serde_json::to_string(&Metric::counter("PollCount", 3).unwrap().to_message())
        .unwrap();

    send(&app, post_json("/update/", message.clone())).await;
    let (status, body) = send(&app, post_json("/update/", message)).await;
    assert_eq!(status, StatusCode::OK);

    let response: MetricMessage = serde_json::from_str(&body).unwrap();
    assert_eq!(response.id, "PollCount");
    assert_eq!(response.delta, Some(6));
}

#[tokio::test]
async fn test_json_update_rejections() {
    let app = collector("").await;

    let missing_delta = serde_json::json!({ "id": "PollCount", "type": "counter" }).to_string();
    assert_eq!(
        send(&app, post_json("/update/", missing_delta)).await.0,
        StatusCode::BAD_REQUEST
    );

    let unknown_kind =
        serde_json::json!({ "id": "Alloc", "type": "summary", "value": 1.0 }).to_string();
    assert_eq!(
        send(&app, post_json("/update/", unknown_kind)).await.0,
        StatusCode::NOT_IMPLEMENTED
    );

    assert_eq!(
        send(&app, post_json("/update/", "{ not json".to_string())).await.0,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_signed_exchange() {
    let app = collector(KEY).await;

    let signed = Metric::gauge("RandomValue", 2.27)
        .unwrap()
        .to_message()
        .signed_with(Some(KEY))
        .unwrap();
    assert_eq!(
        signed.hash,
        "ceb416f4ef87553a09a82f2909bbbaffd2eff26d1b7c4a29bb61ea38433876d2"
    );

    let (status, body) = send(&app, post_json("/update/", serde_json::to_string(&signed).unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    let response: MetricMessage = serde_json::from_str(&body).unwrap();
    assert_eq!(response.verify(KEY).unwrap(), Verification::Valid);

    let lookup = serde_json::json!({ "id": "RandomValue", "type": "gauge" }).to_string();
    let (status, body) = send(&app, post_json("/value/", lookup)).await;
    assert_eq!(status, StatusCode::OK);
    let response: MetricMessage = serde_json::from_str(&body).unwrap();
    assert_eq!(response.value, Some(2.27));
    assert_eq!(response.hash, signed.hash);
}

#[tokio::test]
async fn test_hash_mismatch_is_rejected() {
    let app = collector(KEY).await;
    let mut message = Metric::counter("PollCount", 10).unwrap().to_message();
    message.sign("Ayayaka").unwrap();

    let (status, _) = send(&app, post_json("/update/", serde_json::to_string(&message).unwrap())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        send(&app, get("/value/counter/PollCount")).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_batch_update() {
    let app = collector(KEY).await;
    let batch: Vec<MetricMessage> = [
        Metric::counter("PollCount", 10).unwrap(),
        Metric::gauge("RandomValue", 2.27).unwrap(),
    ]
    .iter()
    .map(|metric| metric.to_message().signed_with(Some(KEY)).unwrap())
    .collect();
    assert_eq!(
        batch[0].hash,
        "566384d8026a5429fcc20ccac3248f014da91cb8fbfe8cd47883088c1741b0eb"
    );

    let response = app
        .clone()
        .oneshot(post_json("/updates/", serde_json::to_string(&batch).unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"[]");

    assert_eq!(send(&app, get("/value/counter/PollCount")).await.1, "10");
    assert_eq!(send(&app, get("/value/gauge/RandomValue")).await.1, "2.27");
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let app = collector("").await;
    let batch = serde_json::json!([
        { "id": "Good", "type": "counter", "delta": 1 },
        { "id": "Bad", "type": "counter" }
    ])
    .to_string();

    assert_eq!(
        send(&app, post_json("/updates/", batch)).await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        send(&app, get("/value/counter/Good")).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_gzip_request_body_is_accepted() {
    let app = collector("").await;
    let message = serde_json::to_vec(&Metric::gauge("Alloc", 7.5).unwrap().to_message()).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&message).unwrap();
    let compressed = encoder.finish().unwrap();

    let request = Request::post("/update/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(compressed))
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::OK);
    assert_eq!(send(&app, get("/value/gauge/Alloc")).await.1, "7.5");
}

#[tokio::test]
async fn test_listing_and_ping() {
    let app = collector("").await;
    send(&app, post("/update/counter/PollCount/4")).await;

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("PollCount"));

    assert_eq!(
        send(&app, get("/ping")).await.0,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
