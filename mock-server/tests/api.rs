use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, Shape};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn post(uri: &str, content_type: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(body.to_string())
        .unwrap()
}

async fn call(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

// --- status ---

#[tokio::test]
async fn status_returns_requested_code() {
    let resp = call(&app(), get("/status/503")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(resp).await, "status 503");
}

#[tokio::test]
async fn status_rejects_out_of_range_code() {
    let resp = call(&app(), get("/status/99")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- echo ---

#[tokio::test]
async fn echo_returns_body_and_content_type() {
    let resp = call(&app(), post("/echo", "text/plain", "hello")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_bytes(resp).await, "hello");
}

// --- headers ---

#[tokio::test]
async fn headers_lists_request_headers() {
    let request = Request::builder()
        .uri("/headers")
        .header("x-trace", "abc")
        .header("authorization", "Bearer t")
        .body(String::new())
        .unwrap();
    let resp = call(&app(), request).await;
    let headers: Vec<(String, String)> = body_json(resp).await;
    assert!(headers.contains(&("x-trace".to_string(), "abc".to_string())));
    assert!(headers.contains(&("authorization".to_string(), "Bearer t".to_string())));
}

#[tokio::test]
async fn headers_accepts_posts() {
    let resp = call(&app(), post("/headers", "text/plain", "x")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers: Vec<(String, String)> = body_json(resp).await;
    assert!(headers.contains(&("content-type".to_string(), "text/plain".to_string())));
}

// --- shapes ---

#[tokio::test]
async fn shape_uses_path_id() {
    let resp = call(&app(), get("/shapes/abc")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let shape: Shape = body_json(resp).await;
    assert_eq!(
        shape,
        Shape {
            id: "abc".to_string(),
            width: 10,
            height: 20
        }
    );
}

// --- flaky ---

#[tokio::test]
async fn flaky_fails_then_echoes() {
    let app = app();
    for _ in 0..2 {
        let resp = call(&app, post("/flaky/k/2", "application/json", r#"{"n":1}"#)).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
    let resp = call(&app, post("/flaky/k/2", "application/json", r#"{"n":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, r#"{"n":1}"#);

    let hits: u32 = body_json(call(&app, get("/hits/k")).await).await;
    assert_eq!(hits, 3);
}

#[tokio::test]
async fn flaky_keys_are_independent() {
    let app = app();
    call(&app, get("/flaky/a/5")).await;
    let hits: u32 = body_json(call(&app, get("/hits/b")).await).await;
    assert_eq!(hits, 0);
}

// --- delay ---

#[tokio::test]
async fn delay_responds_after_sleeping() {
    let start = std::time::Instant::now();
    let resp = call(&app(), get("/delay/20")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    assert_eq!(body_bytes(resp).await, "slept");
}
