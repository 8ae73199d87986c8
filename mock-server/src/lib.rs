use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

/// Hit counters for the `/flaky` endpoint, keyed by caller-chosen name.
pub type Hits = Arc<RwLock<HashMap<String, u32>>>;

pub fn app() -> Router {
    let hits: Hits = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/status/{code}", any(status))
        .route("/delay/{ms}", get(delay))
        .route("/echo", post(echo).put(echo))
        .route("/headers", any(headers))
        .route("/shapes/{id}", get(shape))
        .route("/flaky/{key}/{failures}", any(flaky))
        .route("/hits/{key}", get(hit_count))
        .with_state(hits)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn delay(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "slept"
}

async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], body)
}

async fn headers(headers: HeaderMap) -> Json<Vec<(String, String)>> {
    Json(
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
    )
}

async fn shape(Path(id): Path<String>) -> Json<Shape> {
    Json(Shape {
        id,
        width: 10,
        height: 20,
    })
}

/// Fails with 503 for the first `failures` hits on `key`, then echoes the body.
async fn flaky(
    State(hits): State<Hits>,
    Path((key, failures)): Path<(String, u32)>,
    body: Bytes,
) -> (StatusCode, Bytes) {
    let hit = {
        let mut hits = hits.write().await;
        let count = hits.entry(key).or_insert(0);
        *count += 1;
        *count
    };
    if hit <= failures {
        (StatusCode::SERVICE_UNAVAILABLE, Bytes::new())
    } else {
        (StatusCode::OK, body)
    }
}

async fn hit_count(State(hits): State<Hits>, Path(key): Path<String>) -> Json<u32> {
    Json(hits.read().await.get(&key).copied().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_serializes_to_json() {
        let shape = Shape {
            id: "abc".to_string(),
            width: 10,
            height: 20,
        };
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["width"], 10);
        assert_eq!(json["height"], 20);
    }

    #[test]
    fn shape_default_is_empty() {
        let shape = Shape::default();
        assert!(shape.id.is_empty());
        assert_eq!((shape.width, shape.height), (0, 0));
    }

    #[test]
    fn shape_rejects_missing_fields() {
        let result: Result<Shape, _> = serde_json::from_str(r#"{"id":"abc"}"#);
        assert!(result.is_err());
    }
}
