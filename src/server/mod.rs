//! HTTP Facade
//!
//! A thin axum layer over the storage engine. Three endpoints, each a
//! direct forward to one store operation:
//!
//! | Method | Path        | Store call | Success          |
//! |--------|-------------|------------|------------------|
//! | POST   | `/kv`       | `put`      | 201, empty body  |
//! | GET    | `/kv/{key}` | `get`      | 200, `{"value"}` |
//! | DELETE | `/kv/{key}` | `delete`   | 204, empty body  |
//!
//! The TTL in a POST body is in seconds (fractional allowed); the store
//! converts to milliseconds at the `put` call site. Request bodies with
//! unknown fields are rejected with 400 so a typoed `"tttl"` fails loudly
//! instead of silently storing a non-expiring entry. Wrong methods on a
//! known path get 405 from axum's method routing.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::storage::{KVStore, StoreError};

/// Body of `POST /kv`. `ttl` is optional and in seconds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PutRequest {
    key: String,
    value: Value,
    #[serde(default)]
    ttl: Option<f64>,
}

/// Body of a successful `GET /kv/{key}`.
#[derive(Debug, Serialize)]
struct GetResponse {
    value: Value,
}

/// Builds the KV router over a shared store handle.
pub fn router(store: Arc<KVStore>) -> Router {
    Router::new()
        .route("/kv", post(put_entry))
        .route("/kv/{key}", get(get_entry).delete(delete_entry))
        .with_state(store)
}

async fn put_entry(
    State(store): State<Arc<KVStore>>,
    payload: Result<Json<PutRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "rejected put request body");
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {}", rejection.body_text()),
            )
                .into_response();
        }
    };

    store.put(request.key, request.value, request.ttl);
    StatusCode::CREATED.into_response()
}

async fn get_entry(State(store): State<Arc<KVStore>>, Path(key): Path<String>) -> Response {
    if key.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "key must not be empty").into_response();
    }

    match store.get(&key) {
        Ok(value) => (StatusCode::OK, Json(GetResponse { value })).into_response(),
        // Absent and expired share the status; the body tells them apart.
        Err(err @ (StoreError::KeyNotFound { .. } | StoreError::Expired { .. })) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn delete_entry(State(store): State<Arc<KVStore>>, Path(key): Path<String>) -> Response {
    if key.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "key must not be empty").into_response();
    }

    // Deleting a missing key is a no-op, so 204 either way.
    store.delete(&key);
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_store() -> Arc<KVStore> {
        // The directory is never touched: these tests exercise the HTTP
        // surface only, and nothing here calls to_disk.
        Arc::new(KVStore::new(3, "unused"))
    }

    fn post_kv(body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/kv")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn test_post_creates_entry() {
        let store = test_store();
        let app = router(Arc::clone(&store));

        let response = app
            .oneshot(post_kv(&json!({"key": "hello", "value": 1})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(body_bytes(response).await.is_empty());
        assert_eq!(store.get("hello").unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_post_converts_ttl_seconds() {
        let store = test_store();
        let app = router(Arc::clone(&store));

        let response = app
            .oneshot(post_kv(&json!({"key": "bye", "value": 2, "ttl": 0.001})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        assert!(matches!(
            store.get("bye").unwrap_err(),
            StoreError::Expired { ttl_ms, .. } if ttl_ms == 1.0
        ));
    }

    #[tokio::test]
    async fn test_post_accepts_null_ttl() {
        let store = test_store();
        let app = router(Arc::clone(&store));

        let response = app
            .oneshot(post_kv(&json!({"key": "k", "value": [1, 2], "ttl": null})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.get("k").unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn test_post_rejects_unknown_fields() {
        let app = router(test_store());

        let response = app.oneshot(post_kv(&json!({"hello": "key"}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_rejects_malformed_json() {
        let app = router(test_store());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/kv")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_to_key_path_is_method_not_allowed() {
        let app = router(test_store());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/kv/hello")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"key": "hello", "value": 1}).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_get_returns_stored_value() {
        let store = test_store();
        store.put("hello", json!(1), None);
        let app = router(store);

        let request = Request::builder()
            .uri("/kv/hello")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"value": 1}));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let app = router(test_store());

        let request = Request::builder()
            .uri("/kv/missing")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("not found"));
    }

    #[tokio::test]
    async fn test_get_expired_key_is_not_found() {
        let store = test_store();
        store.put("bye", json!(2), Some(0.001));
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
        let app = router(store);

        let request = Request::builder()
            .uri("/kv/bye")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("expired"));
    }

    #[tokio::test]
    async fn test_get_blank_key_is_bad_request() {
        let app = router(test_store());

        let request = Request::builder()
            .uri("/kv/%20")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let store = test_store();
        store.put("hello", json!(1), None);
        let app = router(Arc::clone(&store));

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/kv/hello")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.get("hello").is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_no_content() {
        let app = router(test_store());

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/kv/missing")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
