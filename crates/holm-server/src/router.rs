use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Holm endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/documents",
            get(handler::list_documents).post(handler::create_document),
        )
        .route("/api/documents/:cid", get(handler::fetch_payload))
        .route("/v1/health", get(handler::health))
        .route("/v1/info", get(handler::info))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use holm_db::Database;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let state = AppState {
            db: Arc::new(Database::in_memory()),
        };
        build_router(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let response = app().oneshot(get_req("/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn info_reports_database_counters() {
        let response = app().oneshot(get_req("/v1/info")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let info = body_json(response).await;
        assert_eq!(info["name"], "holm-server");
        assert_eq!(info["stats"]["documents"], 0);
        assert!(info["author"].is_string());
    }

    #[tokio::test]
    async fn create_then_list_documents() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/documents",
                r#"{"doc":{"title":"first post","views":3}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["cid"].as_str().unwrap().len(), 64);
        assert!(!created["key"].as_str().unwrap().is_empty());

        let response = app.oneshot(get_req("/api/documents")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["value"]["title"], "first post");
        assert_eq!(listed[0]["value"]["views"], 3);
    }

    #[tokio::test]
    async fn create_with_explicit_key() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/documents",
                r#"{"doc":{"n":1},"key":"pinned"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["key"], "pinned");

        let listed = body_json(app.oneshot(get_req("/api/documents")).await.unwrap()).await;
        assert_eq!(listed[0]["key"], "pinned");
    }

    #[tokio::test]
    async fn fetch_payload_by_content_id() {
        let app = app();
        let created = body_json(
            app.clone()
                .oneshot(post_json("/api/documents", r#"{"doc":{"x":true}}"#))
                .await
                .unwrap(),
        )
        .await;
        let cid = created["cid"].as_str().unwrap();

        let response = app
            .oneshot(get_req(&format!("/api/documents/{cid}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["x"], true);
    }

    #[tokio::test]
    async fn unknown_content_id_is_404() {
        let missing = "ab".repeat(32);
        let response = app()
            .oneshot(get_req(&format!("/api/documents/{missing}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_content_id_is_400() {
        let response = app()
            .oneshot(get_req("/api/documents/not-a-cid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_without_doc_field_is_rejected() {
        let response = app()
            .oneshot(post_json("/api/documents", r#"{"body":"nope"}"#))
            .await
            .unwrap();
        // Axum rejects the body before the handler runs.
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn document_lifecycle_end_to_end() {
        // The server shares its database with the embedding process, so the
        // delete leg goes through the handle rather than a route.
        let db = Arc::new(Database::in_memory());
        let app = build_router(AppState { db: Arc::clone(&db) });

        let created = body_json(
            app.clone()
                .oneshot(post_json("/api/documents", r#"{"doc":{"name":"alice"}}"#))
                .await
                .unwrap(),
        )
        .await;
        let cid = created["cid"].as_str().unwrap().to_string();
        let key = created["key"].as_str().unwrap().to_string();

        let fetched = body_json(
            app.clone()
                .oneshot(get_req(&format!("/api/documents/{cid}")))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(fetched["name"], "alice");

        let listed =
            body_json(app.clone().oneshot(get_req("/api/documents")).await.unwrap()).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["key"], key);

        db.delete(&key).await.unwrap();
        assert!(db.all().await.unwrap().is_empty());

        let listed = body_json(app.oneshot(get_req("/api/documents")).await.unwrap()).await;
        assert_eq!(listed.as_array().unwrap().len(), 0);
    }
}
