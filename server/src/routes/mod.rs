//! HTTP route definitions.

mod health;
mod import;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new().merge(health::routes()).merge(import::routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{EntityStore, MemoryStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use larder_engine::{Entity, EntityFields, EntityKind};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(store: Arc<MemoryStore>, secret: Option<&str>) -> Router {
        let config = Config {
            auth_secret: secret.map(str::to_string),
            ..Config::default()
        };
        let store: Arc<dyn EntityStore> = store;
        create_routes().with_state(AppState {
            store,
            config: Arc::new(config),
        })
    }

    fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn units(records: Value) -> Value {
        json!({
            "batches": [{
                "source": "units.json",
                "document": {"kind": "units", "schemaVersion": 1, "records": records}
            }]
        })
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let response = app(Arc::new(MemoryStore::new()), None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn import_creates_units() {
        let store = Arc::new(MemoryStore::new());
        let response = app(store.clone(), None)
            .oneshot(post(
                "/import/units",
                None,
                units(json!([{"name": "teaspoon", "abbreviation": "tsp"}])),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["outcome"], "success");
        assert_eq!(body["stats"]["created"], 1);
        assert_eq!(body["decisions"][0]["action"], "create");
        assert_eq!(store.snapshot(EntityKind::Unit).len(), 1);
    }

    #[tokio::test]
    async fn secret_requires_bearer_token() {
        let store = Arc::new(MemoryStore::new());
        let body = units(json!([{"name": "teaspoon"}]));

        let missing = app(store.clone(), Some("s3cret"))
            .oneshot(post("/import/units", None, body.clone()))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app(store.clone(), Some("s3cret"))
            .oneshot(post("/import/units", Some("guess"), body.clone()))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let ok = app(store.clone(), Some("s3cret"))
            .oneshot(post("/import/units", Some("s3cret"), body))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn conflicts_return_409_with_details() {
        let store = Arc::new(MemoryStore::new());
        let response = app(store.clone(), None)
            .oneshot(post(
                "/import/units",
                None,
                units(json!([
                    {"name": "teaspoon", "abbreviation": "t"},
                    {"name": "tablespoon", "abbreviation": "T"}
                ])),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = read_json(response).await;
        assert_eq!(body["conflicts"][0]["key"], "t");
        assert_eq!(body["conflicts"][0]["scope"], "withinFile");
        assert!(store.snapshot(EntityKind::Unit).is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_is_404() {
        let response = app(Arc::new(MemoryStore::new()), None)
            .oneshot(post("/import/spices", None, units(json!([]))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mismatched_document_is_422() {
        let response = app(Arc::new(MemoryStore::new()), None)
            .oneshot(post("/import/foods", None, units(json!([]))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn mirror_dry_run_lists_pending_deletions() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            EntityKind::Unit,
            Entity::new("u-1", EntityFields::named("pinch")),
        );

        let mut body = units(json!([{"name": "teaspoon"}]));
        body["mode"] = json!("mirror");
        body["dryRun"] = json!(true);

        let response = app(store.clone(), None)
            .oneshot(post("/import/units", None, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["pendingDeletions"][0]["id"], "u-1");
        assert_eq!(body["stats"]["deleted"], 0);
        assert_eq!(store.snapshot(EntityKind::Unit).len(), 1);
    }
}
