//! Import endpoint routes.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use larder_engine::EntityKind;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::handlers::{handle_import, ImportRequest, ImportResponse, RunContext};
use crate::AppState;

/// Create import routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/import/{kind}", post(import_handler))
}

/// POST /import/{kind} - Reconcile batches of one entity kind.
async fn import_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>> {
    let kind: EntityKind = kind
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown entity kind '{}'", kind)))?;
    tracing::debug!(caller = auth.label(), "Import request for {}", kind);

    let ctx = RunContext::new(state.store.clone(), &state.config);
    let response = handle_import(&ctx, kind, request).await?;
    Ok(Json(response))
}
