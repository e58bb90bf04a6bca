//! Content handlers standing in for the site behind the gate.

use crate::access::middleware::AppState;
use crate::error::AppError;
use crate::models::ContentEntity;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
};

/// GET /node/{id}: Render node `{content_dir}/node/{id}.html`
///
/// The response carries the rendered [`ContentEntity`] so the gate can check
/// rules written against `/node/{id}`.
pub async fn node(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, AppError> {
    let file = state
        .config
        .content_dir
        .join("node")
        .join(format!("{}.html", id));

    let body = tokio::fs::read_to_string(&file).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::NotFound("Node not found".to_string()),
        _ => AppError::Internal(format!("Failed to read {}: {}", file.display(), e)),
    })?;

    let mut response = Html(body).into_response();
    response.extensions_mut().insert(ContentEntity::node(id));
    Ok(response)
}
