//! Per-paper enrichment endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::db::TagKind;
use crate::errors::AppError;
use crate::services::classifier::SuggestedTag;
use crate::services::AppState;

#[derive(Debug, Serialize)]
pub struct SuggestTagsResponse {
    pub candidates: Vec<SuggestedTag>,
}

#[instrument(skip(state))]
pub async fn suggest_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuggestTagsResponse>, AppError> {
    let candidates = state.enrich_service.suggest_tags(id).await?;
    Ok(Json(SuggestTagsResponse { candidates }))
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[instrument(skip(state))]
pub async fn generate_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryResponse>, AppError> {
    let summary = state.enrich_service.generate_summary(id).await?;
    Ok(Json(SummaryResponse { summary }))
}

#[derive(Debug, Deserialize)]
pub struct AddTagRequest {
    #[serde(default)]
    pub tag_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: TagKind,
}

#[instrument(skip(state, payload))]
pub async fn add_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddTagRequest>,
) -> Result<Json<TagResponse>, AppError> {
    let tag_name = payload
        .tag_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::MissingField("tag_name".to_string()))?;

    let tag = state.enrich_service.add_user_tag(id, tag_name.trim()).await?;
    Ok(Json(TagResponse {
        id: tag.id,
        name: tag.name,
        kind: tag.kind,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RemoveTagRequest {
    #[serde(default)]
    pub tag_id: Option<Uuid>,
}

#[instrument(skip(state, payload))]
pub async fn remove_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveTagRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tag_id = payload
        .tag_id
        .ok_or_else(|| AppError::MissingField("tag_id".to_string()))?;

    state.enrich_service.remove_tag(id, tag_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
