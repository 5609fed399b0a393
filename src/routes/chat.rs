use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::PaperWithTags;
use crate::errors::AppError;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<PaperWithTags>,
}

#[derive(Debug, Serialize)]
pub struct ChatFailure {
    pub success: bool,
    pub message: String,
}

#[instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.query.trim().is_empty() {
        return Err(AppError::ValidationError(
            "query must not be empty".to_string(),
        ));
    }

    match state.chat_service.chat(&payload.query).await {
        Ok(reply) => Ok(Json(ChatResponse {
            success: true,
            answer: reply.answer,
            sources: reply.sources,
        })
        .into_response()),
        Err(e) => {
            tracing::error!(error = %e, "Chat failed");
            Ok(Json(ChatFailure {
                success: false,
                message: "Failed to answer the question".to_string(),
            })
            .into_response())
        }
    }
}
