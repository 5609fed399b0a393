use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::instrument;

use crate::services::collection::{AutoCollectionReport, CollectionReport, CollectionRequest};
use crate::services::AppState;

/// Kick off a collection run. Pipeline failures are reported as a
/// structured `success: false` result, never as a bare 5xx.
#[instrument(skip(state, payload))]
pub async fn run_collection(
    State(state): State<AppState>,
    Json(payload): Json<CollectionRequest>,
) -> Json<CollectionReport> {
    match state.collection_service.run_collection(payload).await {
        Ok(report) => Json(report),
        Err(e) => {
            tracing::error!(error = %e, "Collection run failed");
            Json(CollectionReport::failure("Failed to collect papers"))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoCollectRequest {
    #[serde(default, rename = "override")]
    pub overrides: Option<AutoCollectOverride>,
}

#[derive(Debug, Deserialize)]
pub struct AutoCollectOverride {
    pub query: Option<String>,
    pub horizon: Option<String>,
}

/// Auto-collection with preset defaults for daily/on-demand runs. The
/// resolved query and horizon are echoed back alongside the report;
/// failures are already folded into it by the service.
#[instrument(skip(state, payload))]
pub async fn run_auto_collection(
    State(state): State<AppState>,
    Json(payload): Json<AutoCollectRequest>,
) -> Json<AutoCollectionReport> {
    let (query, horizon) = match payload.overrides {
        Some(overrides) => (overrides.query, overrides.horizon),
        None => (None, None),
    };

    Json(
        state
            .collection_service
            .run_auto_collection(query, horizon)
            .await,
    )
}
