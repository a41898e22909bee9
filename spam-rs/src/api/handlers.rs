//! API handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use crate::ensemble::{EnsembleVerdict, Label, MemberResults, ModelId};
use crate::pipeline::{PredictionPipeline, StatsSnapshot};

/// Shared state
pub struct AppState {
    pub pipeline: Arc<PredictionPipeline>,
}

/// Prediction request
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub content: String,
}

/// Prediction response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: Label,
    pub is_spam: bool,
    pub confidence: f64,
    pub spam_score: f64,
    pub members_available: usize,
    pub spam_votes: usize,
    /// One entry per configured classifier, in configuration order
    pub detailed_results: MemberResults,
}

impl From<EnsembleVerdict> for PredictResponse {
    fn from(verdict: EnsembleVerdict) -> Self {
        Self {
            prediction: verdict.prediction(),
            is_spam: verdict.is_spam,
            confidence: verdict.confidence,
            spam_score: verdict.spam_score,
            members_available: verdict.members_available,
            spam_votes: verdict.spam_votes,
            detailed_results: verdict.member_results,
        }
    }
}

/// One configured classifier
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: ModelId,
    pub kind: &'static str,
    pub weight: f64,
}

/// Ensemble configuration as served by GET /models
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub threshold: f64,
    pub classifier_timeout_ms: u64,
    pub models: Vec<ModelInfo>,
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Spam Email Detection API is running" }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "spam-rs",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /predict - Classify one email
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(req) = payload?;
    let verdict = state.pipeline.predict(&req.content).await?;
    Ok(Json(PredictResponse::from(verdict)))
}

/// GET /models
pub async fn models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let config = state.pipeline.config();

    let models = config
        .members()
        .iter()
        .zip(state.pipeline.classifiers())
        .map(|(member, classifier)| ModelInfo {
            id: member.id.clone(),
            kind: classifier.kind(),
            weight: member.weight,
        })
        .collect();

    Json(ModelsResponse {
        threshold: config.threshold(),
        classifier_timeout_ms: config.classifier_timeout().as_millis() as u64,
        models,
    })
}

/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.pipeline.stats())
}
