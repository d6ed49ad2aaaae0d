//! Embedding settings API endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{EmbeddingSettings, ProviderKind};
use crate::error::ServiceError;

use super::{AppState, UserParams};

/// Settings view without the stored credential
#[derive(Serialize)]
pub struct SettingsResponse {
    pub user_id: String,
    pub provider: ProviderKind,
    pub model_name: String,
    pub has_api_key: bool,
}

impl From<EmbeddingSettings> for SettingsResponse {
    fn from(settings: EmbeddingSettings) -> Self {
        Self {
            user_id: settings.user_id,
            provider: settings.provider,
            model_name: settings.model_name,
            has_api_key: settings.api_key.is_some(),
        }
    }
}

/// Request to update a user's embedding settings
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub user_id: String,
    pub provider: ProviderKind,
    pub model_name: String,
    pub api_key: Option<String>,
}

/// Result of probing a provider/model combination
#[derive(Serialize)]
pub struct TestSettingsResponse {
    pub ok: bool,
    pub message: String,
}

/// Get a user's embedding settings
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserParams>,
) -> Result<Json<SettingsResponse>, ServiceError> {
    let settings = state
        .service
        .db
        .get_embedding_settings(&params.user_id)?
        .ok_or_else(|| ServiceError::Embedding(
            crate::error::EmbeddingError::SettingsMissing {
                user_id: params.user_id.clone(),
            },
        ))?;

    Ok(Json(settings.into()))
}

/// Create or update a user's embedding settings
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ServiceError> {
    let settings = EmbeddingSettings {
        user_id: request.user_id,
        provider: request.provider,
        model_name: request.model_name,
        api_key: request.api_key,
        updated_at: chrono::Utc::now(),
    };

    state.service.db.set_embedding_settings(&settings)?;
    Ok(Json(settings.into()))
}

/// Probe a provider/model combination with the fixed test sentence,
/// without persisting anything.
pub async fn test_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<TestSettingsResponse>, ServiceError> {
    let settings = EmbeddingSettings {
        user_id: request.user_id,
        provider: request.provider,
        model_name: request.model_name,
        api_key: request.api_key,
        updated_at: chrono::Utc::now(),
    };

    let client = state.service.embedding_client(&settings)?;
    let (ok, message) = client.test().await;

    Ok(Json(TestSettingsResponse { ok, message }))
}
