// src/handlers/gemini.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedCompany,
    models::gemini::{GeminiSettingsView, UpdateGeminiSettingsPayload},
};

#[utoipa::path(
    get,
    path = "/api/gemini-settings",
    tag = "Assistente",
    responses(
        (status = 200, description = "Configuração do Gemini (chave mascarada)", body = GeminiSettingsView),
        (status = 404, description = "Empresa ainda não configurou o Gemini")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_settings(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
) -> Result<Json<GeminiSettingsView>, AppError> {
    let settings = app_state
        .gemini_settings_repo
        .get(company.id)
        .await?
        .ok_or(AppError::NotFound("Configuração do Gemini"))?;

    Ok(Json(settings.into()))
}

#[utoipa::path(
    put,
    path = "/api/gemini-settings",
    tag = "Assistente",
    request_body = UpdateGeminiSettingsPayload,
    responses(
        (status = 200, description = "Configuração salva", body = GeminiSettingsView),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_settings(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Json(payload): Json<UpdateGeminiSettingsPayload>,
) -> Result<Json<GeminiSettingsView>, AppError> {
    payload.validate()?;

    let settings = app_state
        .gemini_settings_repo
        .upsert(company.id, &payload, &app_state.config.gemini_default_model)
        .await?;

    tracing::info!("🤖 Configuração do Gemini atualizada para a empresa {}", company.id);
    Ok(Json(settings.into()))
}
