// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::company::{AuthResponse, LoginPayload, RegisterCompanyPayload},
};

// Handler de registro
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Autenticação",
    request_body = RegisterCompanyPayload,
    responses(
        (status = 201, description = "Empresa registrada", body = AuthResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "E-mail já existe")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterCompanyPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let token = app_state
        .auth_service
        .register_company(payload.name.trim(), payload.email.trim(), &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token })))
}

// Handler de login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Autenticação",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Login bem-sucedido", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas"),
        (status = 403, description = "Empresa suspensa")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let token = app_state
        .auth_service
        .login(payload.email.trim(), &payload.password)
        .await?;

    Ok(Json(AuthResponse { token }))
}
