// src/handlers/companies.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedCompany,
    models::company::{Company, CompanyStats, UpdateCompanyPayload},
};

#[utoipa::path(
    get,
    path = "/api/companies/me",
    tag = "Empresa",
    responses(
        (status = 200, description = "Empresa autenticada", body = Company),
        (status = 401, description = "Token inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedCompany(company): AuthenticatedCompany) -> Json<Company> {
    Json(company)
}

#[utoipa::path(
    put,
    path = "/api/companies/me",
    tag = "Empresa",
    request_body = UpdateCompanyPayload,
    responses(
        (status = 200, description = "Empresa atualizada", body = Company),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_me(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Result<Json<Company>, AppError> {
    payload.validate()?;

    let updated = app_state
        .company_repo
        .update_name(company.id, payload.name.trim())
        .await?;

    Ok(Json(updated))
}

// Os antigos scripts de verificação viraram este endpoint
#[utoipa::path(
    get,
    path = "/api/companies/me/stats",
    tag = "Empresa",
    responses(
        (status = 200, description = "Indicadores da empresa", body = CompanyStats)
    ),
    security(("api_jwt" = []))
)]
pub async fn stats(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
) -> Result<Json<CompanyStats>, AppError> {
    let stats = app_state.company_repo.stats(company.id).await?;
    Ok(Json(stats))
}
