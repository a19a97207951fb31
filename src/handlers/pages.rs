// src/handlers/pages.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedCompany,
    models::facebook::{ConnectPagePayload, FacebookPage},
};

#[utoipa::path(
    get,
    path = "/api/pages",
    tag = "Páginas do Facebook",
    responses(
        (status = 200, description = "Páginas conectadas", body = Vec<FacebookPage>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_pages(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
) -> Result<Json<Vec<FacebookPage>>, AppError> {
    let pages = app_state.page_service.list(company.id).await?;
    Ok(Json(pages))
}

// O token é validado na Graph API antes de gravar
#[utoipa::path(
    post,
    path = "/api/pages",
    tag = "Páginas do Facebook",
    request_body = ConnectPagePayload,
    responses(
        (status = 201, description = "Página conectada", body = FacebookPage),
        (status = 400, description = "Token de página inválido"),
        (status = 409, description = "Página já ligada a outra empresa")
    ),
    security(("api_jwt" = []))
)]
pub async fn connect_page(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Json(payload): Json<ConnectPagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let page = app_state
        .page_service
        .connect(company.id, payload.access_token.trim())
        .await?;

    Ok((StatusCode::CREATED, Json(page)))
}

#[utoipa::path(
    post,
    path = "/api/pages/{id}/subscribe",
    tag = "Páginas do Facebook",
    params(("id" = Uuid, Path, description = "ID interno da página")),
    responses(
        (status = 200, description = "Webhook assinado", body = FacebookPage),
        (status = 404, description = "Página não encontrada"),
        (status = 502, description = "Falha na Graph API")
    ),
    security(("api_jwt" = []))
)]
pub async fn subscribe_page(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(id): Path<Uuid>,
) -> Result<Json<FacebookPage>, AppError> {
    let page = app_state.page_service.subscribe(company.id, id).await?;
    Ok(Json(page))
}

#[utoipa::path(
    delete,
    path = "/api/pages/{id}",
    tag = "Páginas do Facebook",
    params(("id" = Uuid, Path, description = "ID interno da página")),
    responses(
        (status = 204, description = "Página desconectada"),
        (status = 404, description = "Página não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn disconnect_page(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.page_service.disconnect(company.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
