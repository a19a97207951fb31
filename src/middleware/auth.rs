// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{common::error::AppError, config::AppState, models::company::Company};

// O middleware em si: valida o JWT e pendura a empresa na requisição
pub async fn auth_guard(
    State(app_state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Cabeçalho ausente ou malformado é tratado como token inválido (401)
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::InvalidToken)?;
    let company = app_state.auth_service.validate_token(bearer.token()).await?;

    // Insere a empresa nos "extensions" da requisição
    request.extensions_mut().insert(company);
    Ok(next.run(request).await)
}

// Extrator para obter a empresa autenticada diretamente nos handlers.
// O tenant vem sempre do token, nunca da URL.
#[derive(Debug, Clone)]
pub struct AuthenticatedCompany(pub Company);

impl<S> FromRequestParts<S> for AuthenticatedCompany
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Company>()
            .cloned()
            .map(AuthenticatedCompany)
            .ok_or(AppError::InvalidToken)
    }
}
