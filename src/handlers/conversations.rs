// src/handlers/conversations.rs

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
    models::conversation::{BotTogglePayload, Conversation, Message, SendMessagePayload},
};

#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "Conversas",
    responses(
        (status = 200, description = "Conversas por última atividade", body = Vec<Conversation>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_conversations(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let conversations = app_state.conversation_service.list(company.id).await?;
    Ok(Json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "Conversas",
    params(("id" = Uuid, Path, description = "ID da conversa")),
    responses(
        (status = 200, description = "Mensagens em ordem cronológica", body = Vec<Message>),
        (status = 404, description = "Conversa não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_messages(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = app_state
        .conversation_service
        .messages(company.id, conversation_id)
        .await?;
    Ok(Json(messages))
}

// Resposta do atendente. Se o envio falhar por motivo temporário, volta com status "pending".
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "Conversas",
    request_body = SendMessagePayload,
    params(("id" = Uuid, Path, description = "ID da conversa")),
    responses(
        (status = 201, description = "Mensagens gravadas (uma por pedaço de até 2000 caracteres) com o status do envio", body = Vec<Message>),
        (status = 400, description = "Página da conversa inativa"),
        (status = 404, description = "Conversa não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_message(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.text.trim().is_empty() {
        return Err(AppError::BadRequest("A mensagem não pode ser vazia.".into()));
    }

    let messages = app_state
        .conversation_service
        .reply(company.id, conversation_id, &payload.text)
        .await?;

    Ok((StatusCode::CREATED, Json(messages)))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{id}/read",
    tag = "Conversas",
    params(("id" = Uuid, Path, description = "ID da conversa")),
    responses(
        (status = 200, description = "Conversa marcada como lida", body = Conversation)
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = app_state
        .conversation_service
        .mark_read(company.id, conversation_id)
        .await?;
    Ok(Json(conversation))
}

#[utoipa::path(
    put,
    path = "/api/conversations/{id}/bot",
    tag = "Conversas",
    request_body = BotTogglePayload,
    params(("id" = Uuid, Path, description = "ID da conversa")),
    responses(
        (status = 200, description = "Resposta automática ligada ou desligada", body = Conversation)
    ),
    security(("api_jwt" = []))
)]
pub async fn set_bot(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<BotTogglePayload>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = app_state
        .conversation_service
        .set_bot_enabled(company.id, conversation_id, payload.enabled)
        .await?;
    Ok(Json(conversation))
}
