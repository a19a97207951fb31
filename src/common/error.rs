use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro único, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    BadRequest(String),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Empresa suspensa")]
    CompanyInactive,

    #[error("{0} não encontrado(a)")]
    NotFound(&'static str),

    #[error("A categoria '{0}' já existe")]
    CategoryNameAlreadyExists(String),

    #[error("A página já está ligada a outra empresa")]
    PageOwnedByAnotherCompany,

    #[error("Estoque insuficiente para '{product}'")]
    InsufficientStock { product: String },

    #[error("Transição de pedido inválida: {from} -> {to}")]
    InvalidOrderTransition { from: String, to: String },

    #[error("Assinatura do webhook inválida")]
    InvalidSignature,

    // Erros vindos das APIs externas
    #[error("Erro da Graph API ({code}): {message}")]
    GraphApi { code: i64, message: String },

    #[error("Erro da API do Gemini: {0}")]
    GeminiApi(String),

    #[error("Falha de comunicação HTTP: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Token de página expirado ou revogado (código 190 da Graph API).
    pub fn is_invalid_page_token(&self) -> bool {
        matches!(self, AppError::GraphApi { code: 190, .. })
    }

    /// Falhas que valem uma nova tentativa mais tarde (rede, limites, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Upstream(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            // Códigos temporários ou de limite de taxa da Graph API.
            // Respostas sem corpo de erro chegam com o status HTTP como código.
            AppError::GraphApi { code, .. } => {
                matches!(code, 1 | 2 | 4 | 17 | 613 | 429 | 500..=599)
            }
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::EmailAlreadyExists => {
                (StatusCode::CONFLICT, "Este e-mail já está em uso.".to_string())
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "E-mail ou senha inválidos.".to_string())
            }
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::CompanyInactive => (
                StatusCode::FORBIDDEN,
                "A conta desta empresa está suspensa.".to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "Assinatura do webhook inválida.".to_string(),
            ),
            e @ AppError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            e @ (AppError::CategoryNameAlreadyExists(_)
            | AppError::PageOwnedByAnotherCompany
            | AppError::InsufficientStock { .. }
            | AppError::InvalidOrderTransition { .. }) => (StatusCode::CONFLICT, e.to_string()),

            // Falhas das APIs externas: o detalhe fica no log.
            ref e @ (AppError::GraphApi { .. } | AppError::GeminiApi(_) | AppError::Upstream(_)) => {
                tracing::warn!("Falha em serviço externo: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Falha ao comunicar com um serviço externo.".to_string(),
                )
            }

            // Todos os outros erros (DatabaseError, InternalServerError...) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        let resp = AppError::InsufficientStock { product: "Camisa".into() }.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::PageOwnedByAnotherCompany.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn upstream_failures_map_to_502() {
        let resp = AppError::GraphApi { code: 100, message: "bad".into() }.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let resp = AppError::GeminiApi("quota".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn graph_error_classification() {
        let expired = AppError::GraphApi { code: 190, message: "expired".into() };
        assert!(expired.is_invalid_page_token());
        assert!(!expired.is_transient());

        let throttled = AppError::GraphApi { code: 613, message: "rate".into() };
        assert!(throttled.is_transient());
        assert!(!AppError::NotFound("Produto").is_transient());
    }

    #[test]
    fn bare_http_status_from_graph_is_classified() {
        for code in [429, 500, 502, 503, 504] {
            let err = AppError::GraphApi { code, message: format!("HTTP {code}") };
            assert!(err.is_transient(), "{code} deveria ser temporário");
        }
        for code in [400, 403, 404] {
            let err = AppError::GraphApi { code, message: format!("HTTP {code}") };
            assert!(!err.is_transient(), "{code} não deveria ser temporário");
        }
    }
}
