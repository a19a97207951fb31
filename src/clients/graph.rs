// src/clients/graph.rs
// Cliente da Graph API (Messenger). O token de página vai como query `access_token`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::{
    common::error::AppError,
    models::facebook::PageInfo,
    services::auto_reply::MessengerGateway,
};

/// Limite de caracteres de uma mensagem de texto no Messenger.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Deserialize)]
struct GraphErrorDetail {
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Deserialize)]
struct SendResponse {
    message_id: String,
}

#[derive(Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

// Erro de uma tentativa, já dizendo se vale repetir.
struct Failure {
    error: AppError,
    retryable: bool,
}

#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    retry_base_delay: Duration,
}

impl GraphClient {
    pub fn new(base: &str, version: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/{}", base.trim_end_matches('/'), version),
            retry_base_delay: Duration::from_millis(500),
        })
    }

    /// Troca o atraso inicial do backoff (os testes usam zero).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// `GET /me?fields=id,name`: valida o token e descobre a página.
    pub async fn get_page_info(&self, access_token: &str) -> Result<PageInfo, AppError> {
        let url = format!("{}/me", self.base_url);
        self.execute(|| {
            self.http
                .get(&url)
                .query(&[("fields", "id,name"), ("access_token", access_token)])
        })
        .await
    }

    /// Envia uma única mensagem de texto. Quem chama quebra textos longos com
    /// `split_message` e grava cada pedaço como uma mensagem própria.
    pub async fn send_text(
        &self,
        access_token: &str,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Mensagem vazia".into()));
        }
        if text.chars().count() > MESSAGE_CHAR_LIMIT {
            return Err(AppError::BadRequest(format!(
                "Mensagem acima de {} caracteres",
                MESSAGE_CHAR_LIMIT
            )));
        }
        let body = json!({
            "recipient": { "id": recipient_id },
            "messaging_type": "RESPONSE",
            "message": { "text": text },
        });
        self.post_message(access_token, &body).await
    }

    pub async fn send_image(
        &self,
        access_token: &str,
        recipient_id: &str,
        image_url: &str,
    ) -> Result<String, AppError> {
        let body = json!({
            "recipient": { "id": recipient_id },
            "messaging_type": "RESPONSE",
            "message": {
                "attachment": {
                    "type": "image",
                    "payload": { "url": image_url, "is_reusable": true }
                }
            },
        });
        self.post_message(access_token, &body).await
    }

    /// Assina o app nos eventos de mensagem da página.
    pub async fn subscribe_app(&self, page_id: &str, access_token: &str) -> Result<bool, AppError> {
        let url = format!("{}/{}/subscribed_apps", self.base_url, page_id);
        let response: SuccessResponse = self
            .execute(|| {
                self.http.post(&url).query(&[
                    ("subscribed_fields", "messages,messaging_postbacks"),
                    ("access_token", access_token),
                ])
            })
            .await?;
        Ok(response.success)
    }

    async fn post_message(&self, access_token: &str, body: &Value) -> Result<String, AppError> {
        let url = format!("{}/me/messages", self.base_url);
        let response: SendResponse = self
            .execute(|| {
                self.http
                    .post(&url)
                    .query(&[("access_token", access_token)])
                    .json(body)
            })
            .await?;
        Ok(response.message_id)
    }

    // Até 3 tentativas com backoff exponencial (500ms, 1s) para falhas temporárias.
    async fn execute<T, F>(&self, build: F) -> Result<T, AppError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            match send_once(build()).await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.retryable && attempt < MAX_ATTEMPTS => {
                    let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        "⚠️ Graph API falhou (tentativa {}/{}): {}. Nova tentativa em {:?}",
                        attempt,
                        MAX_ATTEMPTS,
                        failure.error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }
}

async fn send_once<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Failure> {
    let response = request.send().await.map_err(|e| {
        let error = AppError::from(e);
        Failure { retryable: error.is_transient(), error }
    })?;

    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| Failure {
            error: AppError::from(e),
            retryable: false,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let error = graph_error(status, &body);
    let retryable = status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || error.is_transient();
    Err(Failure { error, retryable })
}

fn graph_error(status: StatusCode, body: &str) -> AppError {
    match serde_json::from_str::<GraphErrorBody>(body) {
        Ok(parsed) => AppError::GraphApi {
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => AppError::GraphApi {
            code: i64::from(status.as_u16()),
            message: format!("HTTP {}", status),
        },
    }
}

/// Quebra o texto em pedaços de no máximo `limit` caracteres (não bytes),
/// preferindo cortar em quebra de linha ou espaço.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + limit).min(chars.len());
        let mut cut = end;
        if end < chars.len() {
            // Procura o último separador na segunda metade do pedaço
            if let Some(pos) = chars[start..end]
                .iter()
                .rposition(|c| *c == '\n' || *c == ' ')
                .filter(|pos| *pos > limit / 2)
            {
                cut = start + pos + 1;
            }
        }
        let chunk: String = chars[start..cut].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        start = cut;
    }
    chunks
}

#[async_trait]
impl MessengerGateway for GraphClient {
    async fn send_text(&self, access_token: &str, recipient_id: &str, text: &str) -> Result<String, AppError> {
        GraphClient::send_text(self, access_token, recipient_id, text).await
    }

    async fn send_image(&self, access_token: &str, recipient_id: &str, image_url: &str) -> Result<String, AppError> {
        GraphClient::send_image(self, access_token, recipient_id, image_url).await
    }
}
