// src/handlers/webhook.rs
// Webhook do Messenger: verificação da Meta e recebimento de mensagens.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    common::{
        error::AppError,
        signature::{verify_hub_signature, SIGNATURE_HEADER},
    },
    config::AppState,
    models::facebook::{WebhookEvent, WebhookVerifyQuery},
    services::auto_reply::{AutoReplyOutcome, IncomingMessage},
};

const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

// GET /webhook/facebook
pub async fn verify(
    State(app_state): State<AppState>,
    Query(params): Query<WebhookVerifyQuery>,
) -> Result<String, StatusCode> {
    let (Some(mode), Some(token), Some(challenge)) =
        (params.hub_mode, params.hub_verify_token, params.hub_challenge)
    else {
        return Err(StatusCode::BAD_REQUEST);
    };

    if mode == "subscribe" && token == app_state.config.facebook_verify_token {
        tracing::info!("✅ Webhook do Facebook verificado");
        return Ok(challenge);
    }

    tracing::warn!("🚫 Verificação do webhook recusada (modo '{}')", mode);
    Err(StatusCode::FORBIDDEN)
}

// POST /webhook/facebook
// Responde logo; cada mensagem segue o pipeline numa task própria.
pub async fn receive(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // 1. Assinatura (só quando o segredo do app está configurado)
    if let Some(secret) = app_state.config.facebook_app_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        verify_hub_signature(secret, &body, header)?;
    }

    // 2. Payload
    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Payload do webhook inválido: {}", e)))?;

    // 3. Despacha
    let messages = incoming_messages(event);
    if !messages.is_empty() {
        tracing::info!("📨 Webhook com {} mensagem(ns)", messages.len());
    }

    for incoming in messages {
        let auto_reply = app_state.auto_reply.clone();
        tokio::spawn(async move {
            let sender = incoming.sender_id.clone();
            match auto_reply.handle_incoming(incoming).await {
                Ok(AutoReplyOutcome::Replied { messages_sent, orders_created }) => {
                    tracing::info!(
                        "🤖 Resposta enviada para {} ({} mensagens, pedidos {:?})",
                        sender,
                        messages_sent,
                        orders_created
                    );
                }
                Ok(outcome) => tracing::debug!("Mensagem de {}: {:?}", sender, outcome),
                Err(e) => tracing::error!("🔥 Falha ao processar mensagem de {}: {}", sender, e),
            }
        });
    }

    Ok((StatusCode::OK, EVENT_RECEIVED))
}

/// Extrai as mensagens de texto de clientes. Ecos da própria página,
/// confirmações de entrega/leitura e objetos que não são "page" são ignorados.
pub fn incoming_messages(event: WebhookEvent) -> Vec<IncomingMessage> {
    if event.object != "page" {
        return Vec::new();
    }

    event
        .entry
        .into_iter()
        .flat_map(|entry| {
            let page_id = entry.id;
            entry.messaging.into_iter().filter_map(move |messaging| {
                let message = messaging.message?;
                if message.is_echo {
                    return None;
                }
                let text = message.text.filter(|t| !t.trim().is_empty())?;
                // O id da página vem da entrada; o destinatário só cobre entradas antigas sem id
                let page_id = if page_id.is_empty() {
                    messaging.recipient.id
                } else {
                    page_id.clone()
                };
                Some(IncomingMessage {
                    page_id,
                    sender_id: messaging.sender.id,
                    text,
                    message_id: message.mid,
                    customer_name: None,
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::signature::sign_hub_payload, config::AppConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    const SECRET: &str = "segredo-do-app";

    fn app(app_secret: Option<&str>) -> Router {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/unused".into()),
            "JWT_SECRET" => Some("jwt".into()),
            "FACEBOOK_VERIFY_TOKEN" => Some("meu-token".into()),
            "FACEBOOK_APP_SECRET" => app_secret.map(str::to_string),
            _ => None,
        })
        .unwrap();
        let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
        let state = AppState::from_pool(pool, config).unwrap();

        Router::new()
            .route("/webhook/facebook", get(verify).post(receive))
            .with_state(state)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_request(query: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/webhook/facebook?{}", query))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn verification_echoes_challenge_for_configured_token() {
        let response = app(None)
            .oneshot(get_request("hub.mode=subscribe&hub.verify_token=meu-token&hub.challenge=12345"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "12345");
    }

    #[tokio::test]
    async fn verification_rejects_wrong_token() {
        let response = app(None)
            .oneshot(get_request("hub.mode=subscribe&hub.verify_token=outro&hub.challenge=12345"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn verification_without_params_is_bad_request() {
        let response = app(None).oneshot(get_request("hub.mode=subscribe")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn post_request(body: &'static str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook/facebook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body)).unwrap()
    }

    // Objeto que não é "page": nada é despachado, então o banco nunca é tocado
    const NON_PAGE_EVENT: &str = r#"{"object":"instagram","entry":[]}"#;

    #[tokio::test]
    async fn signed_post_is_acknowledged() {
        let signature = sign_hub_payload(SECRET, NON_PAGE_EVENT.as_bytes()).unwrap();
        let response = app(Some(SECRET))
            .oneshot(post_request(NON_PAGE_EVENT, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, EVENT_RECEIVED);
    }

    #[tokio::test]
    async fn bad_or_missing_signature_is_unauthorized() {
        let forged = sign_hub_payload("outro-segredo", NON_PAGE_EVENT.as_bytes()).unwrap();
        let response = app(Some(SECRET))
            .oneshot(post_request(NON_PAGE_EVENT, Some(forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(Some(SECRET))
            .oneshot(post_request(NON_PAGE_EVENT, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsigned_post_accepted_when_no_secret_configured() {
        let response = app(None)
            .oneshot(post_request(NON_PAGE_EVENT, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn extracts_only_customer_text_messages() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "object": "page",
                "entry": [{
                    "id": "PAGE_1",
                    "time": 1700000000,
                    "messaging": [
                        {"sender": {"id": "C1"}, "recipient": {"id": "PAGE_1"}, "timestamp": 1,
                         "message": {"mid": "m.1", "text": "Oi, tem camiseta preta?"}},
                        {"sender": {"id": "PAGE_1"}, "recipient": {"id": "C1"}, "timestamp": 2,
                         "message": {"mid": "m.2", "text": "Temos sim!", "is_echo": true}},
                        {"sender": {"id": "C1"}, "recipient": {"id": "PAGE_1"}, "timestamp": 3,
                         "delivery": {"mids": ["m.2"]}},
                        {"sender": {"id": "C1"}, "recipient": {"id": "PAGE_1"}, "timestamp": 4,
                         "message": {"mid": "m.3", "attachments": [{"type": "image"}]}}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let messages = incoming_messages(event);
        assert_eq!(
            messages,
            vec![IncomingMessage {
                page_id: "PAGE_1".into(),
                sender_id: "C1".into(),
                text: "Oi, tem camiseta preta?".into(),
                message_id: Some("m.1".into()),
                customer_name: None,
            }]
        );
    }

    #[test]
    fn non_page_objects_are_ignored() {
        let event: WebhookEvent = serde_json::from_str(NON_PAGE_EVENT).unwrap();
        assert!(incoming_messages(event).is_empty());
    }
}
