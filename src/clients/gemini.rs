// src/clients/gemini.rs
// Cliente da Generative Language API (generateContent) com declaração de funções.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    common::error::AppError,
    models::assistant::{FunctionCall, FunctionDeclaration, ModelReply, PromptRequest},
    services::auto_reply::ReplyGenerator,
};

// --- Formato de envio ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSet<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: i32,
}

// --- Formato de resposta ---

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn generate(
        &self,
        api_key: &str,
        model: &str,
        request: &PromptRequest,
    ) -> Result<ModelReply, AppError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = to_wire(request);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("status {}", status));
            return Err(AppError::GeminiApi(message));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(fold_reply(parsed))
    }
}

fn to_wire(request: &PromptRequest) -> GenerateContentRequest<'_> {
    let contents = request
        .history
        .iter()
        .map(|turn| Content {
            role: Some(turn.role.as_str()),
            parts: vec![TextPart { text: turn.text.clone() }],
        })
        .collect();

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolSet { function_declarations: &request.tools }]
    };

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![TextPart { text: request.system_instruction.clone() }],
        },
        contents,
        tools,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

// Só o primeiro candidato conta. Textos são concatenados, chamadas mantêm a ordem.
fn fold_reply(response: GenerateContentResponse) -> ModelReply {
    let mut reply = ModelReply::default();
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut texts: Vec<String> = Vec::new();
    for part in parts {
        if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
            texts.push(text.trim().to_string());
        }
        if let Some(call) = part.function_call {
            let args = if call.args.is_null() { Value::Object(Default::default()) } else { call.args };
            reply.function_calls.push(FunctionCall { name: call.name, args });
        }
    }
    reply.text = texts.join("\n");
    reply
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn generate(&self, api_key: &str, model: &str, request: &PromptRequest) -> Result<ModelReply, AppError> {
        GeminiClient::generate(self, api_key, model, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assistant::{ChatRole, ChatTurn};
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> PromptRequest {
        PromptRequest {
            system_instruction: "Você é a atendente da Loja".into(),
            history: vec![ChatTurn { role: ChatRole::User, text: "tem camiseta?".into() }],
            tools: vec![FunctionDeclaration {
                name: "send_product_image".into(),
                description: "Envia a foto".into(),
                parameters: json!({"type": "object"}),
            }],
            temperature: 0.5,
            max_output_tokens: 256,
        }
    }

    #[tokio::test]
    async fn sends_key_header_and_folds_text_and_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_header("x-goog-api-key", "chave")
            .match_body(Matcher::PartialJson(json!({
                "systemInstruction": { "parts": [{ "text": "Você é a atendente da Loja" }] },
                "contents": [{ "role": "user", "parts": [{ "text": "tem camiseta?" }] }],
                "tools": [{ "functionDeclarations": [{ "name": "send_product_image" }] }],
                "generationConfig": { "temperature": 0.5, "maxOutputTokens": 256 }
            })))
            .with_body(
                json!({
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [
                                { "text": "Temos sim!" },
                                { "functionCall": { "name": "send_product_image", "args": { "product_id": "abc" } } }
                            ]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GeminiClient::new(&server.url()).unwrap();
        let reply = client.generate("chave", "gemini-1.5-flash", &request()).await.unwrap();

        assert_eq!(reply.text, "Temos sim!");
        assert_eq!(reply.function_calls.len(), 1);
        assert_eq!(reply.function_calls[0].name, "send_product_image");
        assert_eq!(reply.function_calls[0].args["product_id"], "abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_maps_to_gemini_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new(&server.url()).unwrap();
        let err = client.generate("ruim", "gemini-1.5-flash", &request()).await.unwrap_err();
        assert!(matches!(err, AppError::GeminiApi(msg) if msg == "API key not valid"));
    }

    #[tokio::test]
    async fn no_candidates_is_an_empty_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new(&server.url()).unwrap();
        let reply = client.generate("chave", "gemini-1.5-flash", &request()).await.unwrap();
        assert!(reply.is_empty());
    }
}
