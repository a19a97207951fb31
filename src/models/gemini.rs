// src/models/gemini.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct GeminiSettings {
    pub company_id: Uuid,
    pub api_key: String,
    pub model: String,
    pub personality_prompt: String,
    pub products_prompt: String,
    pub temperature: f64,
    pub max_output_tokens: i32,
    pub auto_reply_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

// O que a API devolve: a chave nunca sai inteira.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeminiSettingsView {
    #[schema(example = "****abcd")]
    pub api_key: String,
    #[schema(example = "gemini-1.5-flash")]
    pub model: String,
    pub personality_prompt: String,
    pub products_prompt: String,
    #[schema(example = 0.7)]
    pub temperature: f64,
    pub max_output_tokens: i32,
    pub auto_reply_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<GeminiSettings> for GeminiSettingsView {
    fn from(s: GeminiSettings) -> Self {
        Self {
            api_key: mask_secret(&s.api_key),
            model: s.model,
            personality_prompt: s.personality_prompt,
            products_prompt: s.products_prompt,
            temperature: s.temperature,
            max_output_tokens: s.max_output_tokens,
            auto_reply_enabled: s.auto_reply_enabled,
            updated_at: s.updated_at,
        }
    }
}

/// Mantém só os 4 últimos caracteres.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeminiSettingsPayload {
    /// Quando ausente, mantém a chave atual
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub personality_prompt: String,
    #[serde(default)]
    pub products_prompt: String,
    #[validate(range(min = 0.0, max = 2.0, message = "A temperatura deve estar entre 0 e 2."))]
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[validate(range(min = 1, max = 8192, message = "max_output_tokens deve estar entre 1 e 8192."))]
    #[serde(default = "default_max_tokens")]
    pub max_output_tokens: i32,
    #[serde(default = "default_true")]
    pub auto_reply_enabled: bool,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> i32 {
    1024
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_secret("AIzaSyExample1234"), "****1234");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
