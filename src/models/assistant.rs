// src/models/assistant.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Declaração de uma função que o modelo pode chamar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tudo o que o modelo precisa para responder, sem detalhes do formato da API.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub tools: Vec<FunctionDeclaration>,
    pub temperature: f64,
    pub max_output_tokens: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Resposta do modelo: texto livre mais as chamadas de função, na ordem em que vieram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
}

impl ModelReply {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.function_calls.is_empty()
    }
}
