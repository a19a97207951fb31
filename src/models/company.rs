// src/models/company.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "company_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CompanyStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Cancelled,
}

// A empresa é o nosso tenant: tudo o resto pendura nela.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    #[schema(example = "Loja da Maria")]
    pub name: String,
    #[schema(example = "contato@lojadamaria.com")]
    pub email: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub status: CompanyStatus,
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn is_active(&self) -> bool {
        self.status == CompanyStatus::Active
    }
}

// Dados para registro de uma nova empresa
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterCompanyPayload {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    #[schema(example = "Loja da Maria")]
    pub name: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCompanyPayload {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    pub name: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // ID da empresa
    pub exp: usize, // Expiration time
    pub iat: usize, // Issued At
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusCount {
    pub status: crate::models::order::OrderStatus,
    pub count: i64,
}

// Indicadores da empresa (substitui os scripts de "check-*")
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStats {
    pub total_products: i64,
    pub active_products: i64,
    pub out_of_stock_products: i64,
    pub orders_by_status: Vec<OrderStatusCount>,
    #[schema(example = "1520.50")]
    pub revenue: rust_decimal::Decimal,
    pub conversations: i64,
    pub unread_messages: i64,
    pub connected_pages: i64,
}
