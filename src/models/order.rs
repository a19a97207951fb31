// src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Máquina de estados do pedido. Entregue e cancelado são finais.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "order_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    Manual,
    Messenger,
}

// --- Structs de Operação ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub conversation_id: Option<Uuid>,
    #[schema(example = 1024)]
    pub order_number: i64,
    #[schema(example = "Ana Souza")]
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub status: OrderStatus,
    pub source: OrderSource,
    #[schema(example = "150.50")]
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    #[schema(example = 2)]
    pub quantity: i32,
    #[schema(example = "50.00")]
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub header: Order,
    pub items: Vec<OrderItem>,
}

// --- Entrada ---

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLinePayload {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "A quantidade deve ser pelo menos 1."))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    #[validate(length(min = 1, message = "O nome do cliente é obrigatório."))]
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "O pedido precisa de pelo menos um item."))]
    #[validate(nested)]
    pub items: Vec<OrderLinePayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusPayload {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// Pedido a ser criado, venha ele da API ou do assistente.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub conversation_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub notes: Option<String>,
    pub source: OrderSource,
    pub items: Vec<OrderLinePayload>,
}

impl NewOrder {
    pub fn from_payload(payload: CreateOrderPayload) -> Self {
        Self {
            conversation_id: None,
            customer_name: payload.customer_name,
            customer_phone: payload.customer_phone,
            customer_address: payload.customer_address,
            notes: payload.notes,
            source: OrderSource::Manual,
            items: payload.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    #[test]
    fn transition_matrix() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Shipped));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");
        assert_eq!(Shipped.to_string(), "shipped");
    }
}
