// src/services/assistant_tools.rs
// Funções que o modelo pode chamar. Substituem os antigos comandos entre colchetes no texto.

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::{
    assistant::{FunctionCall, FunctionDeclaration},
    order::{NewOrder, OrderLinePayload, OrderSource},
};

pub const SEND_PRODUCT_IMAGE: &str = "send_product_image";
pub const CREATE_ORDER: &str = "create_order";

pub fn declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: SEND_PRODUCT_IMAGE.to_string(),
            description: "Envia ao cliente a foto de um produto do catálogo.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "product_id": { "type": "string", "description": "Id do produto, como aparece entre colchetes no catálogo." }
                },
                "required": ["product_id"]
            }),
        },
        FunctionDeclaration {
            name: CREATE_ORDER.to_string(),
            description: "Registra o pedido depois que o cliente confirmou itens e dados de entrega.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "product_id": { "type": "string" },
                                "quantity": { "type": "integer" }
                            },
                            "required": ["product_id", "quantity"]
                        }
                    },
                    "customer_name": { "type": "string" },
                    "customer_phone": { "type": "string" },
                    "customer_address": { "type": "string" },
                    "notes": { "type": "string" }
                },
                "required": ["items", "customer_name", "customer_phone", "customer_address"]
            }),
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssistantAction {
    SendProductImage { product_id: Uuid },
    CreateOrder(OrderRequest),
}

#[derive(Debug, Deserialize)]
struct SendImageArgs {
    product_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ToolOrderLine {
    product_id: Uuid,
    // O modelo às vezes manda `2.0` em vez de `2`
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct CreateOrderArgs {
    items: Vec<ToolOrderLine>,
    customer_name: String,
    customer_phone: String,
    customer_address: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub items: Vec<OrderLinePayload>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub notes: Option<String>,
}

impl OrderRequest {
    pub fn into_new_order(self, conversation_id: Uuid) -> NewOrder {
        NewOrder {
            conversation_id: Some(conversation_id),
            customer_name: self.customer_name,
            customer_phone: Some(self.customer_phone),
            customer_address: Some(self.customer_address),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            source: OrderSource::Messenger,
            items: self.items,
        }
    }
}

/// Converte as chamadas em ações. Nome desconhecido ou argumento inválido é descartado com aviso.
pub fn parse_calls(calls: &[FunctionCall]) -> Vec<AssistantAction> {
    calls
        .iter()
        .filter_map(|call| match parse_call(call) {
            Ok(action) => Some(action),
            Err(reason) => {
                tracing::warn!("⚠️ Chamada de função '{}' ignorada: {}", call.name, reason);
                None
            }
        })
        .collect()
}

fn parse_call(call: &FunctionCall) -> Result<AssistantAction, String> {
    match call.name.as_str() {
        SEND_PRODUCT_IMAGE => {
            let args: SendImageArgs =
                serde_json::from_value(call.args.clone()).map_err(|e| e.to_string())?;
            Ok(AssistantAction::SendProductImage { product_id: args.product_id })
        }
        CREATE_ORDER => {
            let args: CreateOrderArgs =
                serde_json::from_value(call.args.clone()).map_err(|e| e.to_string())?;
            if args.items.is_empty() {
                return Err("pedido sem itens".into());
            }
            if args.customer_name.trim().is_empty() {
                return Err("nome do cliente vazio".into());
            }

            let items = args
                .items
                .into_iter()
                .map(|line| {
                    if line.quantity < 1.0 || line.quantity.fract() != 0.0 || line.quantity > i32::MAX as f64 {
                        return Err(format!("quantidade inválida: {}", line.quantity));
                    }
                    Ok(OrderLinePayload { product_id: line.product_id, quantity: line.quantity as i32 })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(AssistantAction::CreateOrder(OrderRequest {
                items,
                customer_name: args.customer_name.trim().to_string(),
                customer_phone: args.customer_phone.trim().to_string(),
                customer_address: args.customer_address.trim().to_string(),
                notes: args.notes,
            }))
        }
        other => Err(format!("função desconhecida '{}'", other)),
    }
}
