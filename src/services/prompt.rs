// src/services/prompt.rs
// Montagem do prompt do assistente. Funções puras, sem banco nem HTTP.

use std::fmt::Write;

use crate::models::{
    assistant::{ChatRole, ChatTurn, FunctionDeclaration, PromptRequest},
    catalog::Product,
    conversation::{Message, SenderType},
    gemini::GeminiSettings,
};

pub const CATALOG_LIMIT: usize = 50;
pub const HISTORY_LIMIT: usize = 10;

const TOOL_RULES: &str = "\
Regras de atendimento:
- Use apenas os produtos do catálogo acima. Nunca invente produto, preço ou estoque.
- Para mostrar a foto de um produto, chame a função send_product_image com o id do produto.
- Só chame create_order depois que o cliente confirmar os itens, as quantidades, o nome, o telefone e o endereço.
- Produtos marcados como ESGOTADO não podem ser pedidos.
- Responda em texto curto e cordial, no idioma do cliente.";

/// Instrução de sistema: personalidade, instruções de produto, catálogo e regras, nessa ordem.
pub fn build_system_instruction(settings: &GeminiSettings, catalog: &[Product]) -> String {
    let mut out = String::new();

    for section in [&settings.personality_prompt, &settings.products_prompt] {
        let section = section.trim();
        if !section.is_empty() {
            out.push_str(section);
            out.push_str("\n\n");
        }
    }

    out.push_str(&render_catalog(catalog));
    out.push('\n');
    out.push_str(TOOL_RULES);
    out
}

/// Lista de produtos no formato `- [id] nome: preço (promoção) | estoque N | categoria | descrição`.
pub fn render_catalog(catalog: &[Product]) -> String {
    if catalog.is_empty() {
        return "Catálogo: nenhum produto cadastrado no momento.\n".to_string();
    }

    let mut out = String::from("Catálogo de produtos:\n");
    for product in catalog.iter().take(CATALOG_LIMIT) {
        let _ = write!(out, "- [{}] {}: R$ {}", product.id, product.name, product.price);
        if let Some(sale) = product.sale_price {
            let _ = write!(out, " (promoção R$ {})", sale);
        }
        if product.in_stock() {
            let _ = write!(out, " | estoque {}", product.stock_quantity);
        } else {
            out.push_str(" | ESGOTADO");
        }
        if let Some(category) = product.category_name.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let _ = write!(out, " | {}", category);
        }
        if let Some(description) = product.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            let _ = write!(out, " | {}", description);
        }
        out.push('\n');
    }
    out
}

/// Converte as mensagens (em ordem cronológica) para turnos do modelo.
/// Cliente vira `user`, bot e atendente viram `model`; turnos seguidos do mesmo papel
/// são unidos e o histórico sempre começa por `user`.
pub fn build_history(messages: &[Message]) -> Vec<ChatTurn> {
    let start = messages.len().saturating_sub(HISTORY_LIMIT);
    let mut turns: Vec<ChatTurn> = Vec::new();

    for message in &messages[start..] {
        let text = message.content.trim();
        if text.is_empty() {
            continue;
        }
        let role = match message.sender_type {
            SenderType::Customer => ChatRole::User,
            SenderType::Bot | SenderType::Page => ChatRole::Model,
        };

        match turns.last_mut() {
            Some(last) if last.role == role => {
                last.text.push('\n');
                last.text.push_str(text);
            }
            _ => turns.push(ChatTurn { role, text: text.to_string() }),
        }
    }

    let first_user = turns
        .iter()
        .position(|t| t.role == ChatRole::User)
        .unwrap_or(turns.len());
    turns.drain(..first_user);
    turns
}

pub fn build_request(
    settings: &GeminiSettings,
    catalog: &[Product],
    messages: &[Message],
    tools: Vec<FunctionDeclaration>,
) -> PromptRequest {
    PromptRequest {
        system_instruction: build_system_instruction(settings, catalog),
        history: build_history(messages),
        tools,
        temperature: settings.temperature,
        max_output_tokens: settings.max_output_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::DeliveryStatus;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn settings() -> GeminiSettings {
        GeminiSettings {
            company_id: Uuid::nil(),
            api_key: "k".into(),
            model: "gemini-1.5-flash".into(),
            personality_prompt: "Você é a Ana, atendente da Loja Sol.".into(),
            products_prompt: "Ofereça sempre o frete grátis acima de R$ 200.".into(),
            temperature: 0.7,
            max_output_tokens: 1024,
            auto_reply_enabled: true,
            updated_at: Utc::now(),
        }
    }

    fn product(name: &str, stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            company_id: Uuid::nil(),
            category_id: None,
            name: name.into(),
            description: None,
            price: Decimal::new(5990, 2),
            sale_price: None,
            stock_quantity: stock,
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            category_name: None,
        }
    }

    fn message(sender: SenderType, content: &str, minute: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::nil(),
            company_id: Uuid::nil(),
            sender_type: sender,
            content: content.into(),
            image_url: None,
            facebook_message_id: None,
            delivery_status: DeliveryStatus::Sent,
            attempts: 0,
            last_error: None,
            created_at: Utc::now() + Duration::minutes(minute),
        }
    }

    #[test]
    fn sections_appear_in_order() {
        let shirt = product("Camiseta", 3);
        let prompt = build_system_instruction(&settings(), &[shirt.clone()]);

        let personality = prompt.find("Ana").unwrap();
        let products = prompt.find("frete grátis").unwrap();
        let catalog = prompt.find(&shirt.id.to_string()).unwrap();
        let rules = prompt.find("send_product_image").unwrap();
        assert!(personality < products && products < catalog && catalog < rules);
    }

    #[test]
    fn catalog_flags_sold_out_and_shows_sale_price() {
        let mut shirt = product("Camiseta", 4);
        shirt.sale_price = Some(Decimal::new(4990, 2));
        let cap = product("Boné", 0);

        let listing = render_catalog(&[shirt.clone(), cap]);
        assert!(listing.contains(&format!("- [{}] Camiseta: R$ 59.90 (promoção R$ 49.90) | estoque 4", shirt.id)));
        assert!(listing.contains("Boné: R$ 59.90 | ESGOTADO"));
    }

    #[test]
    fn catalog_lines_carry_the_category() {
        let mut shirt = product("Camiseta", 4);
        shirt.category_name = Some("Roupas".into());
        shirt.description = Some("Algodão".into());
        let loose = product("Chaveiro", 1);

        let listing = render_catalog(&[shirt.clone(), loose]);
        assert!(listing.contains(&format!("- [{}] Camiseta: R$ 59.90 | estoque 4 | Roupas | Algodão", shirt.id)));
        assert!(listing.contains("Chaveiro: R$ 59.90 | estoque 1\n"));
    }

    #[test]
    fn catalog_is_capped() {
        let products: Vec<Product> = (0..60).map(|i| product(&format!("P{}", i), 1)).collect();
        let listing = render_catalog(&products);
        assert_eq!(listing.lines().filter(|l| l.starts_with("- [")).count(), CATALOG_LIMIT);
    }

    #[test]
    fn history_maps_roles_and_merges_consecutive_turns() {
        let messages = vec![
            message(SenderType::Bot, "Olá! Posso ajudar?", 0),
            message(SenderType::Customer, "oi", 1),
            message(SenderType::Customer, "tem camiseta?", 2),
            message(SenderType::Bot, "Temos sim", 3),
            message(SenderType::Page, "Posso separar uma?", 4),
            message(SenderType::Customer, "pode", 5),
        ];

        let turns = build_history(&messages);
        assert_eq!(
            turns,
            vec![
                ChatTurn { role: ChatRole::User, text: "oi\ntem camiseta?".into() },
                ChatTurn { role: ChatRole::Model, text: "Temos sim\nPosso separar uma?".into() },
                ChatTurn { role: ChatRole::User, text: "pode".into() },
            ]
        );
    }

    #[test]
    fn history_keeps_only_the_last_messages() {
        let messages: Vec<Message> = (0..15)
            .map(|i| {
                let sender = if i % 2 == 0 { SenderType::Customer } else { SenderType::Bot };
                message(sender, &format!("m{}", i), i)
            })
            .collect();

        let turns = build_history(&messages);
        // As 10 últimas são m5..m14; m5 é do bot e é descartada por vir antes do cliente
        assert_eq!(turns.len(), 9);
        assert_eq!(turns[0].text, "m6");
        assert_eq!(turns.last().map(|t| t.text.as_str()), Some("m14"));
    }
}
