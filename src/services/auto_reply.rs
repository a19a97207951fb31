// src/services/auto_reply.rs
//
// Resposta automática: mensagem do cliente -> Gemini -> Messenger.
// O serviço só conhece traits; Postgres, Gemini e Graph entram pelo `AppState`,
// e os testes usam implementações em memória.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    clients::graph::{split_message, MESSAGE_CHAR_LIMIT},
    common::error::AppError,
    models::{
        assistant::{ModelReply, PromptRequest},
        catalog::Product,
        company::Company,
        conversation::{Conversation, DeliveryOutcome, DeliveryStatus, Message, NewMessage, SenderType},
        facebook::FacebookPage,
        gemini::GeminiSettings,
        order::{NewOrder, OrderDetail},
    },
    services::{
        assistant_tools::{self, AssistantAction},
        prompt,
    },
};

/// Acesso a dados de que o assistente precisa, sempre filtrado pela empresa.
#[async_trait]
pub trait AssistantStore: Send + Sync {
    async fn find_active_page(&self, page_id: &str) -> Result<Option<FacebookPage>, AppError>;
    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError>;
    async fn gemini_settings(&self, company_id: Uuid) -> Result<Option<GeminiSettings>, AppError>;
    async fn find_or_create_conversation(
        &self,
        company_id: Uuid,
        page_id: &str,
        customer_facebook_id: &str,
        customer_name: Option<&str>,
    ) -> Result<Conversation, AppError>;
    /// `None` quando a mensagem já existe (mesmo `facebook_message_id`).
    async fn insert_message(&self, message: &NewMessage) -> Result<Option<Message>, AppError>;
    async fn touch_conversation(
        &self,
        conversation_id: Uuid,
        last_message: &str,
        from_customer: bool,
    ) -> Result<(), AppError>;
    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>, AppError>;
    async fn catalog(&self, company_id: Uuid, limit: i64) -> Result<Vec<Product>, AppError>;
    async fn find_product(&self, company_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError>;
    async fn create_order(&self, company_id: Uuid, order: NewOrder) -> Result<OrderDetail, AppError>;
    /// Registra a tentativa feita na hora; falha temporária devolve a mensagem à fila.
    async fn record_delivery(&self, message_id: Uuid, outcome: &DeliveryOutcome) -> Result<(), AppError>;
    async fn deactivate_page(&self, page_id: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, api_key: &str, model: &str, request: &PromptRequest) -> Result<ModelReply, AppError>;
}

/// Envio pelo Messenger. Devolve o id da mensagem na Graph API.
#[async_trait]
pub trait MessengerGateway: Send + Sync {
    async fn send_text(&self, access_token: &str, recipient_id: &str, text: &str) -> Result<String, AppError>;
    async fn send_image(&self, access_token: &str, recipient_id: &str, image_url: &str) -> Result<String, AppError>;
}

/// Mensagem de texto recebida pelo webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub page_id: String,
    pub sender_id: String,
    pub text: String,
    pub message_id: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutoReplyOutcome {
    /// Texto vazio (figurinha, anexo sem legenda...)
    Ignored,
    PageNotRegistered,
    CompanyInactive,
    /// Reentrega do webhook; já processada
    Duplicate,
    /// Gravada para atendimento humano, sem resposta automática
    Stored,
    GenerationFailed,
    Replied {
        messages_sent: usize,
        orders_created: Vec<i64>,
    },
}

#[derive(Debug, Clone)]
pub struct AutoReplyOptions {
    pub fallback_api_key: Option<String>,
    pub history_limit: usize,
    pub catalog_limit: usize,
}

impl Default for AutoReplyOptions {
    fn default() -> Self {
        Self {
            fallback_api_key: None,
            history_limit: prompt::HISTORY_LIMIT,
            catalog_limit: prompt::CATALOG_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct AutoReplyService {
    store: Arc<dyn AssistantStore>,
    generator: Arc<dyn ReplyGenerator>,
    gateway: Arc<dyn MessengerGateway>,
    options: Arc<AutoReplyOptions>,
}

// Para onde vão as mensagens de uma resposta.
struct ReplyTarget<'a> {
    page: &'a FacebookPage,
    conversation: &'a Conversation,
}

impl AutoReplyService {
    pub fn new(
        store: Arc<dyn AssistantStore>,
        generator: Arc<dyn ReplyGenerator>,
        gateway: Arc<dyn MessengerGateway>,
        options: AutoReplyOptions,
    ) -> Self {
        Self { store, generator, gateway, options: Arc::new(options) }
    }

    pub async fn handle_incoming(&self, incoming: IncomingMessage) -> Result<AutoReplyOutcome, AppError> {
        let text = incoming.text.trim();
        if text.is_empty() {
            return Ok(AutoReplyOutcome::Ignored);
        }

        // 1. Página -> empresa
        let Some(page) = self.store.find_active_page(&incoming.page_id).await? else {
            tracing::warn!("❓ Mensagem para página não registrada: {}", incoming.page_id);
            return Ok(AutoReplyOutcome::PageNotRegistered);
        };

        // 2. Empresa ativa
        match self.store.find_company(page.company_id).await? {
            Some(company) if company.is_active() => {}
            _ => {
                tracing::info!("⏸️ Empresa {} inativa; mensagem ignorada", page.company_id);
                return Ok(AutoReplyOutcome::CompanyInactive);
            }
        }

        // 3. Conversa
        let conversation = self
            .store
            .find_or_create_conversation(
                page.company_id,
                &page.page_id,
                &incoming.sender_id,
                incoming.customer_name.as_deref(),
            )
            .await?;

        // 4. Grava a mensagem do cliente (idempotente pelo id do Facebook)
        let customer_message =
            NewMessage::from_customer(&conversation, text.to_string(), incoming.message_id.clone());
        if self.store.insert_message(&customer_message).await?.is_none() {
            tracing::debug!("🔁 Mensagem {:?} já processada", incoming.message_id);
            return Ok(AutoReplyOutcome::Duplicate);
        }
        self.store.touch_conversation(conversation.id, text, true).await?;

        // 5. Bot ligado e Gemini configurado?
        if !conversation.bot_enabled {
            return Ok(AutoReplyOutcome::Stored);
        }
        let Some(settings) = self
            .store
            .gemini_settings(page.company_id)
            .await?
            .filter(|s| s.auto_reply_enabled)
        else {
            return Ok(AutoReplyOutcome::Stored);
        };
        let Some(api_key) = self.resolve_api_key(&settings) else {
            tracing::info!("🔑 Empresa {} sem chave do Gemini; resposta automática desligada", page.company_id);
            return Ok(AutoReplyOutcome::Stored);
        };

        // 6. Prompt e geração
        let history = self
            .store
            .recent_messages(conversation.id, self.options.history_limit as i64)
            .await?;
        let catalog = self
            .store
            .catalog(page.company_id, self.options.catalog_limit as i64)
            .await?;
        let request = prompt::build_request(&settings, &catalog, &history, assistant_tools::declarations());

        let reply = match self.generator.generate(&api_key, &settings.model, &request).await {
            Ok(reply) if !reply.is_empty() => reply,
            Ok(_) => {
                tracing::warn!("🤐 Gemini devolveu resposta vazia (conversa {})", conversation.id);
                return Ok(AutoReplyOutcome::GenerationFailed);
            }
            Err(e) => {
                tracing::warn!("🔥 Falha ao gerar resposta (conversa {}): {}", conversation.id, e);
                return Ok(AutoReplyOutcome::GenerationFailed);
            }
        };

        // 7. Texto primeiro, depois as ações na ordem em que vieram
        let target = ReplyTarget { page: &page, conversation: &conversation };
        let mut messages_sent = 0;
        let mut orders_created = Vec::new();

        if !reply.text.trim().is_empty() {
            messages_sent += self.deliver_text(&target, &reply.text).await?;
        }

        for action in assistant_tools::parse_calls(&reply.function_calls) {
            match action {
                AssistantAction::SendProductImage { product_id } => {
                    let product = self.store.find_product(page.company_id, product_id).await?;
                    match product.as_ref().and_then(|p| p.image_url.as_deref().map(|url| (p, url))) {
                        Some((product, url)) => {
                            self.deliver(&target, &format!("📷 {}", product.name), Some(url)).await?;
                            messages_sent += 1;
                        }
                        None => tracing::warn!("🖼️ Produto {} sem imagem ou inexistente", product_id),
                    }
                }
                AssistantAction::CreateOrder(request) => {
                    let order = request.into_new_order(conversation.id);
                    let text = match self.store.create_order(page.company_id, order).await {
                        Ok(detail) => {
                            orders_created.push(detail.header.order_number);
                            order_confirmation(&detail)
                        }
                        Err(e) => {
                            tracing::warn!("🛒 Pedido do assistente recusado (conversa {}): {}", conversation.id, e);
                            order_apology(&e)
                        }
                    };
                    messages_sent += self.deliver_text(&target, &text).await?;
                }
            }
        }

        Ok(AutoReplyOutcome::Replied { messages_sent, orders_created })
    }

    fn resolve_api_key(&self, settings: &GeminiSettings) -> Option<String> {
        let own = settings.api_key.trim();
        if !own.is_empty() {
            return Some(own.to_string());
        }
        self.options
            .fallback_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    /// Texto longo vira várias mensagens de até 2000 caracteres, cada uma gravada e
    /// enviada por conta própria. Depois do primeiro pedaço que não sai, os seguintes
    /// só são gravados, para o worker mandar na ordem. Devolve quantas mensagens gerou.
    async fn deliver_text(&self, target: &ReplyTarget<'_>, text: &str) -> Result<usize, AppError> {
        let chunks = split_message(text, MESSAGE_CHAR_LIMIT);
        let mut held_back: Option<DeliveryStatus> = None;

        for chunk in &chunks {
            match held_back {
                None => {
                    held_back = self.deliver(target, chunk, None).await?.queued_status();
                }
                Some(status) => {
                    let mut outgoing = NewMessage::outgoing(target.conversation, SenderType::Bot, chunk.clone());
                    outgoing.delivery_status = status;
                    self.store.insert_message(&outgoing).await?;
                    self.store.touch_conversation(target.conversation.id, chunk, false).await?;
                }
            }
        }
        Ok(chunks.len())
    }

    /// Grava como `bot` em envio, tenta enviar e registra o resultado.
    /// Falha temporária fica para o worker de envio.
    async fn deliver(
        &self,
        target: &ReplyTarget<'_>,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<DeliveryOutcome, AppError> {
        let mut outgoing = NewMessage::outgoing(target.conversation, SenderType::Bot, content.to_string());
        outgoing.image_url = image_url.map(str::to_string);

        let stored = self
            .store
            .insert_message(&outgoing)
            .await?
            .ok_or_else(|| anyhow::anyhow!("mensagem de saída não foi gravada"))?;

        let recipient = &target.conversation.customer_facebook_id;
        let token = &target.page.access_token;
        let result = match image_url {
            Some(url) => self.gateway.send_image(token, recipient, url).await,
            None => self.gateway.send_text(token, recipient, content).await,
        };

        if let Err(e) = &result {
            if e.is_invalid_page_token() {
                tracing::error!("🔒 Token da página {} inválido; página desativada", target.page.page_id);
                self.store.deactivate_page(&target.page.page_id).await?;
            }
        }

        let outcome = DeliveryOutcome::from_send_result(result);
        if !outcome.is_sent() {
            tracing::warn!("📭 Envio da mensagem {} não concluído: {:?}", stored.id, outcome);
        }
        self.store.record_delivery(stored.id, &outcome).await?;
        self.store.touch_conversation(target.conversation.id, content, false).await?;
        Ok(outcome)
    }
}

fn order_confirmation(detail: &OrderDetail) -> String {
    format!(
        "Pedido #{} registrado! Total: R$ {}. Em breve entraremos em contato para combinar a entrega.",
        detail.header.order_number, detail.header.total_amount
    )
}

fn order_apology(error: &AppError) -> String {
    match error {
        AppError::InsufficientStock { product } => format!(
            "Desculpe, não temos estoque suficiente de {} no momento. Quer ajustar a quantidade?",
            product
        ),
        AppError::NotFound(_) => {
            "Desculpe, não encontrei um dos produtos do pedido. Pode confirmar os itens?".to_string()
        }
        _ => "Desculpe, não consegui registrar o pedido agora. Um atendente vai falar com você em breve."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        assistant::FunctionCall,
        company::{CompanyStatus, SubscriptionStatus},
        order::{Order, OrderItem, OrderSource, OrderStatus},
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::Mutex;

    // --- Fakes em memória ---

    #[derive(Default)]
    struct MemoryState {
        pages: Vec<FacebookPage>,
        companies: Vec<Company>,
        settings: Vec<GeminiSettings>,
        conversations: Vec<Conversation>,
        messages: Vec<Message>,
        products: Vec<Product>,
        orders: Vec<NewOrder>,
        deliveries: Vec<(Uuid, DeliveryOutcome)>,
        deactivated: Vec<String>,
    }

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<MemoryState>,
    }

    #[async_trait]
    impl AssistantStore for MemoryStore {
        async fn find_active_page(&self, page_id: &str) -> Result<Option<FacebookPage>, AppError> {
            let state = self.state.lock().unwrap();
            Ok(state.pages.iter().find(|p| p.page_id == page_id && p.is_active).cloned())
        }

        async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
            let state = self.state.lock().unwrap();
            Ok(state.companies.iter().find(|c| c.id == company_id).cloned())
        }

        async fn gemini_settings(&self, company_id: Uuid) -> Result<Option<GeminiSettings>, AppError> {
            let state = self.state.lock().unwrap();
            Ok(state.settings.iter().find(|s| s.company_id == company_id).cloned())
        }

        async fn find_or_create_conversation(
            &self,
            company_id: Uuid,
            page_id: &str,
            customer_facebook_id: &str,
            customer_name: Option<&str>,
        ) -> Result<Conversation, AppError> {
            let mut state = self.state.lock().unwrap();
            if let Some(c) = state.conversations.iter().find(|c| {
                c.company_id == company_id && c.page_id == page_id && c.customer_facebook_id == customer_facebook_id
            }) {
                return Ok(c.clone());
            }
            let conversation = Conversation {
                id: Uuid::new_v4(),
                company_id,
                page_id: page_id.into(),
                customer_facebook_id: customer_facebook_id.into(),
                customer_name: customer_name.map(str::to_string),
                last_message: None,
                last_message_at: None,
                unread_count: 0,
                bot_enabled: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            state.conversations.push(conversation.clone());
            Ok(conversation)
        }

        async fn insert_message(&self, message: &NewMessage) -> Result<Option<Message>, AppError> {
            let mut state = self.state.lock().unwrap();
            if let Some(mid) = &message.facebook_message_id {
                if state.messages.iter().any(|m| m.facebook_message_id.as_ref() == Some(mid)) {
                    return Ok(None);
                }
            }
            let stored = Message {
                id: Uuid::new_v4(),
                conversation_id: message.conversation_id,
                company_id: message.company_id,
                sender_type: message.sender_type,
                content: message.content.clone(),
                image_url: message.image_url.clone(),
                facebook_message_id: message.facebook_message_id.clone(),
                delivery_status: message.delivery_status,
                attempts: 0,
                last_error: None,
                created_at: Utc::now(),
            };
            state.messages.push(stored.clone());
            Ok(Some(stored))
        }

        async fn touch_conversation(&self, conversation_id: Uuid, last_message: &str, from_customer: bool) -> Result<(), AppError> {
            let mut state = self.state.lock().unwrap();
            if let Some(c) = state.conversations.iter_mut().find(|c| c.id == conversation_id) {
                c.last_message = Some(last_message.to_string());
                if from_customer {
                    c.unread_count += 1;
                }
            }
            Ok(())
        }

        async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>, AppError> {
            let state = self.state.lock().unwrap();
            let all: Vec<Message> = state
                .messages
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect();
            let skip = all.len().saturating_sub(limit as usize);
            Ok(all.into_iter().skip(skip).collect())
        }

        async fn catalog(&self, company_id: Uuid, _limit: i64) -> Result<Vec<Product>, AppError> {
            let state = self.state.lock().unwrap();
            Ok(state.products.iter().filter(|p| p.company_id == company_id).cloned().collect())
        }

        async fn find_product(&self, company_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .products
                .iter()
                .find(|p| p.id == product_id && p.company_id == company_id)
                .cloned())
        }

        async fn create_order(&self, company_id: Uuid, order: NewOrder) -> Result<OrderDetail, AppError> {
            let mut state = self.state.lock().unwrap();
            let products: Vec<Product> =
                state.products.iter().filter(|p| p.company_id == company_id).cloned().collect();
            let lines = crate::services::order_service::price_order_lines(&products, &order.items)?;
            let total = crate::services::order_service::order_total(&lines);
            state.orders.push(order.clone());
            let header = Order {
                id: Uuid::new_v4(),
                company_id,
                conversation_id: order.conversation_id,
                order_number: state.orders.len() as i64,
                customer_name: order.customer_name,
                customer_phone: order.customer_phone,
                customer_address: order.customer_address,
                status: OrderStatus::Pending,
                source: order.source,
                total_amount: total,
                notes: order.notes,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let items = lines
                .into_iter()
                .map(|l| OrderItem {
                    id: Uuid::new_v4(),
                    order_id: header.id,
                    product_id: Some(l.product_id),
                    product_name: l.product_name,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect();
            Ok(OrderDetail { header, items })
        }

        async fn record_delivery(&self, message_id: Uuid, outcome: &DeliveryOutcome) -> Result<(), AppError> {
            let mut state = self.state.lock().unwrap();
            state.deliveries.push((message_id, outcome.clone()));
            if let Some(message) = state
                .messages
                .iter_mut()
                .find(|m| m.id == message_id && m.delivery_status == DeliveryStatus::Sending)
            {
                message.attempts += 1;
                message.delivery_status = outcome.status_after(message.attempts, 3);
                if let DeliveryOutcome::Sent { facebook_message_id } = outcome {
                    message.facebook_message_id = Some(facebook_message_id.clone());
                }
            }
            Ok(())
        }

        async fn deactivate_page(&self, page_id: &str) -> Result<(), AppError> {
            let mut state = self.state.lock().unwrap();
            state.deactivated.push(page_id.to_string());
            Ok(())
        }
    }

    struct FixedGenerator {
        reply: Result<ModelReply, String>,
        requests: Mutex<Vec<PromptRequest>>,
    }

    impl FixedGenerator {
        fn replying(reply: ModelReply) -> Self {
            Self { reply: Ok(reply), requests: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { reply: Err("quota".into()), requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ReplyGenerator for FixedGenerator {
        async fn generate(&self, _api_key: &str, _model: &str, request: &PromptRequest) -> Result<ModelReply, AppError> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(AppError::GeminiApi)
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(String, String)>>,
        fail_with: Option<i64>,
        // Textos a partir desta chamada (1, 2, ...) voltam 503
        unavailable_from: Option<usize>,
        text_calls: Mutex<usize>,
    }

    #[async_trait]
    impl MessengerGateway for RecordingGateway {
        async fn send_text(&self, _token: &str, recipient_id: &str, text: &str) -> Result<String, AppError> {
            let call = {
                let mut calls = self.text_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if let Some(code) = self.fail_with {
                return Err(AppError::GraphApi { code, message: "falhou".into() });
            }
            if self.unavailable_from.is_some_and(|from| call >= from) {
                return Err(AppError::GraphApi { code: 503, message: "HTTP 503".into() });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((recipient_id.to_string(), text.to_string()));
            Ok(format!("m_{}", sent.len()))
        }

        async fn send_image(&self, _token: &str, recipient_id: &str, image_url: &str) -> Result<String, AppError> {
            if let Some(code) = self.fail_with {
                return Err(AppError::GraphApi { code, message: "falhou".into() });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push((recipient_id.to_string(), format!("img:{}", image_url)));
            Ok(format!("m_{}", sent.len()))
        }
    }

    // --- Cenário ---

    const PAGE: &str = "pagina-1";
    const CUSTOMER: &str = "cliente-1";

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<RecordingGateway>,
        generator: Arc<FixedGenerator>,
        service: AutoReplyService,
        product: Product,
    }

    fn fixture(generator: FixedGenerator, gateway: RecordingGateway) -> Fixture {
        let company_id = Uuid::new_v4();
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            company_id,
            category_id: None,
            name: "Camiseta".into(),
            description: None,
            price: Decimal::new(5000, 2),
            sale_price: None,
            stock_quantity: 5,
            image_url: Some("https://cdn.loja/camiseta.jpg".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
            category_name: None,
        };

        let store = MemoryStore::default();
        {
            let mut state = store.state.lock().unwrap();
            state.companies.push(Company {
                id: company_id,
                name: "Loja Sol".into(),
                email: "sol@loja.com".into(),
                password_hash: String::new(),
                status: CompanyStatus::Active,
                subscription_status: SubscriptionStatus::Active,
                created_at: now,
                updated_at: now,
            });
            state.pages.push(FacebookPage {
                id: Uuid::new_v4(),
                company_id,
                page_id: PAGE.into(),
                page_name: "Loja Sol".into(),
                access_token: "token-da-pagina".into(),
                is_active: true,
                webhook_subscribed: true,
                created_at: now,
                updated_at: now,
            });
            state.settings.push(GeminiSettings {
                company_id,
                api_key: "chave".into(),
                model: "gemini-1.5-flash".into(),
                personality_prompt: "Você é a Ana.".into(),
                products_prompt: String::new(),
                temperature: 0.7,
                max_output_tokens: 1024,
                auto_reply_enabled: true,
                updated_at: now,
            });
            state.products.push(product.clone());
        }

        let store = Arc::new(store);
        let generator = Arc::new(generator);
        let gateway = Arc::new(gateway);
        let service = AutoReplyService::new(
            store.clone(),
            generator.clone(),
            gateway.clone(),
            AutoReplyOptions::default(),
        );
        Fixture { store, gateway, generator, service, product }
    }

    fn incoming(text: &str, mid: &str) -> IncomingMessage {
        IncomingMessage {
            page_id: PAGE.into(),
            sender_id: CUSTOMER.into(),
            text: text.into(),
            message_id: Some(mid.into()),
            customer_name: None,
        }
    }

    fn text_reply(text: &str) -> ModelReply {
        ModelReply { text: text.into(), function_calls: vec![] }
    }

    #[tokio::test]
    async fn replies_with_text_and_records_delivery() {
        let f = fixture(FixedGenerator::replying(text_reply("Olá! Como posso ajudar?")), RecordingGateway::default());

        let outcome = f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::Replied { messages_sent: 1, orders_created: vec![] });

        let sent = f.gateway.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(CUSTOMER.to_string(), "Olá! Como posso ajudar?".to_string())]);

        let state = f.store.state.lock().unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].sender_type, SenderType::Customer);
        assert_eq!(state.messages[1].sender_type, SenderType::Bot);
        assert!(state.deliveries[0].1.is_sent());

        // O prompt leva a mensagem do cliente e o catálogo
        let requests = f.generator.requests.lock().unwrap();
        assert_eq!(requests[0].history.len(), 1);
        assert!(requests[0].system_instruction.contains(&f.product.id.to_string()));
    }

    #[tokio::test]
    async fn duplicate_message_is_processed_once() {
        let f = fixture(FixedGenerator::replying(text_reply("Oi!")), RecordingGateway::default());

        f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();
        let again = f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();

        assert_eq!(again, AutoReplyOutcome::Duplicate);
        assert_eq!(f.gateway.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_bot_only_stores_the_message() {
        let f = fixture(FixedGenerator::replying(text_reply("Oi!")), RecordingGateway::default());
        f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();
        {
            let mut state = f.store.state.lock().unwrap();
            state.conversations[0].bot_enabled = false;
        }

        let outcome = f.service.handle_incoming(incoming("alguém aí?", "mid.2")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::Stored);
        assert_eq!(f.gateway.sent.lock().unwrap().len(), 1);
        assert_eq!(f.store.state.lock().unwrap().conversations[0].unread_count, 2);
    }

    #[tokio::test]
    async fn missing_api_key_without_fallback_stores_only() {
        let f = fixture(FixedGenerator::replying(text_reply("Oi!")), RecordingGateway::default());
        f.store.state.lock().unwrap().settings[0].api_key.clear();

        let outcome = f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::Stored);
        assert!(f.generator.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_page_is_reported() {
        let f = fixture(FixedGenerator::replying(text_reply("Oi!")), RecordingGateway::default());
        let mut message = incoming("oi", "mid.1");
        message.page_id = "outra".into();

        let outcome = f.service.handle_incoming(message).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::PageNotRegistered);
        assert!(f.store.state.lock().unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_sends_nothing() {
        let f = fixture(FixedGenerator::failing(), RecordingGateway::default());

        let outcome = f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::GenerationFailed);
        assert!(f.gateway.sent.lock().unwrap().is_empty());
        assert_eq!(f.store.state.lock().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn tool_calls_send_image_and_create_order() {
        let f = fixture(FixedGenerator::replying(ModelReply::default()), RecordingGateway::default());
        let product_id = f.product.id.to_string();

        let reply = ModelReply {
            text: "Aqui está!".into(),
            function_calls: vec![
                FunctionCall { name: "send_product_image".into(), args: json!({ "product_id": product_id }) },
                FunctionCall {
                    name: "create_order".into(),
                    args: json!({
                        "items": [{ "product_id": product_id, "quantity": 2 }],
                        "customer_name": "Maria",
                        "customer_phone": "11999990000",
                        "customer_address": "Rua A, 10"
                    }),
                },
                FunctionCall { name: "desconhecida".into(), args: json!({}) },
            ],
        };
        let service = AutoReplyService::new(
            f.store.clone(),
            Arc::new(FixedGenerator::replying(reply)),
            f.gateway.clone(),
            AutoReplyOptions::default(),
        );

        let outcome = service.handle_incoming(incoming("quero duas", "mid.1")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::Replied { messages_sent: 3, orders_created: vec![1] });

        let sent = f.gateway.sent.lock().unwrap().clone();
        assert_eq!(sent[0].1, "Aqui está!");
        assert_eq!(sent[1].1, "img:https://cdn.loja/camiseta.jpg");
        assert!(sent[2].1.contains("Pedido #1"));
        assert!(sent[2].1.contains("100.00"));

        let state = f.store.state.lock().unwrap();
        assert_eq!(state.orders[0].source, OrderSource::Messenger);
        assert_eq!(state.orders[0].conversation_id, Some(state.conversations[0].id));
        assert_eq!(state.messages[2].image_url.as_deref(), Some("https://cdn.loja/camiseta.jpg"));
    }

    #[tokio::test]
    async fn order_without_stock_gets_an_apology() {
        let f = fixture(FixedGenerator::replying(ModelReply::default()), RecordingGateway::default());
        let reply = ModelReply {
            text: String::new(),
            function_calls: vec![FunctionCall {
                name: "create_order".into(),
                args: json!({
                    "items": [{ "product_id": f.product.id.to_string(), "quantity": 9 }],
                    "customer_name": "Maria",
                    "customer_phone": "1",
                    "customer_address": "Rua"
                }),
            }],
        };
        let service = AutoReplyService::new(
            f.store.clone(),
            Arc::new(FixedGenerator::replying(reply)),
            f.gateway.clone(),
            AutoReplyOptions::default(),
        );

        let outcome = service.handle_incoming(incoming("quero 9", "mid.1")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::Replied { messages_sent: 1, orders_created: vec![] });
        let sent = f.gateway.sent.lock().unwrap().clone();
        assert!(sent[0].1.contains("estoque suficiente de Camiseta"));
    }

    #[tokio::test]
    async fn transient_failure_leaves_message_for_retry() {
        let gateway = RecordingGateway { fail_with: Some(613), ..Default::default() };
        let f = fixture(FixedGenerator::replying(text_reply("Oi!")), gateway);

        f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();

        let state = f.store.state.lock().unwrap();
        assert!(matches!(state.deliveries[0].1, DeliveryOutcome::Retry { .. }));
        assert_eq!(state.messages[1].delivery_status, DeliveryStatus::Pending);
        assert_eq!(state.messages[1].attempts, 1);
        assert!(state.deactivated.is_empty());
    }

    #[tokio::test]
    async fn long_reply_is_stored_as_one_message_per_chunk() {
        let gateway = RecordingGateway { unavailable_from: Some(2), ..Default::default() };
        let long = "a".repeat(MESSAGE_CHAR_LIMIT * 2 + 500);
        let f = fixture(FixedGenerator::replying(text_reply(&long)), gateway);

        let outcome = f.service.handle_incoming(incoming("me conta tudo", "mid.1")).await.unwrap();
        assert_eq!(outcome, AutoReplyOutcome::Replied { messages_sent: 3, orders_created: vec![] });

        // Só o primeiro pedaço saiu; o segundo falhou e o terceiro nem foi tentado
        assert_eq!(f.gateway.sent.lock().unwrap().len(), 1);
        assert_eq!(*f.gateway.text_calls.lock().unwrap(), 2);

        let state = f.store.state.lock().unwrap();
        let bot: Vec<&Message> = state.messages.iter().filter(|m| m.sender_type == SenderType::Bot).collect();
        assert_eq!(bot.len(), 3);
        assert!(bot.iter().all(|m| m.content.chars().count() <= MESSAGE_CHAR_LIMIT));

        // O pedaço entregue fica como enviado e não volta para a fila
        assert_eq!(bot[0].delivery_status, DeliveryStatus::Sent);
        assert_eq!(bot[0].facebook_message_id.as_deref(), Some("m_1"));
        assert_eq!((bot[1].delivery_status, bot[1].attempts), (DeliveryStatus::Pending, 1));
        assert_eq!((bot[2].delivery_status, bot[2].attempts), (DeliveryStatus::Pending, 0));
        assert_eq!(state.deliveries.len(), 2);
    }

    #[tokio::test]
    async fn revoked_token_deactivates_the_page() {
        let gateway = RecordingGateway { fail_with: Some(190), ..Default::default() };
        let f = fixture(FixedGenerator::replying(text_reply("Oi!")), gateway);

        f.service.handle_incoming(incoming("oi", "mid.1")).await.unwrap();

        let state = f.store.state.lock().unwrap();
        assert!(matches!(state.deliveries[0].1, DeliveryOutcome::Failed { .. }));
        assert_eq!(state.deactivated, vec![PAGE.to_string()]);
    }
}
