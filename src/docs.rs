// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Empresa ---
        handlers::companies::get_me,
        handlers::companies::update_me,
        handlers::companies::stats,

        // --- Catálogo ---
        handlers::catalog::create_category,
        handlers::catalog::list_categories,
        handlers::catalog::update_category,
        handlers::catalog::delete_category,
        handlers::catalog::create_product,
        handlers::catalog::list_products,
        handlers::catalog::get_product,
        handlers::catalog::update_product,
        handlers::catalog::delete_product,
        handlers::catalog::adjust_stock,

        // --- Pedidos ---
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_order_status,

        // --- Páginas ---
        handlers::pages::list_pages,
        handlers::pages::connect_page,
        handlers::pages::subscribe_page,
        handlers::pages::disconnect_page,

        // --- Assistente ---
        handlers::gemini::get_settings,
        handlers::gemini::update_settings,

        // --- Conversas ---
        handlers::conversations::list_conversations,
        handlers::conversations::list_messages,
        handlers::conversations::send_message,
        handlers::conversations::mark_read,
        handlers::conversations::set_bot,
    ),
    components(
        schemas(
            models::company::Company,
            models::company::CompanyStatus,
            models::company::SubscriptionStatus,
            models::company::RegisterCompanyPayload,
            models::company::LoginPayload,
            models::company::UpdateCompanyPayload,
            models::company::AuthResponse,
            models::company::CompanyStats,
            models::company::OrderStatusCount,

            models::catalog::Category,
            models::catalog::CategoryPayload,
            models::catalog::Product,
            models::catalog::ProductPayload,
            models::catalog::StockAdjustmentPayload,

            models::order::Order,
            models::order::OrderItem,
            models::order::OrderDetail,
            models::order::OrderStatus,
            models::order::OrderSource,
            models::order::OrderLinePayload,
            models::order::CreateOrderPayload,
            models::order::UpdateOrderStatusPayload,

            models::facebook::FacebookPage,
            models::facebook::ConnectPagePayload,

            models::gemini::GeminiSettingsView,
            models::gemini::UpdateGeminiSettingsPayload,

            models::conversation::Conversation,
            models::conversation::Message,
            models::conversation::SenderType,
            models::conversation::DeliveryStatus,
            models::conversation::SendMessagePayload,
            models::conversation::BotTogglePayload,
        )
    ),
    tags(
        (name = "Autenticação", description = "Registro e login de empresas"),
        (name = "Empresa", description = "Dados e indicadores da empresa autenticada"),
        (name = "Catálogo", description = "Categorias, produtos e estoque"),
        (name = "Pedidos", description = "Pedidos manuais e vindos do Messenger"),
        (name = "Páginas do Facebook", description = "Conexão das páginas e assinatura do webhook"),
        (name = "Assistente", description = "Configuração do Gemini"),
        (name = "Conversas", description = "Caixa de entrada do Messenger")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
