// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, sync::Arc, time::Duration};

use crate::{
    clients::{gemini::GeminiClient, graph::GraphClient},
    db::{
        AssistantStoreImpl, CatalogRepository, CompanyRepository, ConversationRepository,
        GeminiSettingsRepository, OrderRepository, PageRepository,
    },
    services::{
        auth::AuthService,
        auto_reply::{AutoReplyOptions, AutoReplyService},
        catalog_service::CatalogService,
        conversation_service::ConversationService,
        order_service::OrderService,
        page_service::PageService,
    },
};

/// Configuração lida do ambiente (e do `.env`). Nada de segredo no código.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub facebook_verify_token: String,
    pub facebook_app_secret: Option<String>,
    pub graph_api_base: String,
    pub graph_api_version: String,
    pub gemini_api_base: String,
    pub gemini_default_model: String,
    pub gemini_fallback_api_key: Option<String>,
    pub outbox_interval: Duration,
    pub outbox_batch_size: i64,
    pub outbox_max_attempts: i32,
    /// Tempo após o qual um envio em andamento é considerado abandonado.
    pub outbox_stale_after: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Lê a configuração de qualquer fonte chave → valor (o ambiente, ou um mapa nos testes).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} deve ser definida", key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| optional(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: or_default("SERVER_ADDR", "0.0.0.0:3000"),
            db_max_connections: parse_or(optional("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10)?,
            facebook_verify_token: required("FACEBOOK_VERIFY_TOKEN")?,
            facebook_app_secret: optional("FACEBOOK_APP_SECRET"),
            graph_api_base: or_default("GRAPH_API_BASE", "https://graph.facebook.com"),
            graph_api_version: or_default("GRAPH_API_VERSION", "v21.0"),
            gemini_api_base: or_default(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_default_model: or_default("GEMINI_DEFAULT_MODEL", "gemini-1.5-flash"),
            gemini_fallback_api_key: optional("GEMINI_FALLBACK_API_KEY"),
            outbox_interval: Duration::from_secs(parse_or(
                optional("OUTBOX_INTERVAL_SECS"),
                "OUTBOX_INTERVAL_SECS",
                5,
            )?),
            outbox_batch_size: parse_or(optional("OUTBOX_BATCH_SIZE"), "OUTBOX_BATCH_SIZE", 20)?,
            outbox_max_attempts: parse_or(optional("OUTBOX_MAX_ATTEMPTS"), "OUTBOX_MAX_ATTEMPTS", 3)?,
            outbox_stale_after: Duration::from_secs(parse_or(
                optional("OUTBOX_STALE_AFTER_SECS"),
                "OUTBOX_STALE_AFTER_SECS",
                120,
            )?),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} inválida ('{}'): {}", key, raw, e)),
        None => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub auth_service: AuthService,
    pub catalog_service: CatalogService,
    pub order_service: OrderService,
    pub conversation_service: ConversationService,
    pub page_service: PageService,
    pub gemini_settings_repo: GeminiSettingsRepository,
    pub company_repo: CompanyRepository,
    pub auto_reply: AutoReplyService,
    pub graph_client: GraphClient,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::from_pool(db_pool, config)
    }

    /// Monta o gráfico de dependências a partir de uma pool já criada.
    pub fn from_pool(db_pool: PgPool, config: AppConfig) -> anyhow::Result<Self> {
        let graph_client = GraphClient::new(&config.graph_api_base, &config.graph_api_version)?;
        let gemini_client = GeminiClient::new(&config.gemini_api_base)?;

        let company_repo = CompanyRepository::new(db_pool.clone());
        let catalog_repo = CatalogRepository::new(db_pool.clone());
        let order_repo = OrderRepository::new(db_pool.clone());
        let conversation_repo = ConversationRepository::new(db_pool.clone());
        let page_repo = PageRepository::new(db_pool.clone());
        let gemini_settings_repo = GeminiSettingsRepository::new(db_pool.clone());

        let auth_service = AuthService::new(company_repo.clone(), config.jwt_secret.clone());
        let catalog_service = CatalogService::new(catalog_repo.clone(), db_pool.clone());
        let order_service = OrderService::new(order_repo, catalog_repo.clone(), db_pool.clone());
        let page_service = PageService::new(page_repo.clone(), graph_client.clone());
        let conversation_service = ConversationService::new(
            conversation_repo.clone(),
            page_repo.clone(),
            graph_client.clone(),
            config.outbox_max_attempts,
        );

        let store = AssistantStoreImpl::new(
            company_repo.clone(),
            page_repo,
            gemini_settings_repo.clone(),
            conversation_repo,
            catalog_repo,
            order_service.clone(),
            config.outbox_max_attempts,
        );
        let auto_reply = AutoReplyService::new(
            Arc::new(store),
            Arc::new(gemini_client),
            Arc::new(graph_client.clone()),
            AutoReplyOptions {
                fallback_api_key: config.gemini_fallback_api_key.clone(),
                ..AutoReplyOptions::default()
            },
        );

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            auth_service,
            catalog_service,
            order_service,
            conversation_service,
            page_service,
            gemini_settings_repo,
            company_repo,
            auto_reply,
            graph_client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/loja"),
        ("JWT_SECRET", "segredo"),
        ("FACEBOOK_VERIFY_TOKEN", "verifica"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let cfg = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.server_addr, "0.0.0.0:3000");
        assert_eq!(cfg.graph_api_version, "v21.0");
        assert_eq!(cfg.gemini_default_model, "gemini-1.5-flash");
        assert_eq!(cfg.outbox_interval, Duration::from_secs(5));
        assert_eq!(cfg.outbox_max_attempts, 3);
        assert_eq!(cfg.outbox_stale_after, Duration::from_secs(120));
        assert!(cfg.facebook_app_secret.is_none());
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("FACEBOOK_VERIFY_TOKEN"));
    }

    #[test]
    fn unparsable_number_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("OUTBOX_BATCH_SIZE", "muitos"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
