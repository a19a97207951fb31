//src/main.rs

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use messenger_commerce::{
    app::build_router,
    config::{AppConfig, AppState},
    db::{ConversationRepository, PageRepository, PgOutboxQueue},
    workers::outbox::{OutboxSettings, OutboxWorker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG sobrescreve o nível padrão)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = AppConfig::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if app_state.config.facebook_app_secret.is_none() {
        tracing::warn!("⚠️ FACEBOOK_APP_SECRET não definida: a assinatura do webhook não será verificada");
    }

    // Worker de envio das mensagens pendentes
    let shutdown = CancellationToken::new();
    let queue = PgOutboxQueue::new(
        ConversationRepository::new(app_state.db_pool.clone()),
        PageRepository::new(app_state.db_pool.clone()),
        app_state.config.outbox_stale_after,
    );
    let worker = OutboxWorker::new(
        std::sync::Arc::new(queue),
        std::sync::Arc::new(app_state.graph_client.clone()),
        OutboxSettings {
            interval: app_state.config.outbox_interval,
            batch_size: app_state.config.outbox_batch_size,
            max_attempts: app_state.config.outbox_max_attempts,
        },
    );
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    // Inicia o servidor
    let addr = app_state.config.server_addr.clone();
    let app = build_router(app_state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Para o worker depois que o servidor parou de aceitar requisições
    shutdown.cancel();
    worker_handle.await?;

    tracing::info!("👋 Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("🔥 Falha ao instalar o handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("🔥 Falha ao instalar o handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Sinal de desligamento recebido");
}
