//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use chartboard::{
    config::{AppState, Config},
    router::create_router,
    services::lock_reaper::start_lock_reaper,
    ws::start_heartbeat,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chartboard=info,tower_http=info")),
        )
        .with_target(false)
        .compact()
        .init();

    // Sem configuração ou sem banco a aplicação não deve iniciar.
    let config = Config::from_env().expect("Configuração inválida.");
    let app_state = AppState::new(config)
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // --- Tarefas de fundo ---
    let heartbeat = start_heartbeat(app_state.rooms.clone(), app_state.config.ws_heartbeat);
    let reaper = start_lock_reaper(
        app_state.record_service.clone(),
        app_state.rooms.clone(),
        app_state.config.lock_reap_interval,
    );

    let addr = format!("{}:{}", app_state.config.host, app_state.config.port);
    let rooms = app_state.rooms.clone();
    let app = create_router(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            rooms.shutdown_all().await;
        })
        .await
        .expect("Erro no servidor Axum");

    heartbeat.abort();
    reaper.abort();
    tracing::info!("Servidor encerrado");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Falha ao escutar Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Falha ao escutar SIGTERM");
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
    tracing::info!("Sinal de desligamento recebido");
}
