use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &todo_cosmos::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        environment = ?cfg.basic.environment,
        source = ?cfg.bootstrap.source,
        vault = %cfg.vault.base_uri,
        static_dir = %cfg.basic.static_dir,
        loglevel = %cfg.basic.loglevel
    );

    // The handle must exist before the listener accepts a single request.
    let cosmos = todo_cosmos::initialize_cosmos_client_instance(cfg).await?;

    let state = todo_cosmos::router::TodoState::new(cosmos);
    let app = todo_cosmos::router::todo_router(state, &cfg.basic);

    let listener = TcpListener::bind(cfg.basic.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(todo_cosmos::shutdown::shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
