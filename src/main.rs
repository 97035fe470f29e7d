use anyhow::Context;
use settlement_engine::engine::{
    Clock, MarketSimulator, MaturityScheduler, OutcomeResolver, PositionLifecycle, RandomWalk,
    SystemClock, TransactionJournal,
};
use settlement_engine::{api, config::Config, db::init_db, Repository, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("failed to initialize database at {}", config.database_path))?;

    let store: Arc<dyn Store> = Arc::new(Repository::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let simulator: Arc<dyn MarketSimulator> = match config.market_seed {
        Some(seed) => Arc::new(RandomWalk::seeded(seed)),
        None => Arc::new(RandomWalk::from_entropy()),
    };
    let lifecycle = PositionLifecycle::new(
        store.clone(),
        OutcomeResolver::new(simulator),
        clock.clone(),
        config.maturity_credit_wallet,
    );
    let journal = TransactionJournal::new(store.clone(), clock.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = MaturityScheduler::new(
        store.clone(),
        lifecycle.clone(),
        clock.clone(),
        config.scheduler,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let app = api::create_router(api::AppState::new(store, lifecycle, journal, clock));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("server error")?;

    tracing::info!("Shutting down maturity scheduler");
    // A closed channel also stops the scheduler, so a send error is harmless here.
    let _ = shutdown_tx.send(true);
    scheduler_handle.await.context("maturity scheduler panicked")?;
    Ok(())
}
