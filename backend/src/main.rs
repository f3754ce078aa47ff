//! Agroledger - Backend Server
//!
//! Farm inventory with sale-driven stock reconciliation and optional
//! notarization of price and quantity on an external ledger.

use agroledger_backend::{
    config::{LedgerMode, StoreBackend},
    create_app,
    external::{HttpLedgerClient, InMemoryLedger, LedgerClient},
    services::NotarizationService,
    store::{InMemoryRecordStore, PgRecordStore, RecordStore},
    AppState, Config,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "agroledger_server=debug,agroledger_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Agroledger Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn RecordStore> = match config.store.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Arc::new(PgRecordStore::new(db_pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on exit");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    let ledger: Arc<dyn LedgerClient> = match config.ledger.mode {
        LedgerMode::Http => {
            tracing::info!("Ledger gateway: {}", config.ledger.base_url);
            Arc::new(HttpLedgerClient::new(
                config.ledger.base_url.clone(),
                config.ledger.api_key.clone(),
                config.ledger.timeout(),
            )?)
        }
        LedgerMode::Memory => {
            tracing::warn!("Using in-memory ledger");
            Arc::new(InMemoryLedger::new(config.ledger.signer.clone()))
        }
    };

    // Items left in processing by a previous run can never complete
    let recovered = NotarizationService::new(
        store.clone(),
        ledger.clone(),
        config.ledger.timeout(),
        config.store.conflict_retries,
    )
    .recover_interrupted()
    .await?;
    if recovered > 0 {
        tracing::warn!(recovered, "rolled back interrupted notarizations");
    }

    // Create application state
    let state = AppState {
        store,
        ledger,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
