//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{hash_password, DbAdapter, HttpFunctionNotifier, LogNotifier, MemoryStore},
    config::Config,
    error::ApiError,
    web::{self, state::AppState},
};
use connection_hub_core::{
    ports::{AccountStore, BookingStore, NotificationService, SettingsStore},
    BookingService, ADMIN_EMAILS_SETTING,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10 * 60);

/// The three store ports, backed by one adapter.
struct Stores {
    bookings: Arc<dyn BookingStore>,
    settings: Arc<dyn SettingsStore>,
    accounts: Arc<dyn AccountStore>,
}

async fn connect_stores(config: &Config) -> Result<Stores, ApiError> {
    match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Ok(Stores {
                bookings: db_adapter.clone(),
                settings: db_adapter.clone(),
                accounts: db_adapter,
            })
        }
        None => {
            warn!("DATABASE_URL is not set; using the in-memory store. Data is lost on exit.");
            let memory = Arc::new(MemoryStore::new());
            if let Some((email, password)) = &config.seed_admin {
                memory.add_account(email, &hash_password(password)?).await?;
                let admins = serde_json::to_string(&[email])
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                memory.put_setting(ADMIN_EMAILS_SETTING, &admins).await?;
                info!("Seeded admin account {}.", email);
            }
            Ok(Stores {
                bookings: memory.clone(),
                settings: memory.clone(),
                accounts: memory,
            })
        }
    }
}

fn build_notifier(config: &Config) -> Result<Arc<dyn NotificationService>, ApiError> {
    match &config.functions_url {
        Some(functions_url) => {
            let notifier = HttpFunctionNotifier::new(functions_url, config.functions_key.clone())
                .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;
            info!("Booking confirmations go to {}.", functions_url);
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("FUNCTIONS_URL is not set; booking confirmations are only logged.");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Stores ---
    let stores = connect_stores(&config).await?;

    // --- 3. Initialize Service Adapters ---
    let notifier = build_notifier(&config)?;

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        BookingService::new(stores.bookings, notifier),
        stores.settings,
        stores.accounts,
        config.clone(),
    ));

    // --- 5. Sweep Expired Session Contexts ---
    tokio::spawn({
        let app_state = app_state.clone();
        async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                app_state.sessions.prune_expired().await;
            }
        }
    });

    // --- 6. Create the Web Router ---
    let app = web::router(app_state)?;

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
