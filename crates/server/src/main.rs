use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pledgedesk_core::{
    create_audit_system, load_config, validate_config, AuditEvent, AuditStore, CalculationService,
    CommitService, HistoryStore, HttpBackOfficeClient, PushEvent, SqliteAuditStore,
    SqliteHistoryStore, UpdateListener, WorkflowEngine,
};

use pledgedesk_server::api::create_router;
use pledgedesk_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

/// Buffer size for the inbound push-event channel
const PUSH_BUFFER_SIZE: usize = 256;

/// How often the abandoned-session sweeper runs
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PLEDGEDESK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Back-office gateway: {}", config.backoffice.base_url);
    info!("Database path: {:?}", config.database.path);

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Create SQLite audit store
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    info!("Audit store initialized");

    // Create SQLite history store (shares the database file with the audit trail)
    let history_store: Arc<dyn HistoryStore> = Arc::new(
        SqliteHistoryStore::new(&config.database.path)
            .context("Failed to create history store")?,
    );
    info!("History store initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);

    // Spawn audit writer task
    let writer_handle = tokio::spawn(audit_writer.run());

    // Emit ServiceStarted event
    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;
    info!("Emitted ServiceStarted audit event");

    // One HTTP client serves both remote contracts (calculation and commit)
    let backoffice = Arc::new(HttpBackOfficeClient::new(config.backoffice.clone()));
    let calc: Arc<dyn CalculationService> = backoffice.clone();
    let commit: Arc<dyn CommitService> = backoffice;

    // Create the workflow engine
    let engine = Arc::new(
        WorkflowEngine::new(
            config.auth_policy.clone(),
            config.session.clone(),
            calc,
            commit,
            Arc::clone(&history_store),
        )
        .with_audit(audit_handle.clone()),
    );

    // Warm the recent-transaction ring from durable history
    match engine.restore_recent_history().await {
        Ok(count) => info!("Restored {} recent transactions from history", count),
        Err(e) => warn!("Failed to restore recent history: {}", e),
    }

    // Wire the push channel into the engine
    let (push_tx, push_rx) = mpsc::channel::<PushEvent>(PUSH_BUFFER_SIZE);
    let listener = UpdateListener::new(Arc::clone(&engine));
    listener.start(push_rx);
    info!("Update listener started");

    // Background sweeper for abandoned sessions
    let sweeper_engine = Arc::clone(&engine);
    let sweeper_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            if let Some(session) = sweeper_engine.sweep_abandoned().await {
                info!("Swept abandoned session {}", session.id);
            }
        }
    });

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&engine),
        audit_store,
        history_store,
        push_tx,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener_socket = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener_socket, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    sweeper_handle.abort();
    let _ = sweeper_handle.await;
    listener.stop();

    // Emit ServiceStopped event
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Drop all holders of AuditHandle so the writer's channel closes.
    // The engine holds a clone, and the update listener holds the engine,
    // so both must go before we await the writer. Order matters: the
    // final event is emitted BEFORE the handles are dropped.
    drop(listener);
    drop(engine);
    drop(audit_handle);

    // Wait for writer to finish processing remaining events
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
