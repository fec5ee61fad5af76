//! # Voice Command Backend - Main Application Entry Point
//!
//! HTTP service that turns transcribed or typed workstation commands into
//! a catalogue intent plus slot values.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, config.toml, environment)
//! - **intent**: The intent-matching engine and its candle embedding backend
//! - **device**: Compute device selection for the embedding model
//! - **state**: Shared application state, metrics and the command parser
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics collection
//! - **handlers**: HTTP handlers for commands, config and debugging
//! - **error**: HTTP error responses
//!
//! ## Startup:
//! The server starts listening immediately. With `models.preload` enabled the
//! command parser initializes in a background task; requests arriving before
//! it finishes wait on that same initialization instead of starting another.

mod config;
mod device;
mod error;
mod handlers;
mod health;
mod intent;
mod middleware;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use intent::embedder::{EmbedderSettings, SentenceEmbedder};
use intent::{Catalogue, CommandParser, EmbeddingAdapter, SlotExtractor};
use state::AppState;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGINT or SIGTERM arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let parser = Arc::new(build_parser(&config)?);
    if config.models.preload {
        spawn_preload(parser.clone());
    } else {
        info!("Preload disabled, command parser initializes on first use");
    }

    let app_state = AppState::new(config.clone(), parser);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Middleware runs in reverse registration order on the way in
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config))
                    .service(
                        web::scope("/commands")
                            .route("/init", web::post().to(handlers::init_commands))
                            .route("/parse", web::post().to(handlers::parse_command))
                            .route("/execute", web::post().to(handlers::execute_command))
                            .route("/catalogue", web::get().to(handlers::get_catalogue)),
                    ),
            )
            .configure(handlers::configure_debug_routes)
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Assemble the command parser from configuration. Nothing is downloaded or
/// embedded here.
fn build_parser(config: &AppConfig) -> Result<CommandParser> {
    let catalogue = match &config.matching.catalogue_path {
        Some(path) => {
            let catalogue = Catalogue::load(Path::new(path))?;
            info!("Loaded catalogue from {} ({} intents)", path, catalogue.intents().len());
            catalogue
        }
        None => Catalogue::default(),
    };

    let embedder = SentenceEmbedder::new(EmbedderSettings {
        model_id: config.models.embedding_model.clone(),
        revision: config.models.revision.clone(),
        device: config.models.device.clone(),
    });

    let extractor = SlotExtractor::new(config.matching.slot_rules());
    let threshold = config.matching.threshold;

    Ok(CommandParser::new(
        EmbeddingAdapter::new(Arc::new(embedder)),
        catalogue,
        extractor,
        threshold,
    ))
}

fn spawn_preload(parser: Arc<CommandParser>) {
    tokio::spawn(async move {
        info!("Preloading command parser in the background");
        if let Err(e) = parser.init().await {
            warn!("Command parser preload failed, will retry on the next request: {}", e);
        }
    });
}

/// Structured logging to the console, filtered by `RUST_LOG`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_command_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers, graceful shutdown disabled: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
