use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod console;
mod controllers;
mod db;
mod models;
mod realtime;
mod text;
mod usage;

use config::Config;
use console::{ConsoleLogStore, PRUNE_INTERVAL_SECS};
use db::SupabaseClient;
use realtime::RealtimeGateway;

pub struct AppState {
    pub config: Config,
    /// Server-side database client, absent when credentials are not configured
    pub db: Option<Arc<SupabaseClient>>,
    pub console: Arc<ConsoleLogStore>,
    pub realtime: Arc<RealtimeGateway>,
}

impl AppState {
    pub fn new(config: Config, db: Option<Arc<SupabaseClient>>) -> Self {
        let console = Arc::new(ConsoleLogStore::new(
            config.console_max_logs_per_token,
            config.console_log_ttl,
        ));
        let realtime = Arc::new(RealtimeGateway::new(
            config.realtime_max_events,
            config.realtime_heartbeat,
        ));

        Self {
            config,
            db,
            console,
            realtime,
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    let db = match config.supabase_credentials() {
        Some((url, key)) => match SupabaseClient::new(url, key) {
            Ok(client) => {
                log::info!("Using Supabase project at {}", client.project_url());
                Some(Arc::new(client))
            }
            Err(e) => {
                log::error!("Ignoring Supabase credentials: {}", e);
                None
            }
        },
        None => {
            log::warn!(
                "SUPABASE_URL / SUPABASE_ANON_KEY not set - database routes will answer 500"
            );
            None
        }
    };

    let state = web::Data::new(AppState::new(config, db));
    log::info!(
        "Console buffers hold {} lines per token for {}s",
        state.config.console_max_logs_per_token,
        state.config.console_log_ttl.as_secs()
    );

    // Start console pruning background task
    let (pruner_shutdown_tx, pruner_shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(console::run_pruner(
        state.console.clone(),
        Duration::from_secs(PRUNE_INTERVAL_SECS),
        pruner_shutdown_rx,
    ));

    log::info!("Starting convo-backend server on port {}", port);
    log::info!("Realtime event stream available at /ws/realtime");

    let app_state = state.clone();
    let result = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::console::config)
            .configure(controllers::sessions::config)
            .configure(controllers::messages::config)
            .configure(controllers::tool_calls::config)
            .configure(controllers::webhook::config)
            .configure(controllers::usage::config)
            .configure(controllers::settings::config)
            .configure(controllers::realtime::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    log::info!("Shutting down");
    let _ = pruner_shutdown_tx.send(());
    if state.realtime.stop().await {
        log::info!("[REALTIME] Subscription closed on shutdown");
    }

    result
}
