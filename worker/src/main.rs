use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use relay_core::keys::{CHAT_CHANNEL, FILE_CHANNEL};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod agent_config;
mod bus;
mod config;
mod dispatcher;
mod error;
mod extract;
mod model;
mod pipeline;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use crate::agent_config::HttpAgentConfigSource;
use crate::bus::{RedisPublisher, RedisSubscription, ResponsePublisher};
use crate::config::Settings;
use crate::dispatcher::Dispatcher;
use crate::error::StartupError;
use crate::extract::DocumentExtractor;
use crate::model::{ModelClient, OpenAiCompatModel};
use crate::pipeline::{FilePipeline, MessagePipeline};
use crate::state::{AppState, LoopHealth};
use crate::store::PgStore;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();
    let settings = Settings::parse();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_worker=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if let Err(err) = run(settings).await {
        tracing::error!(error = %err, "relay worker exited with an error");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), StartupError> {
    // Document store
    let pool = PgPoolOptions::new()
        .max_connections(settings.database_max_connections)
        .connect(&settings.database_url)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;
    let store = Arc::new(PgStore::new(pool.clone()));

    // Bus: one multiplexed connection for writes, one dedicated connection per subscription
    let redis = redis::Client::open(settings.redis_url.as_str())?;
    let mut conn = redis.get_multiplexed_async_connection().await?;
    let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    tracing::info!(reply = %pong, "redis connected");
    let responses = ResponsePublisher::new(Arc::new(RedisPublisher::new(conn)));

    let chat_subscription = RedisSubscription::connect(&redis, CHAT_CHANNEL).await?;
    let file_subscription = RedisSubscription::connect(&redis, FILE_CHANNEL).await?;

    // Outbound HTTP collaborators carry their own timeouts
    let config_http = reqwest::Client::builder()
        .timeout(settings.config_timeout())
        .build()?;
    let model_http = reqwest::Client::builder()
        .timeout(settings.model_timeout())
        .build()?;

    let configs = Arc::new(HttpAgentConfigSource::new(
        config_http,
        &settings.config_api_url,
        settings.config_token(),
    ));
    let model = ModelClient::new(
        Arc::new(OpenAiCompatModel::new(
            model_http,
            &settings.model_api_url,
            &settings.model_api_key,
        )),
        settings.default_model.clone(),
    );

    let messages = Arc::new(MessagePipeline::new(
        configs,
        store.clone(),
        model,
        store.clone(),
        responses.clone(),
    ));
    let files = Arc::new(FilePipeline::new(
        Arc::new(DocumentExtractor),
        store,
        responses,
    ));

    let health = LoopHealth::default();
    let dispatcher = Dispatcher::new(
        Box::new(chat_subscription),
        messages,
        Box::new(file_subscription),
        files,
        health.clone(),
    )
    .spawn();

    // Health probe
    let app = Router::new()
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            db: pool,
            loops: health,
        });
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.health_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("health probe listening on {}", addr);
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "health server stopped");
        }
    });

    let result = dispatcher.run_until(shutdown_signal()).await;
    server.abort();
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
