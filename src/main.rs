// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::{AppConfig, StoreBackend};
use crate::services::{
    DryRunGateway, GenerationGateway, InMemoryRequestStore, RedisRequestStore, RequestStore,
    TryOnOrchestrator, VertexTryOnGateway,
};

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<TryOnOrchestrator>,
    store: Arc<dyn RequestStore>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting try-on service...");

    let config = AppConfig::from_env().context("failed to load configuration")?;

    // Initialize services
    let store: Arc<dyn RequestStore> = match &config.store {
        StoreBackend::Memory { capacity } => {
            info!(
                "Using in-memory store (capacity {}, ttl {}s)",
                capacity,
                config.store_ttl.as_secs()
            );
            Arc::new(InMemoryRequestStore::new(*capacity, config.store_ttl))
        }
        StoreBackend::Redis { url } => {
            info!("Using Redis store at {}", url);
            Arc::new(
                RedisRequestStore::new(url, config.store_ttl)
                    .await
                    .context("failed to connect to Redis")?,
            )
        }
    };

    let gateway: Arc<dyn GenerationGateway> = match (&config.access_token, &config.project_id) {
        (Some(token), Some(project_id)) => {
            let vertex = VertexTryOnGateway::new(
                project_id,
                &config.location,
                &config.vto_model,
                token.clone(),
            )
            .context("failed to build try-on HTTP client")?;
            info!("Using try-on endpoint {}", vertex.endpoint());
            Arc::new(vertex)
        }
        _ => Arc::new(DryRunGateway),
    };

    info!(
        "Project: {:?}, Location: {}, Model: {}, Gateway: {}, Max concurrent generations: {}",
        config.project_id,
        config.location,
        config.vto_model,
        gateway.name(),
        config.max_concurrent_generations
    );

    let orchestrator = Arc::new(TryOnOrchestrator::new(
        Arc::clone(&store),
        gateway,
        config.max_concurrent_generations,
    ));

    let app_state = AppState {
        orchestrator,
        store,
    };

    info!("Starting HTTP server on 0.0.0.0:{}", config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await?;

    Ok(())
}
