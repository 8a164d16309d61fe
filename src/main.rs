use actix_web::{web, App, HttpServer};
use clap::Parser;

use ollama_bridge::config::BridgeConfig;
use ollama_bridge::server::{config_routes, FILTER_ENDPOINT};
use ollama_bridge::util::{cors_config_from_env, init_tracing, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = BridgeConfig::parse();

    tracing::info!("Ollama URL: {}", config.ollama_url);
    tracing::info!("Default model: {}", config.default_model);
    tracing::info!("API key: {}", config.masked_api_key());
    tracing::info!(
        "Bridge endpoint: http://localhost:{}{}",
        config.port(),
        FILTER_ENDPOINT
    );
    tracing::info!("Status UI: http://localhost:{}/status", config.port());

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState::new(config));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_config_from_env())
            .configure(config_routes)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
