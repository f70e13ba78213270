use std::sync::Arc;

use rootdata_mcp::{
    build_app,
    config::{Config, Transport},
    domain::aggregate::FanOutLimits,
    logging,
    rootdata_client::{ClientSettings, HttpRootDataClient},
    stdio, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let config = Config::from_env()?;
    let client = HttpRootDataClient::new(ClientSettings {
        api_key: config.api_key.clone(),
        base_url: config.api_base_url.clone(),
        language: config.language.clone(),
        timeout: config.request_timeout,
    })?;
    let limits = FanOutLimits {
        max_concurrency: config.max_concurrency,
        call_timeout: config.request_timeout,
    };
    let state = AppState::new(Arc::new(client), limits, config.mcp_api_token.clone());

    match config.transport {
        Transport::Stdio => {
            info!(base_url = %config.api_base_url, "server starting on stdio");
            stdio::serve_stdio(state).await?;
        }
        Transport::Sse => {
            let bind_socket = config.bind_socket()?;
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                auth = config.mcp_api_token.is_some(),
                "server starting"
            );

            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}
