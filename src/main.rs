use tallybook::config::AppConfig;
use tallybook::routes;
use tallybook::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");
    tracing::info!(?config, "configuration loaded");

    let state = AppState::from_config(&config).expect("failed to build application state");
    let app = routes::app(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, api = %config.api_base_url, "tallybook gateway listening");
    axum::serve(listener, app).await.expect("server failed");
}
