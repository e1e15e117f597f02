use tracing_subscriber::EnvFilter;

use bistro_lib::config::AppConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::new()
        .expect("Failed to load service configuration. Please check your 'config' folder");

    bistro_lib::start_server(config).await;
}
