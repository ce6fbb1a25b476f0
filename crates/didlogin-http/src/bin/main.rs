use didlogin_http::config::load_config;
use didlogin_http::server;
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Get config from the config file or CLI
    let config = load_config()?;
    info!("{}", config);

    server::http_server(config).await?;
    Ok(())
}
