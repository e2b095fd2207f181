use anyhow::Result;
use provider_gateway::api::start_server;
use provider_gateway::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    start_server(config).await
}
