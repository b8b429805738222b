use anyhow::Context;

use authsvc_api::{AppConfig, shutdown, start};
use authsvc_infra::event_bus::AmqpTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    authsvc_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "starting auth event publisher");

    let transport = AmqpTransport::new(config.publisher.broker_url.clone());
    let context = start(transport, &config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    shutdown(&context).await;
    Ok(())
}
