//! Process startup and shutdown.

use thiserror::Error;
use tracing::{error, info, warn};

use authsvc_infra::event_bus::{BrokerError, BrokerTransport};
use authsvc_infra::{BrokerPublisher, ConnectOutcome};

use crate::config::AppConfig;
use crate::context::ServiceContext;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("broker unavailable at startup: {0}")]
    BrokerUnavailable(#[source] BrokerError),
}

/// Build the publisher, attempt the first connect and assemble the context.
///
/// A failed first connect is fatal only when the config requires the broker
/// at startup. Otherwise the service starts degraded and the publisher keeps
/// retrying in the background.
pub async fn start<T: BrokerTransport>(
    transport: T,
    config: &AppConfig,
) -> Result<ServiceContext<BrokerPublisher<T>>, StartupError> {
    let publisher = BrokerPublisher::new(transport, config.publisher.settings.clone());

    match publisher.connect().await {
        ConnectOutcome::Failed(err) if config.require_broker_at_startup => {
            error!(error = %err, "broker required at startup but unreachable");
            publisher.close().await;
            return Err(StartupError::BrokerUnavailable(err));
        }
        ConnectOutcome::Failed(err) => {
            warn!(
                error = %err,
                retry_in = ?config.publisher.settings.reconnect_delay,
                "starting without broker; events will not be published until it is reachable"
            );
        }
        outcome => {
            info!(?outcome, exchange = %config.publisher.settings.exchange, "event publisher ready");
        }
    }

    Ok(ServiceContext::new(publisher, config.reset.clone()))
}

/// Close the publisher. Safe to call more than once.
pub async fn shutdown<T: BrokerTransport>(context: &ServiceContext<BrokerPublisher<T>>) {
    let publisher = context.publisher();
    publisher.close().await;
    info!(stats = ?publisher.stats(), "event publisher shut down");
}
