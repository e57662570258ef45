use std::error::Error;

use async_trait::async_trait;
use linkme::distributed_slice;
use tokio::sync::mpsc;

use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use crate::config::Config;

/// Error type crossing the integration boundary
pub type IntegrationError = Box<dyn Error + Send>;

/// Events flow integration -> engine over a bounded channel, so a chatty
/// poller is slowed down instead of growing memory.
pub type FromIntegrationSender = mpsc::Sender<FromIntegrationMessage>;
pub type FromIntegrationReceiver = mpsc::Receiver<FromIntegrationMessage>;

/// Commands flow engine -> integration unbounded; routing never waits.
pub type ToIntegrationSender = mpsc::UnboundedSender<ToIntegrationMessage>;

/// `Ok(None)` means the integration is not configured
pub type IntegrationFactoryResult = anyhow::Result<Option<Box<dyn Integration>>>;

/// What a factory gets to decide whether (and how) to build its integration
pub struct IntegrationContext<'a> {
    pub config: &'a Config,
}

/// Link-time list of integration factories, filled with `#[distributed_slice]`
#[distributed_slice]
pub static REGISTRY: [fn(&IntegrationContext) -> IntegrationFactoryResult];

/// A cloud or local service bridged into the engine
///
/// The engine drives each integration from its own task: `setup` once, then
/// `handle_message` for every routed command until the command channel
/// closes, then `shutdown`.
#[async_trait]
pub trait Integration: Send + Sync {
    /// Name used for routing and health reporting
    fn name(&self) -> &str;

    /// Log in, discover devices and start polling
    ///
    /// Devices, entities and their first state are reported through `tx`.
    /// An error here marks the integration as failed to set up.
    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), IntegrationError>;

    /// Execute a command addressed to one of this integration's entities
    async fn handle_message(&mut self, msg: ToIntegrationMessage) -> Result<(), IntegrationError>;

    /// Stop background work and release remote sessions
    async fn shutdown(&mut self) -> Result<(), IntegrationError> {
        Ok(())
    }
}
