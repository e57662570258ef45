use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::IntegrationHealth;
use super::state::State;
use crate::engine::IntegrationContext;

/// Errors returned when routing a command to an integration
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("no integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("integration channel not found: {0}")]
    IntegrationUnavailable(String),
}

/// aquad engine
///
/// This structure handles the flow of events, sending commands to the
/// correct integration, and maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every registered factory against the config and registers the
    /// integrations that are configured.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.insert(name.clone(), to_integration_tx);
        }

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx.clone()).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                let msg = FromIntegrationMessage::IntegrationHealthChanged {
                    integration_name: name.clone(),
                    health: IntegrationHealth::SetupFailed {
                        reason: e.to_string(),
                    },
                };
                if let Err(e) = from_integration_tx.send(msg).await {
                    warn!("Failed to report setup failure of '{}': {}", name, e);
                }
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    /// Send a command to an integration
    ///
    /// Routes the command to the appropriate integration based on entity_id.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), CommandError> {
        let entity_id = msg.entity_id().to_string();

        // Route to the integration that owns this entity
        let integration_name = self
            .entity_integration_map
            .lock()
            .ok()
            .and_then(|map| map.get(&entity_id).cloned())
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.clone()))?;

        let channels = self
            .integration_channels
            .lock()
            .map_err(|_| CommandError::IntegrationUnavailable(integration_name.clone()))?;

        let tx = channels
            .get(&integration_name)
            .ok_or_else(|| CommandError::IntegrationUnavailable(integration_name.clone()))?;

        tx.send(msg)
            .map_err(|_| CommandError::IntegrationUnavailable(integration_name.clone()))?;

        debug!("Routed command for {} to {}", entity_id, integration_name);
        Ok(())
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        // Main event loop - only receives FromIntegration messages
        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Stop all integrations and wait for them to finish
    ///
    /// Dropping the command channels ends each integration's command loop,
    /// which then runs the integration's shutdown.
    pub async fn shutdown(&self) {
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles: Vec<JoinHandle<()>> = match self.integration_handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(_) => Vec::new(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Sender onto the engine's event channel, for tests that play an integration
    #[cfg(test)]
    pub(crate) fn event_sender(&self) -> FromIntegrationSender {
        self.message_tx.clone()
    }

    /// Copy the current state, apply `f`, and publish the result
    fn update_state(&self, f: impl FnOnce(&mut State)) {
        let mut state = State::clone(&self.state.load());
        f(&mut state);
        self.state.store(Arc::new(state));
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::DeviceDiscovered {
                device,
                integration_name,
            } => {
                info!(
                    "Device discovered: {} ({}) from {}",
                    device.name, device.id, integration_name
                );
                self.update_state(|state| {
                    // Keep entity ids reported before a re-discovery
                    let entity_ids = state
                        .devices
                        .get(&device.id)
                        .map(|d| d.entity_ids.clone())
                        .unwrap_or_default();
                    let mut device = device;
                    for entity_id in entity_ids {
                        device.add_entity(entity_id);
                    }
                    state.devices.insert(device.id.clone(), device);
                });
            }
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                device_id,
                platform,
                integration_name,
            } => {
                info!(
                    "Entity discovered: {} ({}) from {}",
                    entity_id, platform, integration_name
                );

                // State is not populated until the first state-change message arrives.
                if let Some(device_id) = device_id {
                    self.update_state(|state| {
                        if let Some(device) = state.devices.get_mut(&device_id) {
                            device.add_entity(entity_id.clone());
                        }
                    });
                }

                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id, integration_name);
                }
            }
            FromIntegrationMessage::WaterHeaterStateChanged { entity_id, state } => {
                debug!("Water heater state changed: {} -> {:?}", entity_id, state);
                self.update_state(|s| {
                    s.water_heaters.insert(entity_id, state);
                });
            }
            FromIntegrationMessage::ClimateStateChanged { entity_id, state } => {
                debug!("Climate state changed: {} -> {:?}", entity_id, state);
                self.update_state(|s| {
                    s.climates.insert(entity_id, state);
                });
            }
            FromIntegrationMessage::SensorStateChanged { entity_id, state } => {
                debug!("Sensor state changed: {} -> {:?}", entity_id, state);
                self.update_state(|s| {
                    s.sensors.insert(entity_id, state);
                });
            }
            FromIntegrationMessage::SwitchStateChanged { entity_id, state } => {
                debug!("Switch state changed: {} -> {:?}", entity_id, state);
                self.update_state(|s| {
                    s.switches.insert(entity_id, state);
                });
            }
            FromIntegrationMessage::IntegrationHealthChanged {
                integration_name,
                health,
            } => {
                match &health {
                    IntegrationHealth::Ready => info!("Integration '{}' is ready", integration_name),
                    IntegrationHealth::ReauthRequired { reason } => error!(
                        "Integration '{}' needs re-authentication: {}",
                        integration_name, reason
                    ),
                    IntegrationHealth::SetupFailed { reason } => {
                        error!("Integration '{}' setup failed: {}", integration_name, reason)
                    }
                }
                self.update_state(|s| {
                    // A setup failure caused by bad credentials is still a reauth problem
                    let keep_reauth = matches!(health, IntegrationHealth::SetupFailed { .. })
                        && matches!(
                            s.integrations.get(&integration_name),
                            Some(IntegrationHealth::ReauthRequired { .. })
                        );
                    if !keep_reauth {
                        s.integrations.insert(integration_name, health);
                    }
                });
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
