use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::button::DefrostButton;
use super::climate::Climate;
use super::client::AquareaClient;
use super::coordinator::device_coordinator;
use super::coordinator::translate;
use super::coordinator::AquareaCoordinator;
use super::device::Device;
use super::entity::device_entry;
use super::entity::EntityInfo;
use super::entity::INTEGRATION_NAME;
use super::sensor::Sensor;
use super::switch::Switch;
use super::water_heater::WaterHeater;
use super::AquareaConfig;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::IntegrationError;
use crate::engine::IntegrationHealth;
use crate::engine::Platform;
use crate::engine::Snapshot;
use crate::engine::ToIntegrationMessage;
use crate::engine::UpdateError;

/// Any entity the integration exposes
#[derive(Debug, Clone)]
enum AquareaEntity {
    WaterHeater(WaterHeater),
    Climate(Climate),
    Sensor(Sensor),
    Switch(Switch),
    Button(DefrostButton),
}

impl AquareaEntity {
    fn info(&self) -> &EntityInfo {
        match self {
            AquareaEntity::WaterHeater(e) => &e.info,
            AquareaEntity::Climate(e) => &e.info,
            AquareaEntity::Sensor(e) => &e.info,
            AquareaEntity::Switch(e) => &e.info,
            AquareaEntity::Button(e) => &e.info,
        }
    }

    fn platform(&self) -> Platform {
        match self {
            AquareaEntity::WaterHeater(_) => Platform::WaterHeater,
            AquareaEntity::Climate(_) => Platform::Climate,
            AquareaEntity::Sensor(_) => Platform::Sensor,
            AquareaEntity::Switch(_) => Platform::Switch,
            AquareaEntity::Button(_) => Platform::Button,
        }
    }

    /// Recompute from the latest snapshot; buttons have no state to report
    fn update(
        &mut self,
        device: &Device,
        last_update_success: bool,
        today: NaiveDate,
    ) -> Option<FromIntegrationMessage> {
        let entity_id = self.info().entity_id.clone();
        match self {
            AquareaEntity::WaterHeater(e) => Some(FromIntegrationMessage::WaterHeaterStateChanged {
                entity_id,
                state: e.handle_coordinator_update(device).clone(),
            }),
            AquareaEntity::Climate(e) => Some(FromIntegrationMessage::ClimateStateChanged {
                entity_id,
                state: e.handle_coordinator_update(device, last_update_success).clone(),
            }),
            AquareaEntity::Sensor(e) => Some(FromIntegrationMessage::SensorStateChanged {
                entity_id,
                state: e
                    .handle_coordinator_update(device, last_update_success, today)
                    .clone(),
            }),
            AquareaEntity::Switch(e) => Some(FromIntegrationMessage::SwitchStateChanged {
                entity_id,
                state: e.handle_coordinator_update(device, last_update_success).clone(),
            }),
            AquareaEntity::Button(_) => None,
        }
    }
}

/// Every entity that applies to `device`
fn entities_for(device: &Device) -> Vec<AquareaEntity> {
    let mut entities = Vec::new();
    if device.has_tank() {
        entities.push(AquareaEntity::WaterHeater(WaterHeater::new(device)));
    }
    entities.extend(
        device
            .zones
            .values()
            .map(|zone| AquareaEntity::Climate(Climate::new(device, zone))),
    );
    entities.extend(Sensor::all_for(device).into_iter().map(AquareaEntity::Sensor));
    entities.extend(Switch::all_for(device).into_iter().map(AquareaEntity::Switch));
    entities.push(AquareaEntity::Button(DefrostButton::new(device)));
    entities
}

fn today(timezone: Tz) -> NaiveDate {
    Utc::now().with_timezone(&timezone).date_naive()
}

/// Type alias for the shared entity map, keyed by entity id
type EntityMap = Arc<Mutex<HashMap<String, AquareaEntity>>>;

/// Aquarea Smart Cloud integration
///
/// One coordinator per heat pump polls the cloud; an observer task per
/// device reprojects its entities whenever the coordinator publishes.
pub struct AquareaIntegration<C: AquareaClient> {
    client: Arc<C>,
    config: AquareaConfig,
    coordinators: HashMap<String, Arc<AquareaCoordinator<C>>>,
    entities: EntityMap,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: AquareaClient> AquareaIntegration<C> {
    pub fn new(client: C, config: &AquareaConfig) -> Self {
        Self {
            client: Arc::new(client),
            config: config.clone(),
            coordinators: HashMap::new(),
            entities: Arc::new(Mutex::new(HashMap::new())),
            tasks: Vec::new(),
        }
    }

    async fn send(tx: &FromIntegrationSender, msg: FromIntegrationMessage) {
        if let Err(e) = tx.send(msg).await {
            warn!("Failed to send message to engine: {}", e);
        }
    }

    async fn report_health(tx: &FromIntegrationSender, health: IntegrationHealth) {
        Self::send(
            tx,
            FromIntegrationMessage::IntegrationHealthChanged {
                integration_name: INTEGRATION_NAME.to_string(),
                health,
            },
        )
        .await;
    }

    /// Report a failed setup step; credential problems ask for reauthentication
    async fn setup_failed(tx: &FromIntegrationSender, err: UpdateError) -> IntegrationError {
        if let UpdateError::AuthFailed(reason) = &err {
            Self::report_health(
                tx,
                IntegrationHealth::ReauthRequired {
                    reason: reason.clone(),
                },
            )
            .await;
        }
        Box::new(err)
    }

    /// Recompute the entities of `device_id` and publish their state
    async fn publish(
        entities: &EntityMap,
        device_id: &str,
        snapshot: &Snapshot<Device>,
        timezone: Tz,
        tx: &FromIntegrationSender,
    ) {
        let Some(device) = snapshot.data.as_deref() else {
            return;
        };
        let today = today(timezone);

        let messages: Vec<FromIntegrationMessage> = {
            let mut entities_guard = entities.lock().await;
            entities_guard
                .values_mut()
                .filter(|e| e.info().device_id == device_id)
                .filter_map(|e| e.update(device, snapshot.last_update_success, today))
                .collect()
        };

        for msg in messages {
            Self::send(tx, msg).await;
        }
    }

    /// Register the device and its entities with the engine
    async fn register_device(&self, device: &Device, tx: &FromIntegrationSender) {
        info!(
            "Discovered Aquarea device {} ({})",
            device.name(),
            device.device_id()
        );
        Self::send(
            tx,
            FromIntegrationMessage::DeviceDiscovered {
                device: device_entry(device),
                integration_name: INTEGRATION_NAME.to_string(),
            },
        )
        .await;

        let entities = entities_for(device);
        for entity in &entities {
            Self::send(
                tx,
                FromIntegrationMessage::EntityDiscovered {
                    entity_id: entity.info().entity_id.clone(),
                    device_id: Some(device.device_id().to_string()),
                    platform: entity.platform(),
                    integration_name: INTEGRATION_NAME.to_string(),
                },
            )
            .await;
        }

        let mut entities_guard = self.entities.lock().await;
        for entity in entities {
            entities_guard.insert(entity.info().entity_id.clone(), entity);
        }
    }

    /// Spawn the polling and observer tasks for one device
    fn spawn_device_tasks(
        &mut self,
        coordinator: Arc<AquareaCoordinator<C>>,
        tx: FromIntegrationSender,
    ) {
        let poller = coordinator.clone();
        let poller_tx = tx.clone();
        self.tasks.push(tokio::spawn(async move {
            let err = poller.run().await;
            Self::report_health(
                &poller_tx,
                IntegrationHealth::ReauthRequired {
                    reason: err.to_string(),
                },
            )
            .await;
        }));

        let mut rx = coordinator.subscribe();
        let device_id = match coordinator.data() {
            Some(device) => device.device_id().to_string(),
            None => return,
        };
        let entities = self.entities.clone();
        let timezone = self.config.timezone;
        self.tasks.push(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                debug!(
                    "Coordinator update for {} (success: {})",
                    device_id, snapshot.last_update_success
                );
                Self::publish(&entities, &device_id, &snapshot, timezone, &tx).await;
            }
        }));
    }

    /// Log in and bring up every device; tasks spawned so far stay in
    /// `self.tasks` when a later device fails
    async fn start(&mut self, tx: &FromIntegrationSender) -> Result<(), IntegrationError> {
        info!(
            "Logging into Aquarea Smart Cloud as {} ({})",
            self.config.username, self.config.environment
        );
        if let Err(e) = self.client.login().await {
            return Err(Self::setup_failed(tx, translate(e)).await);
        }

        let devices = match self.client.get_devices().await {
            Ok(devices) => devices,
            Err(e) => return Err(Self::setup_failed(tx, translate(e)).await),
        };
        info!("Found {} Aquarea device(s)", devices.len());

        for device_info in devices {
            let coordinator = Arc::new(device_coordinator(
                self.client.clone(),
                &self.config.username,
                device_info,
                self.config.scan_interval,
                self.config.consumption_refresh_interval,
                self.config.timezone,
            ));

            // The first refresh must succeed before any entity is registered
            if let Err(e) = coordinator.refresh().await {
                return Err(Self::setup_failed(tx, e).await);
            }
            let snapshot = coordinator.snapshot();
            let Some(device) = snapshot.data.as_deref() else {
                continue;
            };

            self.register_device(device, tx).await;
            Self::publish(
                &self.entities,
                device.device_id(),
                &snapshot,
                self.config.timezone,
                tx,
            )
            .await;

            self.coordinators
                .insert(device.device_id().to_string(), coordinator.clone());
            self.spawn_device_tasks(coordinator, tx.clone());
        }

        Ok(())
    }

    /// Abort device tasks and end the cloud session
    async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.client.close().await;
    }
}

#[async_trait]
impl<C: AquareaClient> Integration for AquareaIntegration<C> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), IntegrationError> {
        if let Err(e) = self.start(&tx).await {
            warn!(
                "Aquarea setup failed, stopping {} device task(s)",
                self.tasks.len()
            );
            self.stop().await;
            return Err(e);
        }

        Self::report_health(&tx, IntegrationHealth::Ready).await;
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), IntegrationError> {
        let entity = {
            let entities_guard = self.entities.lock().await;
            entities_guard.get(msg.entity_id()).cloned()
        }
        .ok_or_else(|| -> IntegrationError {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Entity not found: {}", msg.entity_id()),
            ))
        })?;

        let device = self
            .coordinators
            .get(&entity.info().device_id)
            .and_then(|c| c.data())
            .ok_or_else(|| -> IntegrationError {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("No data for device: {}", entity.info().device_id),
                ))
            })?;

        info!("Handling {:?}", msg);
        let client = self.client.as_ref();
        let result = match (&entity, msg) {
            (
                AquareaEntity::WaterHeater(water_heater),
                ToIntegrationMessage::WaterHeaterSetTemperature { temperature, .. },
            ) => water_heater.set_temperature(&device, client, temperature).await,
            (
                AquareaEntity::WaterHeater(water_heater),
                ToIntegrationMessage::WaterHeaterSetOperationMode { operation_mode, .. },
            ) => {
                water_heater
                    .set_operation_mode(&device, client, &operation_mode)
                    .await
            }
            (
                AquareaEntity::Climate(climate),
                ToIntegrationMessage::ClimateSetTemperature { temperature, .. },
            ) => climate.set_temperature(&device, client, temperature).await,
            (
                AquareaEntity::Climate(climate),
                ToIntegrationMessage::ClimateSetHvacMode { hvac_mode, .. },
            ) => climate.set_hvac_mode(&device, client, hvac_mode).await,
            (AquareaEntity::Switch(switch), ToIntegrationMessage::SwitchCommand { on, .. }) => {
                switch.turn(&device, client, on).await
            }
            (AquareaEntity::Button(button), ToIntegrationMessage::ButtonPress { .. }) => {
                button.press(&device, client).await
            }
            (entity, msg) => {
                warn!(
                    "Ignoring {:?}: not supported by {}",
                    msg,
                    entity.info().entity_id
                );
                Ok(())
            }
        };

        result.map_err(|e| Box::new(e) as IntegrationError)
    }

    async fn shutdown(&mut self) -> Result<(), IntegrationError> {
        info!("Aquarea integration shutting down");
        self.stop().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::WaterHeaterOperationState;
    use crate::integrations::aquarea::client::AuthErrorCode;
    use crate::integrations::aquarea::client::Call;
    use crate::integrations::aquarea::client::ClientError;
    use crate::integrations::aquarea::client::MockAquareaClient;
    use crate::integrations::aquarea::device::OperationStatus;
    use crate::integrations::aquarea::Environment;

    fn config(scan_interval: Duration) -> AquareaConfig {
        AquareaConfig {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
            environment: Environment::Demo,
            scan_interval,
            consumption_refresh_interval: Duration::from_secs(300),
            timezone: Tz::UTC,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<FromIntegrationMessage>) -> Vec<FromIntegrationMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn test_setup_registers_device_and_entities() {
        let client = MockAquareaClient::with_device(Device::sample());
        let mut integration = AquareaIntegration::new(client, &config(Duration::from_secs(3600)));
        let (tx, mut rx) = mpsc::channel(1024);

        integration.setup(tx).await.unwrap();
        let messages = drain(&mut rx);

        assert!(matches!(
            messages.first(),
            Some(FromIntegrationMessage::DeviceDiscovered { device, .. }) if device.id == "B123456789"
        ));
        assert!(messages.iter().any(|m| matches!(
            m,
            FromIntegrationMessage::EntityDiscovered { entity_id, platform: Platform::WaterHeater, .. }
                if entity_id == "water_heater.heat_pump_tank"
        )));
        assert!(messages.iter().any(|m| matches!(
            m,
            FromIntegrationMessage::WaterHeaterStateChanged { state, .. }
                if state.available && state.state == WaterHeaterOperationState::HeatPump
        )));
        assert!(matches!(
            messages.last(),
            Some(FromIntegrationMessage::IntegrationHealthChanged {
                health: IntegrationHealth::Ready,
                ..
            })
        ));

        integration.shutdown().await.unwrap();
        assert_eq!(integration.client.calls(), vec![Call::Close]);
    }

    #[tokio::test]
    async fn test_commands_reach_the_tank() {
        let client = MockAquareaClient::with_device(Device::sample());
        let mut integration = AquareaIntegration::new(client, &config(Duration::from_secs(3600)));
        let (tx, _rx) = mpsc::channel(1024);
        integration.setup(tx).await.unwrap();

        integration
            .handle_message(ToIntegrationMessage::WaterHeaterSetOperationMode {
                entity_id: "water_heater.heat_pump_tank".to_string(),
                operation_mode: "off".to_string(),
            })
            .await
            .unwrap();
        integration
            .handle_message(ToIntegrationMessage::WaterHeaterSetTemperature {
                entity_id: "water_heater.heat_pump_tank".to_string(),
                temperature: Some(52.7),
            })
            .await
            .unwrap();
        // Commands addressed to the wrong kind of entity are ignored
        integration
            .handle_message(ToIntegrationMessage::ButtonPress {
                entity_id: "water_heater.heat_pump_tank".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            integration.client.calls(),
            vec![
                Call::SetTankOperationStatus(OperationStatus::Off),
                Call::SetTankTargetTemperature(52),
            ]
        );

        let err = integration
            .handle_message(ToIntegrationMessage::ButtonPress {
                entity_id: "button.nope".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("button.nope"));

        integration.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_first_refresh_auth_failure_requests_reauth() {
        let client = MockAquareaClient {
            devices: vec![Device::sample().info],
            ..MockAquareaClient::default()
        };
        client.push_snapshot(Err(ClientError::Authentication {
            code: AuthErrorCode::InvalidCredentials,
            message: "bad password".to_string(),
        }));
        let mut integration = AquareaIntegration::new(client, &config(Duration::from_secs(3600)));
        let (tx, mut rx) = mpsc::channel(1024);

        assert!(integration.setup(tx).await.is_err());

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            FromIntegrationMessage::IntegrationHealthChanged {
                health: IntegrationHealth::ReauthRequired { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_setup_stops_earlier_device_tasks() {
        let first = Device::sample();
        let mut second_info = first.info.clone();
        second_info.device_id = "B987654321".to_string();
        second_info.long_id = "long-B987654321".to_string();

        let client = MockAquareaClient {
            devices: vec![first.info.clone(), second_info],
            ..MockAquareaClient::default()
        };
        client.push_snapshot(Ok(first));
        client.push_snapshot(Err(ClientError::RequestFailed {
            message: "gateway timeout".to_string(),
        }));
        let mut integration = AquareaIntegration::new(client, &config(Duration::from_millis(10)));
        let (tx, _rx) = mpsc::channel(1024);

        assert!(integration.setup(tx).await.is_err());

        let fetches = integration.client.fetches.load(Ordering::SeqCst);
        assert_eq!(fetches, 2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(integration.client.fetches.load(Ordering::SeqCst), fetches);
        assert_eq!(integration.client.calls(), vec![Call::Close]);
    }

    #[tokio::test]
    async fn test_polling_publishes_new_snapshots() {
        let mut tank_off = Device::sample();
        if let Some(tank) = tank_off.tank.as_mut() {
            tank.operation_status = OperationStatus::Off;
        }
        let client = MockAquareaClient::with_device(Device::sample());
        client.push_snapshot(Ok(tank_off));
        let mut integration = AquareaIntegration::new(client, &config(Duration::from_millis(10)));
        let (tx, mut rx) = mpsc::channel(1024);
        integration.setup(tx).await.unwrap();

        let state = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(FromIntegrationMessage::WaterHeaterStateChanged { state, .. })
                        if state.state == WaterHeaterOperationState::Off =>
                    {
                        return state;
                    }
                    Some(_) => continue,
                    None => panic!("integration channel closed"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(state.current_operation, "off");
        assert_eq!(state.icon, "mdi:water-boiler-off");

        integration.shutdown().await.unwrap();
    }
}
