//! Water heater entity for the domestic hot water tank.
//!
//! Every attribute is projected from the coordinator's cached snapshot; the
//! entity never fetches on its own. Commands go straight to the tank controls.

use std::str::FromStr;

use tracing::debug;
use tracing::warn;

use super::client::AquareaClient;
use super::client::ClientError;
use super::device::Device;
use super::device::OperationStatus;
use super::entity::EntityInfo;
use crate::engine::Platform;
use crate::engine::WaterHeaterOperationState;
use crate::engine::WaterHeaterState;

const ICON_ON: &str = "mdi:water-boiler";
const ICON_OFF: &str = "mdi:water-boiler-off";
const ICON_ALERT: &str = "mdi:water-boiler-alert";

/// Operation labels offered by the tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TankOperation {
    Heating,
    Off,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterHeater {
    pub info: EntityInfo,
    pub state: WaterHeaterState,
}

impl WaterHeater {
    pub fn new(device: &Device) -> Self {
        let mut water_heater = Self {
            info: EntityInfo::new(Platform::WaterHeater, device, "tank", "Tank"),
            state: WaterHeaterState {
                operation_list: vec![
                    TankOperation::Heating.to_string(),
                    TankOperation::Off.to_string(),
                ],
                target_temperature_step: 1.0,
                ..WaterHeaterState::default()
            },
        };
        water_heater.handle_coordinator_update(device);
        water_heater
    }

    /// Recompute availability, operation state and temperatures from `device`
    pub fn handle_coordinator_update(&mut self, device: &Device) -> &WaterHeaterState {
        self.state.available = device.tank.is_some();
        self.update_temperature(device);
        self.update_operation_state(device);
        &self.state
    }

    fn update_operation_state(&mut self, device: &Device) {
        let (state, operation, icon) = match &device.tank {
            None => (WaterHeaterOperationState::Off, TankOperation::Off, ICON_OFF),
            Some(tank) if tank.operation_status == OperationStatus::Off => {
                let icon = if device.is_on_error { ICON_ALERT } else { ICON_OFF };
                (WaterHeaterOperationState::Off, TankOperation::Off, icon)
            }
            // Idle and actively heating look the same here
            Some(_) => (
                WaterHeaterOperationState::HeatPump,
                TankOperation::Heating,
                ICON_ON,
            ),
        };

        self.state.state = state;
        self.state.current_operation = operation.to_string();
        self.state.icon = icon.to_string();
    }

    fn update_temperature(&mut self, device: &Device) {
        let tank = device.tank.as_ref();
        self.state.current_temperature = tank.map(|t| f64::from(t.temperature));
        self.state.target_temperature = tank.map(|t| f64::from(t.target_temperature));
        self.state.min_temp = tank.map(|t| f64::from(t.heat_min));
        self.state.max_temp = tank.map(|t| f64::from(t.heat_max));
    }

    /// Forward a new target temperature, truncated to whole degrees
    pub async fn set_temperature<C: AquareaClient + ?Sized>(
        &self,
        device: &Device,
        client: &C,
        temperature: Option<f64>,
    ) -> Result<(), ClientError> {
        let Some(temperature) = temperature else {
            return Ok(());
        };

        let Some(tank) = device.tank_control(client) else {
            warn!(
                "Cannot set water tank temperature of {}: device has no tank",
                device.name()
            );
            return Ok(());
        };

        debug!(
            "Setting {} water tank temperature to {}",
            device.name(),
            temperature
        );
        tank.set_target_temperature(temperature as i32).await
    }

    /// `heating` turns the tank on, `off` turns it off; anything else is ignored
    pub async fn set_operation_mode<C: AquareaClient + ?Sized>(
        &self,
        device: &Device,
        client: &C,
        operation_mode: &str,
    ) -> Result<(), ClientError> {
        debug!(
            "Received request to set water tank operation mode for {} to {}",
            device.name(),
            operation_mode
        );

        let Some(tank) = device.tank_control(client) else {
            warn!(
                "Attempted to set operation mode on a water heater with no tank. Operation mode: {}",
                operation_mode
            );
            return Ok(());
        };

        match TankOperation::from_str(operation_mode) {
            Ok(TankOperation::Heating) => tank.turn_on().await,
            Ok(TankOperation::Off) => tank.turn_off().await,
            Err(_) => {
                warn!(
                    "Unsupported water tank operation mode for {}: {}",
                    device.name(),
                    operation_mode
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::aquarea::client::Call;
    use crate::integrations::aquarea::client::MockAquareaClient;

    fn tank_status(status: OperationStatus, is_on_error: bool) -> Device {
        let mut device = Device::sample();
        device.is_on_error = is_on_error;
        if let Some(tank) = device.tank.as_mut() {
            tank.operation_status = status;
        }
        device
    }

    fn without_tank(mut device: Device) -> Device {
        device.tank = None;
        device
    }

    #[test]
    fn test_static_attributes() {
        let water_heater = WaterHeater::new(&Device::sample());
        assert_eq!(water_heater.info.name, "Tank");
        assert_eq!(water_heater.info.unique_id, "B123456789_tank");
        assert_eq!(water_heater.state.operation_list, vec!["heating", "off"]);
        assert_eq!(water_heater.state.target_temperature_step, 1.0);
    }

    #[test]
    fn test_no_tank_is_unavailable_without_temperatures() {
        let variants = [
            tank_status(OperationStatus::On, false),
            tank_status(OperationStatus::On, true),
            tank_status(OperationStatus::Off, false),
            tank_status(OperationStatus::Off, true),
        ];

        for device in variants.into_iter().map(without_tank) {
            let mut water_heater = WaterHeater::new(&Device::sample());
            let state = water_heater.handle_coordinator_update(&device);

            assert!(!state.available);
            assert_eq!(state.current_temperature, None);
            assert_eq!(state.target_temperature, None);
            assert_eq!(state.min_temp, None);
            assert_eq!(state.max_temp, None);
            assert_eq!(state.state, WaterHeaterOperationState::Off);
            assert_eq!(state.current_operation, "off");
            assert_eq!(state.icon, ICON_OFF);
        }
    }

    #[test]
    fn test_tank_off_icon_follows_error_flag() {
        let on_error = WaterHeater::new(&tank_status(OperationStatus::Off, true));
        assert_eq!(on_error.state.icon, ICON_ALERT);
        assert_eq!(on_error.state.state, WaterHeaterOperationState::Off);

        let healthy = WaterHeater::new(&tank_status(OperationStatus::Off, false));
        assert_eq!(healthy.state.icon, ICON_OFF);
        assert_eq!(healthy.state.current_operation, "off");
    }

    #[test]
    fn test_tank_on_is_always_heat_pump() {
        for is_on_error in [false, true] {
            let water_heater = WaterHeater::new(&tank_status(OperationStatus::On, is_on_error));
            assert_eq!(water_heater.state.state, WaterHeaterOperationState::HeatPump);
            assert_eq!(water_heater.state.current_operation, "heating");
            assert_eq!(water_heater.state.icon, ICON_ON);
        }
    }

    #[test]
    fn test_temperatures_mirror_tank() {
        let state = WaterHeater::new(&Device::sample()).state;
        assert!(state.available);
        assert_eq!(state.current_temperature, Some(45.0));
        assert_eq!(state.target_temperature, Some(50.0));
        assert_eq!(state.min_temp, Some(40.0));
        assert_eq!(state.max_temp, Some(65.0));
    }

    #[test]
    fn test_update_replaces_previous_projection() {
        let mut water_heater = WaterHeater::new(&tank_status(OperationStatus::Off, true));
        let state = water_heater.handle_coordinator_update(&Device::sample());
        assert_eq!(state.state, WaterHeaterOperationState::HeatPump);
        assert_eq!(state.icon, ICON_ON);
    }

    #[tokio::test]
    async fn test_set_operation_mode_off_turns_tank_off_once() {
        let device = Device::sample();
        let client = MockAquareaClient::new();
        let water_heater = WaterHeater::new(&device);

        water_heater
            .set_operation_mode(&device, &client, "off")
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![Call::SetTankOperationStatus(OperationStatus::Off)]
        );
    }

    #[tokio::test]
    async fn test_set_operation_mode_heating_turns_tank_on_once() {
        let device = tank_status(OperationStatus::Off, false);
        let client = MockAquareaClient::new();
        let water_heater = WaterHeater::new(&device);

        water_heater
            .set_operation_mode(&device, &client, "heating")
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![Call::SetTankOperationStatus(OperationStatus::On)]
        );
    }

    #[tokio::test]
    async fn test_set_operation_mode_ignores_other_modes_and_missing_tank() {
        let device = Device::sample();
        let client = MockAquareaClient::new();
        let water_heater = WaterHeater::new(&device);

        for mode in ["eco", "heat_pump", "HEATING", ""] {
            water_heater
                .set_operation_mode(&device, &client, mode)
                .await
                .unwrap();
        }
        water_heater
            .set_operation_mode(&without_tank(device), &client, "heating")
            .await
            .unwrap();

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_temperature_truncates() {
        let device = Device::sample();
        let client = MockAquareaClient::new();
        let water_heater = WaterHeater::new(&device);

        water_heater
            .set_temperature(&device, &client, Some(21.6))
            .await
            .unwrap();
        // Toward zero, not floor
        water_heater
            .set_temperature(&device, &client, Some(-0.7))
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![
                Call::SetTankTargetTemperature(21),
                Call::SetTankTargetTemperature(0)
            ]
        );
    }

    #[tokio::test]
    async fn test_set_temperature_without_value_is_noop() {
        let device = Device::sample();
        let client = MockAquareaClient::new();
        let water_heater = WaterHeater::new(&device);

        water_heater
            .set_temperature(&device, &client, None)
            .await
            .unwrap();
        water_heater
            .set_temperature(&without_tank(device), &client, Some(48.0))
            .await
            .unwrap();

        assert!(client.calls().is_empty());
    }
}
