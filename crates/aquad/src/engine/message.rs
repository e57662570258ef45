//! Type-safe message system for aquad
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Deserialize;
use serde::Serialize;

use super::device::Device;
use super::state::ClimateState;
use super::state::HvacMode;
use super::state::IntegrationHealth;
use super::state::SensorState;
use super::state::SwitchState;
use super::state::WaterHeaterState;

/// Entity platform, the generic abstraction an entity projects onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    WaterHeater,
    Climate,
    Sensor,
    Switch,
    Button,
}

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug)]
pub enum FromIntegrationMessage {
    /// A device was discovered; its entities follow as `EntityDiscovered`
    DeviceDiscovered {
        device: Device,
        integration_name: String,
    },

    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        device_id: Option<String>,
        platform: Platform,
        integration_name: String,
    },

    WaterHeaterStateChanged {
        entity_id: String,
        state: WaterHeaterState,
    },

    ClimateStateChanged {
        entity_id: String,
        state: ClimateState,
    },

    SensorStateChanged {
        entity_id: String,
        state: SensorState,
    },

    SwitchStateChanged {
        entity_id: String,
        state: SwitchState,
    },

    /// The integration's health changed (setup finished, reauth needed, ...)
    IntegrationHealthChanged {
        integration_name: String,
        health: IntegrationHealth,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ToIntegrationMessage {
    WaterHeaterSetTemperature {
        entity_id: String,
        temperature: Option<f64>,
    },

    /// `operation_mode` is a free-form label; integrations ignore labels they
    /// don't offer.
    WaterHeaterSetOperationMode {
        entity_id: String,
        operation_mode: String,
    },

    ClimateSetTemperature {
        entity_id: String,
        temperature: Option<f64>,
    },

    ClimateSetHvacMode {
        entity_id: String,
        hvac_mode: HvacMode,
    },

    SwitchCommand { entity_id: String, on: bool },

    ButtonPress { entity_id: String },
}

impl ToIntegrationMessage {
    /// Entity the command is addressed to, used for routing
    pub fn entity_id(&self) -> &str {
        match self {
            ToIntegrationMessage::WaterHeaterSetTemperature { entity_id, .. }
            | ToIntegrationMessage::WaterHeaterSetOperationMode { entity_id, .. }
            | ToIntegrationMessage::ClimateSetTemperature { entity_id, .. }
            | ToIntegrationMessage::ClimateSetHvacMode { entity_id, .. }
            | ToIntegrationMessage::SwitchCommand { entity_id, .. }
            | ToIntegrationMessage::ButtonPress { entity_id } => entity_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deserializes_from_tagged_json() {
        let msg: ToIntegrationMessage = serde_json::from_str(
            r#"{"command": "water_heater_set_operation_mode", "entity_id": "water_heater.tank", "operation_mode": "heating"}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ToIntegrationMessage::WaterHeaterSetOperationMode {
                entity_id: "water_heater.tank".to_string(),
                operation_mode: "heating".to_string(),
            }
        );
        assert_eq!(msg.entity_id(), "water_heater.tank");
    }

    #[test]
    fn test_set_temperature_without_value() {
        let msg: ToIntegrationMessage = serde_json::from_str(
            r#"{"command": "water_heater_set_temperature", "entity_id": "water_heater.tank"}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ToIntegrationMessage::WaterHeaterSetTemperature {
                entity_id: "water_heater.tank".to_string(),
                temperature: None,
            }
        );
    }
}
