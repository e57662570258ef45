use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::device::Device;

/// Operation state of a water heater entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WaterHeaterOperationState {
    #[default]
    Off,
    HeatPump,
}

/// State of a water heater entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WaterHeaterState {
    pub available: bool,

    /// Entity state (`off` or `heat_pump`).
    pub state: WaterHeaterOperationState,

    /// Label of the current operation, one of `operation_list`.
    pub current_operation: String,

    pub operation_list: Vec<String>,

    pub icon: String,

    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub target_temperature_step: f64,
}

/// HVAC mode of a climate entity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    #[default]
    Off,
    Heat,
    Cool,
}

/// State of a climate entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClimateState {
    pub available: bool,
    pub hvac_mode: HvacMode,
    pub hvac_modes: Vec<HvacMode>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
}

/// Value reported by a sensor entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
}

/// State of a sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SensorState {
    pub available: bool,
    pub value: Option<SensorValue>,
    pub unit: Option<String>,
    pub icon: Option<String>,
}

/// State of a switch entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SwitchState {
    pub available: bool,
    pub on: bool,
}

/// Health of an integration as last reported to the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrationHealth {
    Ready,
    /// Credentials were rejected; polling has stopped until the user
    /// re-authenticates.
    ReauthRequired { reason: String },
    SetupFailed { reason: String },
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub devices: HashMap<String, Device>,
    pub water_heaters: HashMap<String, WaterHeaterState>,
    pub climates: HashMap<String, ClimateState>,
    pub sensors: HashMap<String, SensorState>,
    pub switches: HashMap<String, SwitchState>,
    pub integrations: HashMap<String, IntegrationHealth>,
}
