//! Device snapshot as returned by the Aquarea client.

use std::collections::BTreeMap;

use chrono::Datelike;
use chrono::NaiveDate;

use super::client::AquareaClient;
use super::client::ClientError;

pub const MANUFACTURER: &str = "Panasonic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    On,
    Off,
}

/// Mode the device reports it is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtendedOperationMode {
    Off,
    Heat,
    Cool,
    AutoHeat,
    AutoCool,
}

/// Mode that can be requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateOperationMode {
    Off,
    Heat,
    Cool,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceModeStatus {
    Normal,
    Defrost,
}

/// What the heat pump is currently feeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceDirection {
    Idle,
    Pump,
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConsumptionType {
    Heat,
    Cool,
    WaterTank,
    Total,
}

/// Identity of a device as listed by the cloud
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub long_id: String,
    pub name: String,
    pub firmware_version: String,
    pub model: String,
    pub has_tank: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub operation_status: OperationStatus,
    pub temperature: i32,
    pub target_temperature: i32,
    pub heat_min: i32,
    pub heat_max: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub zone_id: u8,
    pub name: String,
    pub operation_status: OperationStatus,
    pub temperature: Option<i32>,
    pub target_temperature: Option<i32>,
    pub heat_min: Option<i32>,
    pub heat_max: Option<i32>,
    pub cool_mode: bool,
}

/// Energy used during one day, in kWh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consumption {
    pub heat: Option<f64>,
    pub cool: Option<f64>,
    pub water_tank: Option<f64>,
    pub total: Option<f64>,
}

impl Consumption {
    pub fn get(&self, kind: ConsumptionType) -> Option<f64> {
        match kind {
            ConsumptionType::Heat => self.heat,
            ConsumptionType::Cool => self.cool,
            ConsumptionType::WaterTank => self.water_tank,
            ConsumptionType::Total => self.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub info: DeviceInfo,
    pub operation_status: OperationStatus,
    pub mode: ExtendedOperationMode,
    pub device_mode_status: DeviceModeStatus,
    pub is_on_error: bool,
    pub temperature_outdoor: Option<i32>,
    pub direction: DeviceDirection,
    pub pump_duty: u8,
    pub quiet_mode: bool,
    pub force_dhw: bool,
    pub force_heater: bool,
    pub holiday_timer: bool,
    pub zones: BTreeMap<u8, Zone>,
    pub tank: Option<Tank>,
    /// Daily consumption for the current month; missing days are not fetched yet
    pub consumption: BTreeMap<NaiveDate, Consumption>,
}

impl Device {
    pub fn device_id(&self) -> &str {
        &self.info.device_id
    }

    pub fn long_id(&self) -> &str {
        &self.info.long_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn has_tank(&self) -> bool {
        self.info.has_tank
    }

    pub fn supports_cooling(&self) -> bool {
        self.zones.values().any(|zone| zone.cool_mode)
    }

    /// Consumption of `kind` on `date`
    pub fn consumption(&self, date: NaiveDate, kind: ConsumptionType) -> Result<f64, ClientError> {
        self.consumption
            .get(&date)
            .and_then(|c| c.get(kind))
            .ok_or(ClientError::DataNotAvailable)
    }

    /// Consumption of `kind` from the first of the month up to and including `today`
    pub fn monthly_consumption(&self, today: NaiveDate, kind: ConsumptionType) -> f64 {
        self.consumption
            .iter()
            .filter(|(date, _)| {
                date.year() == today.year() && date.month() == today.month() && **date <= today
            })
            .filter_map(|(_, c)| c.get(kind))
            .sum()
    }

    /// Controls for the tank, if the device has one
    pub fn tank_control<'a, C: AquareaClient + ?Sized>(
        &'a self,
        client: &'a C,
    ) -> Option<TankControl<'a, C>> {
        self.tank.as_ref().map(|_| TankControl {
            client,
            long_id: &self.info.long_id,
        })
    }
}

/// Forwards tank commands for one device to the client
pub struct TankControl<'a, C: AquareaClient + ?Sized> {
    client: &'a C,
    long_id: &'a str,
}

impl<C: AquareaClient + ?Sized> TankControl<'_, C> {
    pub async fn set_target_temperature(&self, temperature: i32) -> Result<(), ClientError> {
        self.client
            .set_tank_target_temperature(self.long_id, temperature)
            .await
    }

    pub async fn turn_on(&self) -> Result<(), ClientError> {
        self.client
            .set_tank_operation_status(self.long_id, OperationStatus::On)
            .await
    }

    pub async fn turn_off(&self) -> Result<(), ClientError> {
        self.client
            .set_tank_operation_status(self.long_id, OperationStatus::Off)
            .await
    }
}

#[cfg(test)]
impl Device {
    /// A heat pump with a tank and one heating-only zone
    pub fn sample() -> Self {
        Self {
            info: DeviceInfo {
                device_id: "B123456789".to_string(),
                long_id: "008007B123456789001434".to_string(),
                name: "Heat Pump".to_string(),
                firmware_version: "1.2.3".to_string(),
                model: "WH-SDC0509L3E5".to_string(),
                has_tank: true,
            },
            operation_status: OperationStatus::On,
            mode: ExtendedOperationMode::Heat,
            device_mode_status: DeviceModeStatus::Normal,
            is_on_error: false,
            temperature_outdoor: Some(7),
            direction: DeviceDirection::Water,
            pump_duty: 1,
            quiet_mode: false,
            force_dhw: false,
            force_heater: false,
            holiday_timer: false,
            zones: BTreeMap::from([(
                1,
                Zone {
                    zone_id: 1,
                    name: "House".to_string(),
                    operation_status: OperationStatus::On,
                    temperature: Some(21),
                    target_temperature: Some(22),
                    heat_min: Some(10),
                    heat_max: Some(30),
                    cool_mode: false,
                },
            )]),
            tank: Some(Tank {
                operation_status: OperationStatus::On,
                temperature: 45,
                target_temperature: 50,
                heat_min: 40,
                heat_max: 65,
            }),
            consumption: BTreeMap::new(),
        }
    }
}
