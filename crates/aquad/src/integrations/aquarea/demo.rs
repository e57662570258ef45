//! In-memory heat pump used with `environment = "demo"`.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Utc;
use chrono_tz::Tz;
use tracing::debug;
use tracing::info;

use super::client::AquareaClient;
use super::client::AuthErrorCode;
use super::client::ClientError;
use super::device::Consumption;
use super::device::Device;
use super::device::DeviceDirection;
use super::device::DeviceInfo;
use super::device::DeviceModeStatus;
use super::device::ExtendedOperationMode;
use super::device::OperationStatus;
use super::device::Tank;
use super::device::UpdateOperationMode;
use super::device::Zone;

const DEMO_DEVICE_ID: &str = "D000000001";
const DEMO_LONG_ID: &str = "008007D000000001001434";

/// Simulated Aquarea cloud with a single heat pump
///
/// Commands change the simulated device; every fetch moves the tank and
/// zone temperatures one degree towards their targets.
pub struct DemoClient {
    username: String,
    password: String,
    device: Mutex<Device>,
}

impl DemoClient {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            device: Mutex::new(initial_device()),
        }
    }

    fn with_device<T>(
        &self,
        long_id: &str,
        f: impl FnOnce(&mut Device) -> T,
    ) -> Result<T, ClientError> {
        let mut device = self.device.lock().map_err(|_| ClientError::RequestFailed {
            message: "demo device state poisoned".to_string(),
        })?;
        if device.info.long_id != long_id {
            return Err(ClientError::RequestFailed {
                message: format!("unknown device '{}'", long_id),
            });
        }
        Ok(f(&mut device))
    }
}

fn initial_device() -> Device {
    Device {
        info: DeviceInfo {
            device_id: DEMO_DEVICE_ID.to_string(),
            long_id: DEMO_LONG_ID.to_string(),
            name: "Demo Heat Pump".to_string(),
            firmware_version: "0.0.1".to_string(),
            model: "WH-DEMO".to_string(),
            has_tank: true,
        },
        operation_status: OperationStatus::On,
        mode: ExtendedOperationMode::Heat,
        device_mode_status: DeviceModeStatus::Normal,
        is_on_error: false,
        temperature_outdoor: Some(8),
        direction: DeviceDirection::Pump,
        pump_duty: 1,
        quiet_mode: false,
        force_dhw: false,
        force_heater: false,
        holiday_timer: false,
        zones: BTreeMap::from([(
            1,
            Zone {
                zone_id: 1,
                name: "Living Room".to_string(),
                operation_status: OperationStatus::On,
                temperature: Some(19),
                target_temperature: Some(21),
                heat_min: Some(10),
                heat_max: Some(30),
                cool_mode: true,
            },
        )]),
        tank: Some(Tank {
            operation_status: OperationStatus::On,
            temperature: 42,
            target_temperature: 48,
            heat_min: 40,
            heat_max: 65,
        }),
        consumption: BTreeMap::new(),
    }
}

fn step_towards(current: i32, target: i32) -> i32 {
    current + (target - current).signum()
}

/// Deterministic per-day usage for the month so far
fn demo_consumption(today: NaiveDate, has_cooling: bool) -> BTreeMap<NaiveDate, Consumption> {
    (1..=today.day())
        .filter_map(|day| today.with_day(day))
        .map(|date| {
            let heat = 4.0 + f64::from(date.day() % 5) * 0.5;
            let water_tank = 1.5 + f64::from(date.day() % 3) * 0.25;
            let cool = if has_cooling {
                f64::from(date.day() % 2) * 0.75
            } else {
                0.0
            };
            (
                date,
                Consumption {
                    heat: Some(heat),
                    cool: has_cooling.then_some(cool),
                    water_tank: Some(water_tank),
                    total: Some(heat + water_tank + cool),
                },
            )
        })
        .collect()
}

#[async_trait]
impl AquareaClient for DemoClient {
    async fn login(&self) -> Result<(), ClientError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ClientError::Authentication {
                code: AuthErrorCode::InvalidUsernameOrPassword,
                message: "demo login needs a username and password".to_string(),
            });
        }
        info!("Logged into demo Aquarea cloud as {}", self.username);
        Ok(())
    }

    async fn get_devices(&self) -> Result<Vec<DeviceInfo>, ClientError> {
        let device = self.device.lock().map_err(|_| ClientError::RequestFailed {
            message: "demo device state poisoned".to_string(),
        })?;
        Ok(vec![device.info.clone()])
    }

    async fn get_device(
        &self,
        info: &DeviceInfo,
        _consumption_refresh_interval: Duration,
        timezone: Tz,
    ) -> Result<Device, ClientError> {
        let today = Utc::now().with_timezone(&timezone).date_naive();
        self.with_device(&info.long_id, |device| {
            if device.operation_status == OperationStatus::On {
                if let Some(tank) = device.tank.as_mut() {
                    if tank.operation_status == OperationStatus::On {
                        tank.temperature = step_towards(tank.temperature, tank.target_temperature);
                    }
                }
                for zone in device.zones.values_mut() {
                    if let (OperationStatus::On, Some(current), Some(target)) =
                        (zone.operation_status, zone.temperature, zone.target_temperature)
                    {
                        zone.temperature = Some(step_towards(current, target));
                    }
                }
            }
            device.device_mode_status = DeviceModeStatus::Normal;
            device.consumption = demo_consumption(today, device.supports_cooling());
            debug!("Demo device snapshot: {:?}", device);
            device.clone()
        })
    }

    async fn set_tank_target_temperature(
        &self,
        long_id: &str,
        temperature: i32,
    ) -> Result<(), ClientError> {
        self.with_device(long_id, |device| {
            if let Some(tank) = device.tank.as_mut() {
                tank.target_temperature = temperature.clamp(tank.heat_min, tank.heat_max);
            }
        })
    }

    async fn set_tank_operation_status(
        &self,
        long_id: &str,
        status: OperationStatus,
    ) -> Result<(), ClientError> {
        self.with_device(long_id, |device| {
            if let Some(tank) = device.tank.as_mut() {
                tank.operation_status = status;
            }
            if status == OperationStatus::On {
                device.operation_status = OperationStatus::On;
            }
        })
    }

    async fn set_zone_temperature(
        &self,
        long_id: &str,
        zone_id: u8,
        temperature: i32,
    ) -> Result<(), ClientError> {
        self.with_device(long_id, |device| {
            if let Some(zone) = device.zones.get_mut(&zone_id) {
                zone.target_temperature = Some(temperature);
            }
        })
    }

    async fn set_mode(
        &self,
        long_id: &str,
        mode: UpdateOperationMode,
        zone_id: Option<u8>,
    ) -> Result<(), ClientError> {
        self.with_device(long_id, |device| {
            let zone_status = if mode == UpdateOperationMode::Off {
                OperationStatus::Off
            } else {
                OperationStatus::On
            };
            for zone in device.zones.values_mut() {
                if zone_id.is_none_or(|id| id == zone.zone_id) {
                    zone.operation_status = zone_status;
                }
            }

            device.mode = match mode {
                UpdateOperationMode::Off => device.mode,
                UpdateOperationMode::Heat => ExtendedOperationMode::Heat,
                UpdateOperationMode::Cool => ExtendedOperationMode::Cool,
                UpdateOperationMode::Auto => ExtendedOperationMode::AutoHeat,
            };

            let tank_off = device
                .tank
                .as_ref()
                .is_none_or(|tank| tank.operation_status == OperationStatus::Off);
            let zones_off = device
                .zones
                .values()
                .all(|zone| zone.operation_status == OperationStatus::Off);
            device.operation_status = if mode == UpdateOperationMode::Off && tank_off && zones_off {
                OperationStatus::Off
            } else {
                OperationStatus::On
            };
        })
    }

    async fn set_quiet_mode(&self, long_id: &str, on: bool) -> Result<(), ClientError> {
        self.with_device(long_id, |device| device.quiet_mode = on)
    }

    async fn set_force_dhw(&self, long_id: &str, on: bool) -> Result<(), ClientError> {
        self.with_device(long_id, |device| {
            if device.has_tank() {
                device.force_dhw = on;
            }
        })
    }

    async fn set_force_heater(&self, long_id: &str, on: bool) -> Result<(), ClientError> {
        self.with_device(long_id, |device| device.force_heater = on)
    }

    async fn set_holiday_timer(&self, long_id: &str, on: bool) -> Result<(), ClientError> {
        self.with_device(long_id, |device| device.holiday_timer = on)
    }

    async fn request_defrost(&self, long_id: &str) -> Result<(), ClientError> {
        self.with_device(long_id, |device| {
            device.device_mode_status = DeviceModeStatus::Defrost;
        })
    }

    async fn close(&self) {
        info!("Closed demo Aquarea session");
    }
}
