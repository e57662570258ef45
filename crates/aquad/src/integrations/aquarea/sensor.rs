use chrono::NaiveDate;
use tracing::debug;

use super::client::ClientError;
use super::device::ConsumptionType;
use super::device::Device;
use super::entity::EntityInfo;
use crate::engine::Platform;
use crate::engine::SensorState;
use crate::engine::SensorValue;

const CELSIUS: &str = "°C";
const KILO_WATT_HOUR: &str = "kWh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    OutdoorTemperature,
    Direction,
    PumpStatus,
    /// Today's consumption
    Consumption(ConsumptionType),
    /// Consumption accumulated over the current month
    MonthlyConsumption(ConsumptionType),
}

impl SensorKind {
    fn key(&self) -> String {
        match self {
            SensorKind::OutdoorTemperature => "outdoor_temperature".to_string(),
            SensorKind::Direction => "direction".to_string(),
            SensorKind::PumpStatus => "pump_status".to_string(),
            SensorKind::Consumption(kind) => match consumption_prefix(*kind) {
                Some(prefix) => format!("{}_energy_consumption", prefix),
                None => "energy_consumption".to_string(),
            },
            SensorKind::MonthlyConsumption(kind) => match consumption_prefix(*kind) {
                Some(prefix) => format!("{}_accumulated_energy_consumption", prefix),
                None => "accumulated_energy_consumption".to_string(),
            },
        }
    }

    fn name(&self) -> String {
        match self {
            SensorKind::OutdoorTemperature => "Outdoor Temperature".to_string(),
            SensorKind::Direction => "Direction".to_string(),
            SensorKind::PumpStatus => "Pump Status".to_string(),
            SensorKind::Consumption(kind) => match consumption_label(*kind) {
                Some(label) => format!("{} Today's Consumption", label),
                None => "Today's Consumption".to_string(),
            },
            SensorKind::MonthlyConsumption(kind) => match consumption_label(*kind) {
                Some(label) => format!("{} Monthly Accumulated Consumption", label),
                None => "Monthly Accumulated Consumption".to_string(),
            },
        }
    }

    fn unit(&self) -> Option<&'static str> {
        match self {
            SensorKind::OutdoorTemperature => Some(CELSIUS),
            SensorKind::Consumption(_) | SensorKind::MonthlyConsumption(_) => Some(KILO_WATT_HOUR),
            SensorKind::Direction | SensorKind::PumpStatus => None,
        }
    }
}

fn consumption_prefix(kind: ConsumptionType) -> Option<&'static str> {
    match kind {
        ConsumptionType::Heat => Some("heating"),
        ConsumptionType::Cool => Some("cooling"),
        ConsumptionType::WaterTank => Some("tank"),
        ConsumptionType::Total => None,
    }
}

fn consumption_label(kind: ConsumptionType) -> Option<&'static str> {
    match kind {
        ConsumptionType::Heat => Some("Heating"),
        ConsumptionType::Cool => Some("Cooling"),
        ConsumptionType::WaterTank => Some("Tank"),
        ConsumptionType::Total => None,
    }
}

/// Consumption kinds that apply to `device`
fn consumption_types(device: &Device) -> Vec<ConsumptionType> {
    let mut kinds = vec![ConsumptionType::Heat];
    if device.has_tank() {
        kinds.push(ConsumptionType::WaterTank);
    }
    if device.supports_cooling() {
        kinds.push(ConsumptionType::Cool);
    }
    kinds.push(ConsumptionType::Total);
    kinds
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub info: EntityInfo,
    pub kind: SensorKind,
    pub state: SensorState,
}

impl Sensor {
    pub fn new(device: &Device, kind: SensorKind) -> Self {
        Self {
            info: EntityInfo::new(Platform::Sensor, device, &kind.key(), &kind.name()),
            kind,
            state: SensorState {
                unit: kind.unit().map(str::to_string),
                ..SensorState::default()
            },
        }
    }

    /// Every sensor that applies to `device`
    pub fn all_for(device: &Device) -> Vec<Self> {
        let mut kinds = vec![SensorKind::OutdoorTemperature];
        let consumption = consumption_types(device);
        kinds.extend(consumption.iter().copied().map(SensorKind::MonthlyConsumption));
        kinds.extend(consumption.iter().copied().map(SensorKind::Consumption));
        kinds.push(SensorKind::Direction);
        kinds.push(SensorKind::PumpStatus);

        kinds.into_iter().map(|kind| Self::new(device, kind)).collect()
    }

    /// Recompute the value; `today` is the current date in the configured timezone
    pub fn handle_coordinator_update(
        &mut self,
        device: &Device,
        last_update_success: bool,
        today: NaiveDate,
    ) -> &SensorState {
        self.state.available = last_update_success;
        self.state.value = match self.kind {
            SensorKind::OutdoorTemperature => device
                .temperature_outdoor
                .map(|t| SensorValue::Number(f64::from(t))),
            SensorKind::Direction => Some(SensorValue::Text(device.direction.to_string())),
            SensorKind::PumpStatus => Some(SensorValue::Number(f64::from(device.pump_duty))),
            SensorKind::Consumption(kind) => match device.consumption(today, kind) {
                Ok(value) => Some(SensorValue::Number(value)),
                Err(ClientError::DataNotAvailable) => {
                    debug!(
                        "Consumption data for {} is not yet available for sensor {}",
                        today, self.info.unique_id
                    );
                    Some(SensorValue::Number(0.0))
                }
                Err(_) => Some(SensorValue::Number(0.0)),
            },
            SensorKind::MonthlyConsumption(kind) => {
                Some(SensorValue::Number(device.monthly_consumption(today, kind)))
            }
        };
        self.state.icon = match self.kind {
            SensorKind::Direction => Some("mdi:compass".to_string()),
            SensorKind::PumpStatus if device.pump_duty == 0 => Some("mdi:pump-off".to_string()),
            SensorKind::PumpStatus => Some("mdi:pump".to_string()),
            _ => None,
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::aquarea::device::Consumption;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn sensor(device: &Device, kind: SensorKind) -> Sensor {
        let mut sensor = Sensor::new(device, kind);
        sensor.handle_coordinator_update(device, true, today());
        sensor
    }

    #[test]
    fn test_sensors_for_device_with_tank_and_no_cooling() {
        let keys: Vec<String> = Sensor::all_for(&Device::sample())
            .into_iter()
            .map(|s| s.info.unique_id)
            .collect();

        assert!(keys.contains(&"B123456789_tank_energy_consumption".to_string()));
        assert!(keys.contains(&"B123456789_accumulated_energy_consumption".to_string()));
        assert!(!keys.iter().any(|k| k.contains("cooling")));
        assert_eq!(keys.len(), 3 + 2 * 3);
    }

    #[test]
    fn test_outdoor_temperature_and_direction() {
        let device = Device::sample();

        let outdoor = sensor(&device, SensorKind::OutdoorTemperature);
        assert_eq!(outdoor.state.value, Some(SensorValue::Number(7.0)));
        assert_eq!(outdoor.state.unit.as_deref(), Some("°C"));

        let direction = sensor(&device, SensorKind::Direction);
        assert_eq!(direction.state.value, Some(SensorValue::Text("WATER".to_string())));
        assert_eq!(direction.state.icon.as_deref(), Some("mdi:compass"));
    }

    #[test]
    fn test_pump_icon() {
        let mut device = Device::sample();
        assert_eq!(
            sensor(&device, SensorKind::PumpStatus).state.icon.as_deref(),
            Some("mdi:pump")
        );

        device.pump_duty = 0;
        assert_eq!(
            sensor(&device, SensorKind::PumpStatus).state.icon.as_deref(),
            Some("mdi:pump-off")
        );
    }

    #[test]
    fn test_todays_consumption_defaults_to_zero() {
        let mut device = Device::sample();
        let kind = SensorKind::Consumption(ConsumptionType::Total);
        assert_eq!(
            sensor(&device, kind).state.value,
            Some(SensorValue::Number(0.0))
        );

        device.consumption.insert(
            today(),
            Consumption {
                total: Some(3.25),
                ..Consumption::default()
            },
        );
        assert_eq!(
            sensor(&device, kind).state.value,
            Some(SensorValue::Number(3.25))
        );
    }

    #[test]
    fn test_unavailable_after_failed_update() {
        let device = Device::sample();
        let mut sensor = Sensor::new(&device, SensorKind::OutdoorTemperature);
        assert!(!sensor.handle_coordinator_update(&device, false, today()).available);
    }
}
