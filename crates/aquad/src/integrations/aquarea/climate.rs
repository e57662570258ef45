use tracing::debug;
use tracing::warn;

use super::client::AquareaClient;
use super::client::ClientError;
use super::device::Device;
use super::device::ExtendedOperationMode;
use super::device::OperationStatus;
use super::device::UpdateOperationMode;
use super::device::Zone;
use super::entity::EntityInfo;
use crate::engine::ClimateState;
use crate::engine::HvacMode;
use crate::engine::Platform;

/// Climate entity for one heating zone
#[derive(Debug, Clone, PartialEq)]
pub struct Climate {
    pub info: EntityInfo,
    pub zone_id: u8,
    pub state: ClimateState,
}

impl Climate {
    pub fn new(device: &Device, zone: &Zone) -> Self {
        let key = format!("climate_zone_{}", zone.zone_id);
        let mut climate = Self {
            info: EntityInfo::new(Platform::Climate, device, &key, &zone.name),
            zone_id: zone.zone_id,
            state: ClimateState::default(),
        };
        climate.handle_coordinator_update(device, true);
        climate
    }

    pub fn handle_coordinator_update(
        &mut self,
        device: &Device,
        last_update_success: bool,
    ) -> &ClimateState {
        let zone = device.zones.get(&self.zone_id);

        self.state.available = last_update_success && zone.is_some();
        self.state.hvac_modes = match zone {
            Some(zone) if zone.cool_mode => vec![HvacMode::Heat, HvacMode::Cool, HvacMode::Off],
            _ => vec![HvacMode::Heat, HvacMode::Off],
        };
        self.state.hvac_mode = zone.map_or(HvacMode::Off, |zone| hvac_mode(device, zone));
        self.state.current_temperature = zone.and_then(|z| z.temperature).map(f64::from);
        self.state.target_temperature = zone.and_then(|z| z.target_temperature).map(f64::from);
        self.state.min_temp = zone.and_then(|z| z.heat_min).map(f64::from);
        self.state.max_temp = zone.and_then(|z| z.heat_max).map(f64::from);
        &self.state
    }

    pub async fn set_temperature<C: AquareaClient + ?Sized>(
        &self,
        device: &Device,
        client: &C,
        temperature: Option<f64>,
    ) -> Result<(), ClientError> {
        let Some(temperature) = temperature else {
            return Ok(());
        };

        if !device.zones.contains_key(&self.zone_id) {
            warn!("{} has no zone {}", device.name(), self.zone_id);
            return Ok(());
        }

        debug!(
            "Setting {} zone {} temperature to {}",
            device.name(),
            self.zone_id,
            temperature
        );
        client
            .set_zone_temperature(device.long_id(), self.zone_id, temperature as i32)
            .await
    }

    pub async fn set_hvac_mode<C: AquareaClient + ?Sized>(
        &self,
        device: &Device,
        client: &C,
        hvac_mode: HvacMode,
    ) -> Result<(), ClientError> {
        let Some(zone) = device.zones.get(&self.zone_id) else {
            warn!("{} has no zone {}", device.name(), self.zone_id);
            return Ok(());
        };

        let mode = match hvac_mode {
            HvacMode::Heat => UpdateOperationMode::Heat,
            HvacMode::Off => UpdateOperationMode::Off,
            HvacMode::Cool if zone.cool_mode => UpdateOperationMode::Cool,
            HvacMode::Cool => {
                warn!("Zone {} of {} cannot cool", zone.name, device.name());
                return Ok(());
            }
        };

        debug!("Setting {} zone {} to {}", device.name(), self.zone_id, mode);
        client
            .set_mode(device.long_id(), mode, Some(self.zone_id))
            .await
    }
}

fn hvac_mode(device: &Device, zone: &Zone) -> HvacMode {
    if device.operation_status == OperationStatus::Off
        || zone.operation_status == OperationStatus::Off
    {
        return HvacMode::Off;
    }

    match device.mode {
        ExtendedOperationMode::Heat | ExtendedOperationMode::AutoHeat => HvacMode::Heat,
        ExtendedOperationMode::Cool | ExtendedOperationMode::AutoCool => HvacMode::Cool,
        ExtendedOperationMode::Off => HvacMode::Off,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::aquarea::client::Call;
    use crate::integrations::aquarea::client::MockAquareaClient;

    fn climate(device: &Device) -> Climate {
        Climate::new(device, &device.zones[&1])
    }

    #[test]
    fn test_projection() {
        let device = Device::sample();
        let climate = climate(&device);

        assert_eq!(climate.info.entity_id, "climate.heat_pump_climate_zone_1");
        assert_eq!(climate.info.name, "House");
        assert_eq!(climate.state.hvac_mode, HvacMode::Heat);
        assert_eq!(climate.state.hvac_modes, vec![HvacMode::Heat, HvacMode::Off]);
        assert_eq!(climate.state.current_temperature, Some(21.0));
        assert_eq!(climate.state.target_temperature, Some(22.0));
    }

    #[test]
    fn test_off_when_zone_or_device_is_off() {
        let mut device = Device::sample();
        let mut climate = climate(&device);

        device.zones.get_mut(&1).unwrap().operation_status = OperationStatus::Off;
        assert_eq!(
            climate.handle_coordinator_update(&device, true).hvac_mode,
            HvacMode::Off
        );

        let mut device = Device::sample();
        device.operation_status = OperationStatus::Off;
        assert_eq!(
            climate.handle_coordinator_update(&device, true).hvac_mode,
            HvacMode::Off
        );
    }

    #[test]
    fn test_cooling_zone() {
        let mut device = Device::sample();
        device.mode = ExtendedOperationMode::AutoCool;
        device.zones.get_mut(&1).unwrap().cool_mode = true;

        let climate = climate(&device);
        assert_eq!(climate.state.hvac_mode, HvacMode::Cool);
        assert!(climate.state.hvac_modes.contains(&HvacMode::Cool));
    }

    #[test]
    fn test_availability_follows_last_update() {
        let device = Device::sample();
        let mut climate = climate(&device);
        assert!(!climate.handle_coordinator_update(&device, false).available);
        assert!(climate.handle_coordinator_update(&device, true).available);
    }

    #[tokio::test]
    async fn test_commands() {
        let device = Device::sample();
        let client = MockAquareaClient::new();
        let climate = climate(&device);

        climate
            .set_temperature(&device, &client, Some(22.9))
            .await
            .unwrap();
        climate.set_temperature(&device, &client, None).await.unwrap();
        climate
            .set_hvac_mode(&device, &client, HvacMode::Off)
            .await
            .unwrap();
        // Zone 1 of the sample is heating only
        climate
            .set_hvac_mode(&device, &client, HvacMode::Cool)
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![
                Call::SetZoneTemperature(1, 22),
                Call::SetMode(UpdateOperationMode::Off, Some(1)),
            ]
        );
    }
}
