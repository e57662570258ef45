use super::client::AquareaClient;
use super::client::ClientError;
use super::device::Device;
use super::entity::EntityInfo;
use crate::engine::Platform;
use crate::engine::SwitchState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    QuietMode,
    ForceDhw,
    ForceHeater,
    HolidayTimer,
}

impl SwitchKind {
    fn key(&self) -> &'static str {
        match self {
            SwitchKind::QuietMode => "quiet_mode",
            SwitchKind::ForceDhw => "force_dhw",
            SwitchKind::ForceHeater => "force_heater",
            SwitchKind::HolidayTimer => "holiday_timer",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SwitchKind::QuietMode => "Quiet Mode",
            SwitchKind::ForceDhw => "Force DHW",
            SwitchKind::ForceHeater => "Force Heater",
            SwitchKind::HolidayTimer => "Holiday Timer",
        }
    }

    fn is_on(&self, device: &Device) -> bool {
        match self {
            SwitchKind::QuietMode => device.quiet_mode,
            SwitchKind::ForceDhw => device.force_dhw,
            SwitchKind::ForceHeater => device.force_heater,
            SwitchKind::HolidayTimer => device.holiday_timer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub info: EntityInfo,
    pub kind: SwitchKind,
    pub state: SwitchState,
}

impl Switch {
    pub fn new(device: &Device, kind: SwitchKind) -> Self {
        Self {
            info: EntityInfo::new(Platform::Switch, device, kind.key(), kind.name()),
            kind,
            state: SwitchState::default(),
        }
    }

    /// Every switch that applies to `device`; force DHW needs a tank
    pub fn all_for(device: &Device) -> Vec<Self> {
        [
            SwitchKind::QuietMode,
            SwitchKind::ForceDhw,
            SwitchKind::ForceHeater,
            SwitchKind::HolidayTimer,
        ]
        .into_iter()
        .filter(|kind| *kind != SwitchKind::ForceDhw || device.has_tank())
        .map(|kind| Self::new(device, kind))
        .collect()
    }

    pub fn handle_coordinator_update(
        &mut self,
        device: &Device,
        last_update_success: bool,
    ) -> &SwitchState {
        self.state.available = last_update_success;
        self.state.on = self.kind.is_on(device);
        &self.state
    }

    pub async fn turn<C: AquareaClient + ?Sized>(
        &self,
        device: &Device,
        client: &C,
        on: bool,
    ) -> Result<(), ClientError> {
        let long_id = device.long_id();
        match self.kind {
            SwitchKind::QuietMode => client.set_quiet_mode(long_id, on).await,
            SwitchKind::ForceDhw => client.set_force_dhw(long_id, on).await,
            SwitchKind::ForceHeater => client.set_force_heater(long_id, on).await,
            SwitchKind::HolidayTimer => client.set_holiday_timer(long_id, on).await,
        }
    }
}
