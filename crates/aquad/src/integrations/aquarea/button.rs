use tracing::debug;

use super::client::AquareaClient;
use super::client::ClientError;
use super::device::Device;
use super::device::DeviceModeStatus;
use super::entity::EntityInfo;
use crate::engine::Platform;

/// Asks the heat pump to start a defrost cycle
#[derive(Debug, Clone, PartialEq)]
pub struct DefrostButton {
    pub info: EntityInfo,
}

impl DefrostButton {
    pub fn new(device: &Device) -> Self {
        Self {
            info: EntityInfo::new(Platform::Button, device, "request_defrost", "Request Defrost"),
        }
    }

    /// Skipped while the device is already defrosting
    pub async fn press<C: AquareaClient + ?Sized>(
        &self,
        device: &Device,
        client: &C,
    ) -> Result<(), ClientError> {
        if device.device_mode_status == DeviceModeStatus::Defrost {
            debug!("{} is already defrosting", device.name());
            return Ok(());
        }

        debug!("Requesting defrost for device {}", device.name());
        client.request_defrost(device.long_id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::aquarea::client::Call;
    use crate::integrations::aquarea::client::MockAquareaClient;

    #[tokio::test]
    async fn test_press_skipped_while_defrosting() {
        let mut device = Device::sample();
        let client = MockAquareaClient::new();
        let button = DefrostButton::new(&device);

        button.press(&device, &client).await.unwrap();
        device.device_mode_status = DeviceModeStatus::Defrost;
        button.press(&device, &client).await.unwrap();

        assert_eq!(client.calls(), vec![Call::RequestDefrost]);
    }
}
