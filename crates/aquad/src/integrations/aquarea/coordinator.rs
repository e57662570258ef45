use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;

use super::client::AquareaClient;
use super::client::ClientError;
use super::device::Device;
use super::device::DeviceInfo;
use crate::engine::Coordinator;
use crate::engine::DataSource;
use crate::engine::UpdateError;

/// Coordinator polling one Aquarea device
pub type AquareaCoordinator<C> = Coordinator<AquareaUpdater<C>>;

/// Fetches the snapshot of a single device
pub struct AquareaUpdater<C: AquareaClient> {
    client: Arc<C>,
    device_info: DeviceInfo,
    consumption_refresh_interval: Duration,
    timezone: Tz,
}

impl<C: AquareaClient> AquareaUpdater<C> {
    pub fn new(
        client: Arc<C>,
        device_info: DeviceInfo,
        consumption_refresh_interval: Duration,
        timezone: Tz,
    ) -> Self {
        Self {
            client,
            device_info,
            consumption_refresh_interval,
            timezone,
        }
    }
}

/// Build the coordinator for `device_info`, named after the account and device
pub fn device_coordinator<C: AquareaClient>(
    client: Arc<C>,
    username: &str,
    device_info: DeviceInfo,
    scan_interval: Duration,
    consumption_refresh_interval: Duration,
    timezone: Tz,
) -> AquareaCoordinator<C> {
    let name = format!("aquarea-{}-{}", username, device_info.device_id);
    Coordinator::new(
        name,
        AquareaUpdater::new(client, device_info, consumption_refresh_interval, timezone),
        scan_interval,
    )
}

/// Map a client error onto the signal the coordinator understands
pub fn translate(err: ClientError) -> UpdateError {
    match err {
        ClientError::Authentication { ref code, .. } if code.requires_reauth() => {
            UpdateError::AuthFailed(err.to_string())
        }
        ClientError::RequestFailed { .. } => UpdateError::UpdateFailed(format!(
            "Error communicating with Aquarea Smart Cloud API: {}",
            err
        )),
        other => UpdateError::Unexpected(Box::new(other)),
    }
}

#[async_trait]
impl<C: AquareaClient> DataSource for AquareaUpdater<C> {
    type Data = Device;

    async fn fetch(&self) -> Result<Device, UpdateError> {
        self.client
            .get_device(
                &self.device_info,
                self.consumption_refresh_interval,
                self.timezone,
            )
            .await
            .map_err(translate)
    }
}
