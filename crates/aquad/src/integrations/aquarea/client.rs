use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;

use super::device::Device;
use super::device::DeviceInfo;
use super::device::OperationStatus;
use super::device::UpdateOperationMode;

/// Error codes the cloud attaches to authentication failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    InvalidCredentials,
    InvalidUsernameOrPassword,
    TokenExpired,
    Other(String),
}

impl AuthErrorCode {
    /// Whether the only way forward is new credentials from the user
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthErrorCode::InvalidCredentials
                | AuthErrorCode::InvalidUsernameOrPassword
                | AuthErrorCode::TokenExpired
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("authentication error ({code:?}): {message}")]
    Authentication {
        code: AuthErrorCode,
        message: String,
    },

    #[error("request failed: {message}")]
    RequestFailed { message: String },

    /// Requested data has not been fetched yet; it is scheduled for the next refresh
    #[error("data not available yet")]
    DataNotAvailable,
}

/// Operations the integration needs from an Aquarea Smart Cloud client
///
/// The cloud protocol itself lives behind this trait. Device commands are
/// addressed by the device's long id.
#[async_trait]
pub trait AquareaClient: Send + Sync + 'static {
    async fn login(&self) -> Result<(), ClientError>;

    async fn get_devices(&self) -> Result<Vec<DeviceInfo>, ClientError>;

    /// Fetch a complete device snapshot
    ///
    /// Consumption data is refreshed at most every `consumption_refresh_interval`;
    /// days are computed in `timezone`.
    async fn get_device(
        &self,
        info: &DeviceInfo,
        consumption_refresh_interval: Duration,
        timezone: Tz,
    ) -> Result<Device, ClientError>;

    async fn set_tank_target_temperature(
        &self,
        long_id: &str,
        temperature: i32,
    ) -> Result<(), ClientError>;

    async fn set_tank_operation_status(
        &self,
        long_id: &str,
        status: OperationStatus,
    ) -> Result<(), ClientError>;

    async fn set_zone_temperature(
        &self,
        long_id: &str,
        zone_id: u8,
        temperature: i32,
    ) -> Result<(), ClientError>;

    /// Change the operation mode of one zone, or of all zones when `zone_id` is None
    async fn set_mode(
        &self,
        long_id: &str,
        mode: UpdateOperationMode,
        zone_id: Option<u8>,
    ) -> Result<(), ClientError>;

    async fn set_quiet_mode(&self, long_id: &str, on: bool) -> Result<(), ClientError>;

    async fn set_force_dhw(&self, long_id: &str, on: bool) -> Result<(), ClientError>;

    async fn set_force_heater(&self, long_id: &str, on: bool) -> Result<(), ClientError>;

    async fn set_holiday_timer(&self, long_id: &str, on: bool) -> Result<(), ClientError>;

    async fn request_defrost(&self, long_id: &str) -> Result<(), ClientError>;

    /// Close the session
    async fn close(&self);
}

/// A command recorded by [`MockAquareaClient`]
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetTankTargetTemperature(i32),
    SetTankOperationStatus(OperationStatus),
    SetZoneTemperature(u8, i32),
    SetMode(UpdateOperationMode, Option<u8>),
    SetQuietMode(bool),
    SetForceDhw(bool),
    SetForceHeater(bool),
    SetHolidayTimer(bool),
    RequestDefrost,
    Close,
}

/// Mock Aquarea client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockAquareaClient {
    pub devices: Vec<DeviceInfo>,
    pub login_error: std::sync::Mutex<Option<ClientError>>,
    pub snapshots: std::sync::Mutex<std::collections::VecDeque<Result<Device, ClientError>>>,
    pub calls: std::sync::Mutex<Vec<Call>>,
    pub fetches: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockAquareaClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that lists `device` and serves it on every fetch
    pub fn with_device(device: Device) -> Self {
        let mock = Self {
            devices: vec![device.info.clone()],
            ..Self::default()
        };
        mock.push_snapshot(Ok(device));
        mock
    }

    /// Queue the result of the next `get_device` call
    pub fn push_snapshot(&self, result: Result<Device, ClientError>) {
        self.snapshots.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl AquareaClient for MockAquareaClient {
    async fn login(&self) -> Result<(), ClientError> {
        match self.login_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn get_devices(&self) -> Result<Vec<DeviceInfo>, ClientError> {
        Ok(self.devices.clone())
    }

    /// Serves queued results in order; the last successful snapshot repeats
    async fn get_device(
        &self,
        _info: &DeviceInfo,
        _consumption_refresh_interval: Duration,
        _timezone: Tz,
    ) -> Result<Device, ClientError> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        match snapshots.pop_front() {
            Some(Ok(device)) => {
                if snapshots.is_empty() {
                    snapshots.push_back(Ok(device.clone()));
                }
                Ok(device)
            }
            Some(Err(e)) => Err(e),
            None => Err(ClientError::RequestFailed {
                message: "no snapshot queued".to_string(),
            }),
        }
    }

    async fn set_tank_target_temperature(
        &self,
        _long_id: &str,
        temperature: i32,
    ) -> Result<(), ClientError> {
        self.record(Call::SetTankTargetTemperature(temperature))
    }

    async fn set_tank_operation_status(
        &self,
        _long_id: &str,
        status: OperationStatus,
    ) -> Result<(), ClientError> {
        self.record(Call::SetTankOperationStatus(status))
    }

    async fn set_zone_temperature(
        &self,
        _long_id: &str,
        zone_id: u8,
        temperature: i32,
    ) -> Result<(), ClientError> {
        self.record(Call::SetZoneTemperature(zone_id, temperature))
    }

    async fn set_mode(
        &self,
        _long_id: &str,
        mode: UpdateOperationMode,
        zone_id: Option<u8>,
    ) -> Result<(), ClientError> {
        self.record(Call::SetMode(mode, zone_id))
    }

    async fn set_quiet_mode(&self, _long_id: &str, on: bool) -> Result<(), ClientError> {
        self.record(Call::SetQuietMode(on))
    }

    async fn set_force_dhw(&self, _long_id: &str, on: bool) -> Result<(), ClientError> {
        self.record(Call::SetForceDhw(on))
    }

    async fn set_force_heater(&self, _long_id: &str, on: bool) -> Result<(), ClientError> {
        self.record(Call::SetForceHeater(on))
    }

    async fn set_holiday_timer(&self, _long_id: &str, on: bool) -> Result<(), ClientError> {
        self.record(Call::SetHolidayTimer(on))
    }

    async fn request_defrost(&self, _long_id: &str) -> Result<(), ClientError> {
        self.record(Call::RequestDefrost)
    }

    async fn close(&self) {
        self.calls.lock().unwrap().push(Call::Close);
    }
}
