pub mod coordinator;
mod device;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod engine;
mod integration;
mod message;
pub mod state;

pub use coordinator::Coordinator;
pub use coordinator::DataSource;
pub use coordinator::Snapshot;
pub use coordinator::UpdateError;
pub use device::Device;
pub use engine::CommandError;
pub use engine::Engine;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationError;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::FromIntegrationMessage;
pub use message::Platform;
pub use message::ToIntegrationMessage;
pub use state::ClimateState;
pub use state::HvacMode;
pub use state::IntegrationHealth;
pub use state::SensorState;
pub use state::SensorValue;
pub use state::State;
pub use state::SwitchState;
pub use state::WaterHeaterOperationState;
pub use state::WaterHeaterState;
