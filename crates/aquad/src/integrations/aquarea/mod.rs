// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod aquarea;
mod button;
mod climate;
mod client;
mod config;
mod coordinator;
mod demo;
mod device;
mod entity;
mod sensor;
mod switch;
mod water_heater;

pub use aquarea::AquareaIntegration;
pub use client::AquareaClient;
pub use client::AuthErrorCode;
pub use client::ClientError;
pub use config::AquareaConfig;
pub use config::Environment;
pub use config::PartialAquareaConfig;
pub use demo::DemoClient;
pub use device::ConsumptionType;
pub use device::Consumption;
pub use device::Device;
pub use device::DeviceDirection;
pub use device::DeviceInfo;
pub use device::DeviceModeStatus;
pub use device::ExtendedOperationMode;
pub use device::OperationStatus;
pub use device::Tank;
pub use device::UpdateOperationMode;
pub use device::Zone;
use linkme::distributed_slice;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_aquarea(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let aquarea_config = if let Some(c) = &ctx.config.integrations.aquarea {
        c
    } else {
        return Ok(None);
    };

    match aquarea_config.environment {
        Environment::Demo => {
            let client = DemoClient::new(&aquarea_config.username, &aquarea_config.password);
            Ok(Some(Box::new(AquareaIntegration::new(
                client,
                aquarea_config,
            ))))
        }
        Environment::Production => anyhow::bail!(
            "integrations.aquarea.environment is \"production\" (the default when \
             unset), but aquad has no built-in Aquarea Smart Cloud client; set \
             environment = \"demo\" or register an AquareaIntegration with your \
             own AquareaClient"
        ),
    }
}
