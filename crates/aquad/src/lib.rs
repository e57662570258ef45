pub mod api;
pub mod config;
pub mod engine;
pub mod integrations;

pub use config::format_diagnostics;
pub use config::Config;
pub use config::Diagnostic;
pub use config::LogLevel;
pub use engine::Engine;
pub use engine::State;
