mod config;
mod diagnostics;
mod partial;

pub use config::*;
pub use diagnostics::{format_diagnostics, Diagnostic};
pub(crate) use diagnostics::{SourceInfo, ValidationError};
pub(crate) use partial::FieldMerger;
