//! Type definitions for image checks and configuration

mod config_types;
mod image_types;
mod update_types;

pub use config_types::*;
pub use image_types::*;
pub use update_types::*;
