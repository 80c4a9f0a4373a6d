//! Persistent bench configuration.
//!
//! Motion profiles, acquisition defaults, and default scan geometry, stored
//! as JSON in the platform config directory.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{AcquisitionSettings, BenchSettings, MotionSettings, ScanDefaults};
pub use error::{SettingsError, SettingsResult};
pub use persistence::{default_settings_path, load, load_from_file, save, save_to_file};
