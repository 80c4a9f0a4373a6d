//! # ScanBench Core
//!
//! Domain model for the scan engine: the scan aggregate and its state
//! machine, trajectory generation, motion profiles, acquisition-rate
//! capability, and the event bus that distributes scan events.

pub mod bus;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod motion;
pub mod scan;
pub mod status;
pub mod trajectory;
pub mod units;

pub use bus::{EventBus, EventFilter, ScopedSubscription, SubscriptionId};

pub use capability::AcquisitionRateCapability;

pub use config::{FlyScanConfig, ScanPattern, ScanZone, StepScanConfig};

pub use error::{Error, ExecutorError, HardwareError, Result, ScanError, ValidationError};

pub use events::{ScanEvent, ScanEventKind};

pub use motion::{AtomicMotion, MotionProfile};

pub use scan::{PointAppend, Scan, ScanConfig, ScanId, ScanKind, SharedScan};

pub use status::{MotionState, ScanStatus};

pub use trajectory::{build_motions, generate_positions, ProfileSelector};

pub use units::{Measurement, Position, ScanPointResult};
