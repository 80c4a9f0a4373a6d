//! # Scanbench
//!
//! Scan execution engine for a motorized 2-D measurement bench:
//! - Step scans (move, settle, average) and fly scans (sample on the move)
//! - Trapezoidal motion profiles with predicted acquisition positions
//! - Capability-checked fly configuration against the measured sampling rate
//! - Event-driven progress reporting over an in-process bus
//!
//! ## Architecture
//!
//! Scanbench is organized as a workspace with multiple crates:
//!
//! 1. **scanbench-core** - Scan aggregate, motion math, configs, event bus
//! 2. **scanbench-execution** - Step and fly executors, hardware ports, sims
//! 3. **scanbench-service** - Application service, handles, output boundary
//! 4. **scanbench-settings** - Persistent bench configuration
//! 5. **scanbench** - Main binary that integrates all crates

pub use scanbench_core::{
    AcquisitionRateCapability, AtomicMotion, EventBus, EventFilter, FlyScanConfig, HardwareError,
    Measurement, MotionProfile, MotionState, PointAppend, Position, ProfileSelector, Scan,
    ScanConfig, ScanError, ScanEvent, ScanEventKind, ScanId, ScanKind, ScanPattern,
    ScanPointResult, ScanStatus, ScanZone, ScopedSubscription, SharedScan, StepScanConfig,
    SubscriptionId, ValidationError,
};

pub use scanbench_execution::{
    AcquisitionPort, FlyScanExecutor, MotionPort, SimAcquisitionPort, SimMotionPort,
    StepScanExecutor,
};

pub use scanbench_service::{
    LoggingOutputBoundary, ScanHandle, ScanOutputBoundary, ScanRequest, ScanService,
    ScanStatusReport, ServiceError, ServiceResult,
};

pub use scanbench_settings::{BenchSettings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Console output with pretty formatting and RUST_LOG environment variable
/// support, defaulting to INFO.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
