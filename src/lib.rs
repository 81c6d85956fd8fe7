//! AEOLUS-OS: Offshore Wind Turbine Prognostics & Maintenance Intelligence
//!
//! Three-stage estimator pipeline over one asset's ordered anomaly stream:
//!
//! - **Health Index Estimator**: anomaly intensity -> bounded, ratcheted
//!   health score in [0.05, 1.0]
//! - **Real-Time RUL Estimator**: health series -> hours-to-failure forecast
//!   (local slope + stateful monotonic projection)
//! - **Maintenance Scheduler**: RUL forecast + fault history + criticality
//!   -> ranked per-subsystem action list
//!
//! Anomaly detection itself (model training and inference), sensor
//! preprocessing, and the dashboard/API layer are external collaborators —
//! they talk to this crate through the CSV artifacts in `storage`.

pub mod config;
pub mod types;
pub mod stats;
pub mod health;
pub mod rul;
pub mod maintenance;
pub mod storage;
pub mod pipeline;

// Re-export configuration
pub use config::PrognosticsConfig;

// Re-export commonly used types
pub use types::{
    AnomalySample, HealthSample, MaintenanceRecord, RecommendedAction, RulSample, Subsystem,
};

// Re-export the estimator stages
pub use health::HealthIndexEstimator;
pub use maintenance::MaintenanceScheduler;
pub use rul::RulEstimator;

// Re-export pipeline + storage surfaces
pub use pipeline::{PipelineError, PrognosticsPipeline, RunSummary};
pub use storage::{ArtifactStore, StorageError};
