//! Analysis job manager and multi-modal fusion pipeline.
//!
//! This crate provides:
//! - In-memory job registry with atomic record replacement
//! - Background job execution with cancellation, timeouts and artifact cleanup
//! - Text and audio signal extraction against the model sidecar
//! - Frame-anchored timeline fusion
//! - Classifier adapter (verdict parsing, token-score confidence)
//! - JSON and plain-text reports

pub mod cancel;
pub mod classifier;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod extract;
pub mod fusion;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod stage;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use classifier::{ClassifierAdapter, Classification, HolisticContext};
pub use cleanup::ArtifactGuard;
pub use config::{PipelineConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use extract::{AudioSignalExtractor, TextSignalExtractor};
pub use fusion::TimelineFuser;
pub use logging::JobLogger;
pub use manager::{CancelOutcome, JobManager};
pub use pipeline::{AnalysisPipeline, Collaborators};
pub use registry::{JobEvent, JobRegistry};
pub use report::ReportWriter;
pub use stage::StageOutcome;
