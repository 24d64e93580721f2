//! Keystroke Flux - Keystroke dynamics metrics engine
//!
//! Keystroke Flux turns raw keydown/keyup logs into typing-behavior metrics
//! through a deterministic pipeline: ingestion → grouping → event pairing →
//! aggregation → encoding.
//!
//! ## Modules
//!
//! - **Metrics Pipeline**: Per-test, per-session and per-field keystroke metrics
//!   (hold durations, inter-key intervals, pauses, corrections, typing speed)
//! - **Analysis**: Merge with self-reported stress, correlations and
//!   distribution summaries

pub mod aggregate;
pub mod config;
pub mod correlate;
pub mod encoder;
pub mod error;
pub mod pairing;
pub mod pipeline;
pub mod rollup;
pub mod schema;
pub mod stats;
pub mod stress;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{MetricsConfig, StdDevKind};
pub use error::ComputeError;
pub use pipeline::{keystrokes_to_metrics_json, KeystrokeProcessor};

// Schema exports
pub use schema::{EventType, InputFormat, KeyEvent, KeystrokeAdapter, TestType};

// Table exports
pub use rollup::{compute_all, compute_field_metrics, compute_metrics};
pub use types::{FieldMetricsRow, GroupMetrics, MetricsRow, RollupTables};

/// Library version embedded in all reports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "keystroke-flux";
