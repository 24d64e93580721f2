//! Pipeline orchestration
//!
//! Public entry points that run the full chain: ingest → group → pair →
//! aggregate → encode.

use crate::config::MetricsConfig;
use crate::encoder::{MetricsEncoder, MetricsReport};
use crate::error::ComputeError;
use crate::rollup::compute_all;
use crate::schema::{InputFormat, KeyEvent, KeystrokeAdapter};
use crate::types::RollupTables;
use log::info;

/// Convert a JSON array of keystroke rows into a metrics report (stateless, one-shot).
///
/// Uses the default configuration.
///
/// # Arguments
/// * `json` - JSON array of keystroke objects
///
/// # Returns
/// Metrics report JSON string
///
/// # Example
/// ```ignore
/// let report_json = keystrokes_to_metrics_json(rows_json)?;
/// ```
pub fn keystrokes_to_metrics_json(json: String) -> Result<String, ComputeError> {
    KeystrokeProcessor::new().process_to_json(&json, InputFormat::Json)
}

/// Processor carrying a configuration and a stable producer identity across runs
pub struct KeystrokeProcessor {
    config: MetricsConfig,
    encoder: MetricsEncoder,
}

impl Default for KeystrokeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeystrokeProcessor {
    /// Create a processor with the default configuration
    pub fn new() -> Self {
        Self {
            config: MetricsConfig::default(),
            encoder: MetricsEncoder::new(),
        }
    }

    /// Create a processor with a specific configuration
    pub fn with_config(config: MetricsConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: MetricsEncoder::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Compute both tables from already-validated events
    pub fn process_events(&self, events: &[KeyEvent]) -> RollupTables {
        let tables = compute_all(events, &self.config);
        info!(
            "Computed {} metrics rows and {} per-field rows from {} events",
            tables.metrics.len(),
            tables.field_metrics.len(),
            events.len()
        );
        tables
    }

    /// Parse, validate and compute both tables
    pub fn process(&self, input: &str, format: InputFormat) -> Result<RollupTables, ComputeError> {
        let events = KeystrokeAdapter::load(input, format)?;
        Ok(self.process_events(&events))
    }

    /// Parse, validate, compute and wrap the tables in a report
    pub fn process_to_report(
        &self,
        input: &str,
        format: InputFormat,
    ) -> Result<MetricsReport, ComputeError> {
        let tables = self.process(input, format)?;
        Ok(self.encoder.encode(tables, &self.config))
    }

    /// Parse, validate, compute and encode the report as JSON
    pub fn process_to_json(&self, input: &str, format: InputFormat) -> Result<String, ComputeError> {
        let tables = self.process(input, format)?;
        self.encoder.encode_to_json(tables, &self.config)
    }
}
