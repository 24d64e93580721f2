//! kflux - Command-line interface for Keystroke Flux
//!
//! Commands:
//! - compute: Compute the metrics and per-field metrics tables
//! - validate: Check keystroke rows without computing anything
//! - correlate: Correlate typing metrics with self-reported stress
//! - summarize: Distribution summaries per test type and per field
//! - config: Print the effective configuration

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use keystroke_flux::correlate::{correlate, CorrelationRow};
use keystroke_flux::encoder::{to_csv, to_ndjson, MetricsEncoder};
use keystroke_flux::schema::{InputFormat, KeyEvent, KeystrokeAdapter};
use keystroke_flux::stress::{merge_stress, parse_stress_csv};
use keystroke_flux::summary::{summarize_by_field, summarize_by_test, FieldSummary, TestSummary};
use keystroke_flux::{ComputeError, KeystrokeProcessor, MetricsConfig, StdDevKind, FLUX_VERSION};

/// kflux - Keystroke dynamics metrics from raw keydown/keyup logs
#[derive(Parser)]
#[command(name = "kflux")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Compute keystroke-dynamics metrics", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG applies otherwise
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the metrics table (per test and overall) and the per-field table
    Compute {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file path for the metrics table (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// Also write the per-field table to this path, in the output format
        #[arg(long)]
        field_output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Validate keystroke rows
    Validate {
        #[command(flatten)]
        source: SourceArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Correlate per-test metrics with self-reported stress and workload
    Correlate {
        #[command(flatten)]
        source: SourceArgs,

        /// Stress/workload CSV (session_id, test_type, stress_level, ...)
        #[arg(long)]
        stress: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Summarize metric distributions (p10, mean, p90) per test type and per field
    Summarize {
        #[command(flatten)]
        source: SourceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Keystroke input file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Input format
    #[arg(long, default_value = "csv")]
    input_format: InputFormatArg,
}

#[derive(Args)]
struct ConfigArgs {
    /// Load configuration from a JSON file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Discard key holds at or above this duration (ms)
    #[arg(long)]
    khd_max_ms: Option<i64>,

    /// Discard inter-key intervals at or above this gap (ms)
    #[arg(long)]
    iki_max_ms: Option<i64>,

    /// Short pause threshold (ms), reported as pause_count_200ms
    #[arg(long)]
    pause_short_ms: Option<i64>,

    /// Long pause threshold (ms), reported as pause_count_500ms
    #[arg(long)]
    pause_long_ms: Option<i64>,

    /// Key identifier counted as a correction
    #[arg(long)]
    backspace_key: Option<String>,

    /// Standard deviation flavor
    #[arg(long)]
    sd: Option<SdArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormatArg {
    /// Comma-separated values with a header row
    Csv,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
}

impl From<InputFormatArg> for InputFormat {
    fn from(arg: InputFormatArg) -> Self {
        match arg {
            InputFormatArg::Csv => InputFormat::Csv,
            InputFormatArg::Ndjson => InputFormat::Ndjson,
            InputFormatArg::Json => InputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// CSV table with a header row
    Csv,
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// Full JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum SdArg {
    /// n - 1 denominator
    Sample,
    /// n denominator
    Population,
}

impl From<SdArg> for StdDevKind {
    fn from(arg: SdArg) -> Self {
        match arg {
            SdArg::Sample => StdDevKind::Sample,
            SdArg::Population => StdDevKind::Population,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr. -v flags win over RUST_LOG; without either only warnings show.
fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    let level = match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        _ => Some(LevelFilter::Debug),
    };
    match level {
        Some(level) => {
            builder.filter_level(level);
        }
        None if std::env::var_os("RUST_LOG").is_none() => {
            builder.filter_level(LevelFilter::Warn);
        }
        None => {}
    }
    builder.init();
}

fn run(command: Commands) -> Result<(), KfluxCliError> {
    match command {
        Commands::Compute {
            source,
            output,
            output_format,
            field_output,
            config,
        } => cmd_compute(
            &source,
            &output,
            output_format,
            field_output.as_deref(),
            &config,
        ),
        Commands::Validate { source, json } => cmd_validate(&source, json),
        Commands::Correlate {
            source,
            stress,
            json,
            config,
        } => cmd_correlate(&source, &stress, json, &config),
        Commands::Summarize {
            source,
            json,
            config,
        } => cmd_summarize(&source, json, &config),
        Commands::Config { config } => cmd_config(&config),
    }
}

fn cmd_compute(
    source: &SourceArgs,
    output: &Path,
    output_format: OutputFormat,
    field_output: Option<&Path>,
    config_args: &ConfigArgs,
) -> Result<(), KfluxCliError> {
    let processor = KeystrokeProcessor::with_config(build_config(config_args)?)?;
    let events = load_events(source)?;
    let tables = processor.process_events(&events);

    let (metrics_data, field_data) = match output_format {
        OutputFormat::Csv => (to_csv(&tables.metrics)?, to_csv(&tables.field_metrics)?),
        OutputFormat::Ndjson => (
            to_ndjson(&tables.metrics)?,
            to_ndjson(&tables.field_metrics)?,
        ),
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let pretty = matches!(output_format, OutputFormat::JsonPretty);
            let fields = to_json(&tables.field_metrics, pretty)?;
            let report = MetricsEncoder::new().encode(tables, processor.config());
            (to_json(&report, pretty)?, fields)
        }
    };

    write_output(output, &metrics_data)?;
    if let Some(path) = field_output {
        write_output(path, &field_data)?;
        info!("Wrote per-field table to {}", path.display());
    }
    Ok(())
}

fn cmd_validate(source: &SourceArgs, json: bool) -> Result<(), KfluxCliError> {
    let input_data = read_input(&source.input)?;
    let records = KeystrokeAdapter::parse(&input_data, source.input_format.into())?;
    let issues = KeystrokeAdapter::validate_records(&records);

    let report = ValidationReport {
        total_rows: records.len(),
        valid_rows: records.len() - issues.len(),
        invalid_rows: issues.len(),
        errors: issues
            .into_iter()
            .map(|issue| ValidationErrorDetail {
                row: issue.row,
                error: issue.message,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Valid rows:   {}", report.valid_rows);
        println!("Invalid rows: {}", report.invalid_rows);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Row {}: {}", err.row, err.error);
            }
        }
    }

    if report.invalid_rows > 0 {
        Err(KfluxCliError::ValidationFailed(report.invalid_rows))
    } else {
        Ok(())
    }
}

fn cmd_correlate(
    source: &SourceArgs,
    stress_path: &Path,
    json: bool,
    config_args: &ConfigArgs,
) -> Result<(), KfluxCliError> {
    let processor = KeystrokeProcessor::with_config(build_config(config_args)?)?;
    let events = load_events(source)?;
    let stress = parse_stress_csv(&read_input(stress_path)?)?;

    let tables = processor.process_events(&events);
    let merged = merge_stress(&tables.metrics, &stress);
    let rows = correlate(&merged);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_correlations(&rows);
    }
    Ok(())
}

fn cmd_summarize(
    source: &SourceArgs,
    json: bool,
    config_args: &ConfigArgs,
) -> Result<(), KfluxCliError> {
    let processor = KeystrokeProcessor::with_config(build_config(config_args)?)?;
    let events = load_events(source)?;
    let tables = processor.process_events(&events);

    let report = SummaryReport {
        by_test: summarize_by_test(&tables.metrics),
        by_field: summarize_by_field(&tables.field_metrics),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summaries(&report);
    }
    Ok(())
}

fn cmd_config(config_args: &ConfigArgs) -> Result<(), KfluxCliError> {
    let config = build_config(config_args)?;
    println!("{}", config.to_json()?);
    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, KfluxCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), KfluxCliError> {
    if path.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn load_events(source: &SourceArgs) -> Result<Vec<KeyEvent>, KfluxCliError> {
    let input_data = read_input(&source.input)?;
    let events = KeystrokeAdapter::load(&input_data, source.input_format.into())?;
    if events.is_empty() {
        return Err(KfluxCliError::NoEvents);
    }
    Ok(events)
}

/// Defaults, then the config file, then individual flags
fn build_config(args: &ConfigArgs) -> Result<MetricsConfig, KfluxCliError> {
    let mut config = match &args.config {
        Some(path) => MetricsConfig::from_json(&fs::read_to_string(path)?)?,
        None => MetricsConfig::default(),
    };

    if let Some(v) = args.khd_max_ms {
        config.khd_max_ms = v;
    }
    if let Some(v) = args.iki_max_ms {
        config.iki_max_ms = v;
    }
    if let Some(v) = args.pause_short_ms {
        config.pause_short_ms = v;
    }
    if let Some(v) = args.pause_long_ms {
        config.pause_long_ms = v;
    }
    if let Some(v) = &args.backspace_key {
        config.backspace_key = v.clone();
    }
    if let Some(v) = args.sd {
        config.sd_kind = v.into();
    }

    config.validate()?;
    Ok(config)
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, KfluxCliError> {
    let mut json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    json.push('\n');
    Ok(json)
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

fn print_correlations(rows: &[CorrelationRow]) {
    println!("Correlations (r, p-value) with stress/workload [per-test only]");
    println!("==============================================================");

    let mut current = None;
    for row in rows {
        if current != Some(row.outcome) {
            println!("\n  {}:", row.outcome.as_str());
            current = Some(row.outcome);
        }
        println!(
            "    {:<20} r = {:>7}, p = {:>7} (n = {})",
            row.predictor.as_str(),
            format_value(row.r),
            format_value(row.p_value),
            row.n
        );
    }
}

fn print_summaries(report: &SummaryReport) {
    println!("Overall stats (by test_type: p10, mean, p90)");
    println!("============================================");
    for summary in &report.by_test {
        println!("\n--- {} (n = {} rows) ---", summary.test_type, summary.n_rows);
        for m in &summary.metrics {
            println!(
                "  {}: p10 = {:.2}, mean = {:.2}, p90 = {:.2}",
                m.metric.as_str(),
                m.p10,
                m.mean,
                m.p90
            );
        }
    }

    if report.by_field.is_empty() {
        println!("\nNo per-field metrics to summarize.");
        return;
    }

    println!("\nPer-field stats (across all sessions)");
    println!("=====================================");
    for summary in &report.by_field {
        println!(
            "\n--- test_type = {}, field_name = {} ---",
            summary.test_type, summary.field_name
        );
        for m in &summary.metrics {
            println!(
                "  {}: p10 = {:.2}, mean = {:.2}, p90 = {:.2} (n = {})",
                m.metric.as_str(),
                m.p10,
                m.mean,
                m.p90,
                m.n_rows
            );
        }
    }
}

// Error types

#[derive(Debug)]
enum KfluxCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
}

impl From<io::Error> for KfluxCliError {
    fn from(e: io::Error) -> Self {
        KfluxCliError::Io(e)
    }
}

impl From<ComputeError> for KfluxCliError {
    fn from(e: ComputeError) -> Self {
        KfluxCliError::Compute(e)
    }
}

impl From<serde_json::Error> for KfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        KfluxCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<KfluxCliError> for CliError {
    fn from(e: KfluxCliError) -> Self {
        match e {
            KfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            KfluxCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::MissingColumn(_) => (
                        "SCHEMA_ERROR",
                        "Required columns: session_id, test_type, event_type, key, pressed_at",
                    ),
                    ComputeError::MissingField { .. }
                    | ComputeError::TimestampParse { .. }
                    | ComputeError::InvalidEventType { .. } => {
                        ("INVALID_ROW", "Run 'kflux validate' to list every bad row")
                    }
                    ComputeError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Run 'kflux config' to inspect the configuration")
                    }
                    _ => ("PARSE_ERROR", "Check the --input-format matches the file"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            KfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            KfluxCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No keystroke rows found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            KfluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_rows: usize,
    valid_rows: usize,
    invalid_rows: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    row: usize,
    error: String,
}

#[derive(Serialize)]
struct SummaryReport {
    by_test: Vec<TestSummary>,
    by_field: Vec<FieldSummary>,
}
