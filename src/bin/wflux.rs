//! wflux CLI - Command-line interface for Wrist Flux
//!
//! Commands:
//! - transform: Replay recorded frame records into snapshots (batch mode)
//! - run: Process streaming frame records from stdin (streaming mode)
//! - validate: Validate frame record schema
//! - doctor: Diagnose configuration and environment
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use wrist_flux::frame::{FrameRecord, FrameRecordAdapter, ValidationError};
use wrist_flux::snapshot::{SnapshotEncoder, WristSnapshot};
use wrist_flux::{
    FluxError, PipelineConfig, WristPipeline, FLUX_VERSION, FRAME_SCHEMA_VERSION, PRODUCER_NAME,
    SNAPSHOT_VERSION,
};

/// wflux - Landmark-to-metric engine for wrist posture and finger motion
#[derive(Parser)]
#[command(name = "wflux")]
#[command(version = FLUX_VERSION)]
#[command(
    about = "Turn hand and pose landmark streams into wrist angle snapshots",
    long_about = None
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. "info", "wrist_flux=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Pipeline settings shared by transform and run
#[derive(clap::Args)]
struct PipelineArgs {
    /// Load pipeline configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the angle smoothing window (frames)
    #[arg(long)]
    angle_window: Option<usize>,

    /// Override the calibration stabilization delay (milliseconds)
    #[arg(long)]
    stabilization_delay_ms: Option<i64>,

    /// Treat detector hand labels as anatomical (camera feed is not mirrored)
    #[arg(long)]
    no_mirror: bool,

    /// Only emit snapshots for frames containing a key press
    #[arg(long)]
    presses_only: bool,

    /// Save calibration state to file after processing
    #[arg(long)]
    save_calibration: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay frame records into snapshots (batch mode)
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Process streaming frame records from stdin (streaming mode)
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate frame record schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a pipeline configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame record per line)
    Ndjson,
    /// JSON array of frame records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// JSON array of snapshots
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (wrist.frame.v1)
    Input,
    /// Output schema (wrist.snapshot.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
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

/// Log to stderr so stdout stays clean NDJSON
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Transform {
            input,
            output,
            input_format,
            output_format,
            pipeline,
        } => cmd_transform(&input, &output, input_format, output_format, &pipeline),

        Commands::Run { pipeline, flush } => cmd_run(&pipeline, flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    args: &PipelineArgs,
) -> Result<(), FluxCliError> {
    let input_data = read_input(input)?;

    let records = match input_format {
        InputFormat::Ndjson => FrameRecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameRecordAdapter::parse_array(&input_data)?,
    };

    if records.is_empty() {
        return Err(FluxCliError::NoRecords);
    }

    // Refuse to replay a partially valid stream
    if let Some(failure) = FrameRecordAdapter::validate_records(&records).into_iter().next() {
        return Err(FluxCliError::InvalidRecord(failure.index, failure.error));
    }

    let mut pipeline = build_pipeline(args)?;
    let encoder = SnapshotEncoder::new();
    let mut snapshots: Vec<WristSnapshot> = Vec::new();

    for record in &records {
        if let Some(snapshot) = process_record(&mut pipeline, &encoder, record, args.presses_only) {
            snapshots.push(snapshot);
        }
    }

    tracing::info!(
        records = records.len(),
        snapshots = snapshots.len(),
        stats = ?pipeline.stats(),
        "transform complete"
    );

    save_calibration(&pipeline, args.save_calibration.as_deref())?;

    let output_data = format_output(&snapshots, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(args: &PipelineArgs, flush: bool) -> Result<(), FluxCliError> {
    let mut pipeline = build_pipeline(args)?;
    let encoder = SnapshotEncoder::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(trimmed).map_err(|e| {
            FluxCliError::ParseError(format!(
                "Failed to parse frame record on line {}: {}",
                line_num + 1,
                e
            ))
        })?;

        record
            .validate()
            .map_err(|e| FluxCliError::InvalidRecord(line_num, e))?;

        if let Some(snapshot) =
            process_record(&mut pipeline, &encoder, &record, args.presses_only)
        {
            writeln!(stdout, "{}", serde_json::to_string(&snapshot)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    stdout.flush()?;
    save_calibration(&pipeline, args.save_calibration.as_deref())?;

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), FluxCliError> {
    let input_data = read_input(input)?;

    let records = match input_format {
        InputFormat::Ndjson => FrameRecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameRecordAdapter::parse_array(&input_data)?,
    };

    let results = FrameRecordAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                timestamp: r.timestamp.to_rfc3339(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} ({}): {}",
                    err.index, err.timestamp, err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(FluxCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), FluxCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "flux_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("wflux version {}", FLUX_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Input schema: {}, output schema: {}",
                FRAME_SCHEMA_VERSION, SNAPSHOT_VERSION
            ),
        },
    ];

    if let Some(config_path) = config {
        let check = if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match PipelineConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (angle window {}, stabilization {}ms, \
                             mirrored labels {})",
                            config.angle_window,
                            config.stabilization_delay_ms,
                            config.mirrored_labels
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist; defaults will be used".to_string(),
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("wflux Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), FluxCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", FRAME_SCHEMA_VERSION);
                println!();
                println!("One JSON object per video frame:");
                println!();
                println!("- timestamp: RFC 3339 capture time");
                println!("- pose: 33 landmarks {{ x, y, z, visibility }} (optional)");
                println!("- hands: [{{ label: Left|Right, landmarks: 21 x {{ x, y, z }} }}]");
                println!(
                    "  labels are raw detector output; mirroring is corrected by the pipeline"
                );
                println!("- events: applied in order after the landmarks");
                println!("  - {{ type: key_press, key? }}");
                println!("  - {{ type: session, active }}");
                println!("  - {{ type: reset_calibration }}");
                println!("  - {{ type: reset_session }}");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", SNAPSHOT_VERSION);
                println!();
                println!("- producer: {{ name, version, instance_id }}");
                println!("- timestamp, calibrated, session_active");
                println!("- angles: {{ left|right _deviation|_pronation|_extension }} in degrees,");
                println!("  null until first computed, relative to baseline once calibrated");
                println!("- finger_travel: {{ left, right }} in normalized image units");
                println!("- presses: [{{ key?, finger, score }}] (only when a key was pressed)");
                println!(
                    "- stats: {{ pose_frames, hand_frames, hands_accepted, hands_rejected, \
                     hands_superseded }}"
                );
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, FluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn build_pipeline(args: &PipelineArgs) -> Result<WristPipeline, FluxCliError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    if let Some(window) = args.angle_window {
        config.angle_window = window;
    }
    if let Some(delay) = args.stabilization_delay_ms {
        config.stabilization_delay_ms = delay;
    }
    if args.no_mirror {
        config.mirrored_labels = false;
    }

    tracing::debug!(?config, "pipeline configuration");
    Ok(WristPipeline::with_config(config)?)
}

fn process_record(
    pipeline: &mut WristPipeline,
    encoder: &SnapshotEncoder,
    record: &FrameRecord,
    presses_only: bool,
) -> Option<WristSnapshot> {
    let presses = record.apply(pipeline);
    if presses_only && presses.is_empty() {
        return None;
    }
    Some(encoder.encode(pipeline, record.timestamp, &presses))
}

fn save_calibration(pipeline: &WristPipeline, path: Option<&Path>) -> Result<(), FluxCliError> {
    if let Some(path) = path {
        let json = pipeline.calibration().to_json()?;
        fs::write(path, json)?;
    }
    Ok(())
}

fn format_output(
    snapshots: &[WristSnapshot],
    format: &OutputFormat,
) -> Result<String, FluxCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for snapshot in snapshots {
                lines.push(serde_json::to_string(snapshot)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(snapshots)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshots)?),
    }
}

fn landmark_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["x", "y", "z"],
        "properties": {
            "x": { "type": "number" },
            "y": { "type": "number" },
            "z": { "type": "number" },
            "visibility": { "type": "number" }
        }
    })
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": FRAME_SCHEMA_VERSION,
        "description": "One frame of pose and hand landmarks plus control events",
        "type": "object",
        "required": ["schema_version", "timestamp"],
        "properties": {
            "schema_version": { "type": "string", "const": FRAME_SCHEMA_VERSION },
            "timestamp": { "type": "string", "format": "date-time" },
            "pose": {
                "type": "array",
                "minItems": 33,
                "maxItems": 33,
                "items": landmark_schema()
            },
            "hands": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["label", "landmarks"],
                    "properties": {
                        "label": { "type": "string", "enum": ["Left", "Right"] },
                        "landmarks": {
                            "type": "array",
                            "minItems": 21,
                            "maxItems": 21,
                            "items": landmark_schema()
                        }
                    }
                }
            },
            "events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type"],
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["key_press", "session", "reset_calibration", "reset_session"]
                        },
                        "key": { "type": "string" },
                        "active": { "type": "boolean" }
                    }
                }
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let angle = serde_json::json!({ "type": ["number", "null"] });
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SNAPSHOT_VERSION,
        "description": "Calibrated wrist angles, finger travel and press detection",
        "type": "object",
        "required": [
            "snapshot_version", "producer", "timestamp", "calibrated",
            "session_active", "angles", "finger_travel", "stats"
        ],
        "properties": {
            "snapshot_version": { "type": "string", "const": SNAPSHOT_VERSION },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "timestamp": { "type": "string", "format": "date-time" },
            "calibrated": { "type": "boolean" },
            "session_active": { "type": "boolean" },
            "angles": {
                "type": "object",
                "properties": {
                    "left_deviation": angle,
                    "right_deviation": angle,
                    "left_pronation": angle,
                    "right_pronation": angle,
                    "left_extension": angle,
                    "right_extension": angle
                }
            },
            "finger_travel": {
                "type": "object",
                "properties": {
                    "left": { "type": "number" },
                    "right": { "type": "number" }
                }
            },
            "presses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string" },
                        "finger": { "type": "string" },
                        "score": { "type": "number" }
                    }
                }
            },
            "stats": { "type": "object" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    InvalidRecord(usize, ValidationError),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for FluxCliError {
    fn from(e: io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<FluxError> for FluxCliError {
    fn from(e: FluxError) -> Self {
        FluxCliError::Flux(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FluxCliError::Flux(FluxError::ConfigError(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'wflux doctor --config <file>' for details".to_string()),
            },
            FluxCliError::Flux(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", FRAME_SCHEMA_VERSION)),
            },
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FluxCliError::InvalidRecord(index, e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: format!("Record {}: {}", index, e),
                hint: Some("Run 'wflux validate' for details".to_string()),
            },
            FluxCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No frame records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            FluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            FluxCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
