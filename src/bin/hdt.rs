//! HDT CLI - Command-line interface for HDT scoring
//!
//! Commands:
//! - score: Score a user's new activity batches and append the snapshot
//! - latest: Print a user's latest snapshot
//! - history: Print every snapshot of a user
//! - validate: Decode an activity batch and report missing fields

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use hdt_scoring::adapters::{
    EngagementAdapter, MissingField, PlaythroughAdapter, SourceAdapter, TriviaAdapter,
};
use hdt_scoring::types::DataSource;
use hdt_scoring::{
    ActivityBatch, ComputeError, PollInput, PollOutcome, ProcessorConfig, SnapshotStore,
    TwinProcessor, HDT_VERSION, PRODUCER_NAME,
};

/// HDT - player-type and health-literacy scoring for diabetes game telemetry
#[derive(Parser)]
#[command(name = "hdt")]
#[command(version = HDT_VERSION)]
#[command(about = "Score game and trivia telemetry into health digital twin snapshots", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score new activity records for a user and append the snapshot
    Score {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Snapshot store file
        #[arg(long, env = "HDT_STORE", default_value = "hdt-store.json")]
        store: PathBuf,

        /// Playthrough batch (JSON record array, - for stdin)
        #[arg(long)]
        playthrough: Option<PathBuf>,

        /// Engagement log batch (JSON record array, - for stdin)
        #[arg(long)]
        engagement: Option<PathBuf>,

        /// Trivia answer batch (JSON record array, - for stdin)
        #[arg(long)]
        trivia: Option<PathBuf>,

        /// Processor config file (JSON)
        #[arg(long, env = "HDT_CONFIG")]
        config: Option<PathBuf>,

        /// Health domain name; overrides the config file
        #[arg(long, env = "HDT_DOMAIN")]
        domain: Option<String>,

        /// Player number read from engagement logs; overrides the config file
        #[arg(long, env = "HDT_PLAYER_NR")]
        player_nr: Option<u32>,
    },

    /// Print a user's latest snapshot
    Latest {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Snapshot store file
        #[arg(long, env = "HDT_STORE", default_value = "hdt-store.json")]
        store: PathBuf,
    },

    /// Print every snapshot of a user, oldest first
    History {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Snapshot store file
        #[arg(long, env = "HDT_STORE", default_value = "hdt-store.json")]
        store: PathBuf,
    },

    /// Decode an activity batch and report fields that could not be read
    Validate {
        /// Data source of the batch
        #[arg(value_enum)]
        source: SourceArg,

        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Player number read from engagement logs
        #[arg(long, env = "HDT_PLAYER_NR", default_value = "1")]
        player_nr: u32,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    /// SugarVita playthrough summaries
    Playthrough,
    /// SugarVita engagement logs
    Engagement,
    /// Diabetes trivia answers
    Trivia,
}

impl From<SourceArg> for DataSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Playthrough => DataSource::Playthrough,
            SourceArg::Engagement => DataSource::Engagement,
            SourceArg::Trivia => DataSource::Trivia,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

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

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "hdt_scoring=info,hdt=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    }
}

fn run(cli: Cli) -> Result<(), HdtCliError> {
    match cli.command {
        Commands::Score {
            user,
            store,
            playthrough,
            engagement,
            trivia,
            config,
            domain,
            player_nr,
        } => {
            let mut processor_config = match config {
                Some(path) => ProcessorConfig::load(&path)?,
                None => ProcessorConfig::default(),
            };
            if let Some(domain) = domain {
                processor_config.domain_name = domain;
            }
            if let Some(player_nr) = player_nr {
                processor_config.player_nr = player_nr;
            }
            let batches = BatchPaths {
                playthrough: playthrough.as_deref(),
                engagement: engagement.as_deref(),
                trivia: trivia.as_deref(),
            };
            cmd_score(&user, &store, batches, processor_config)
        }
        Commands::Latest { user, store } => cmd_latest(&user, &store),
        Commands::History { user, store } => cmd_history(&user, &store),
        Commands::Validate {
            source,
            input,
            player_nr,
            json,
        } => cmd_validate(source.into(), &input, player_nr, json),
    }
}

struct BatchPaths<'a> {
    playthrough: Option<&'a Path>,
    engagement: Option<&'a Path>,
    trivia: Option<&'a Path>,
}

fn cmd_score(
    user: &str,
    store_path: &Path,
    batches: BatchPaths<'_>,
    config: ProcessorConfig,
) -> Result<(), HdtCliError> {
    let mut store = SnapshotStore::load(store_path)?;
    info!(
        producer = PRODUCER_NAME,
        version = HDT_VERSION,
        user,
        store = %store_path.display(),
        "scoring user"
    );

    let mut processor = match store.latest(user) {
        Some(latest) => TwinProcessor::resume(config, latest),
        None => TwinProcessor::new(config),
    };

    let input = PollInput::from_json(
        &read_batch(batches.playthrough)?,
        &read_batch(batches.engagement)?,
        &read_batch(batches.trivia)?,
    )?;

    match processor.poll(&input)? {
        PollOutcome::NoNewData => {
            info!(user, "no new data for user");
            print_json(&serde_json::json!({ "user": user, "status": "no_new_data" }))?;
        }
        PollOutcome::Scored(report) => {
            if !report.missing.is_empty() {
                info!(
                    user,
                    missing_fields = report.missing.len(),
                    undecodable = report.missing.undecodable().count(),
                    "some fields fell back to missing"
                );
            }
            store.append(user, report.snapshot.clone());
            store.save(store_path)?;
            print_json(&report.snapshot)?;
        }
    }
    Ok(())
}

fn cmd_latest(user: &str, store_path: &Path) -> Result<(), HdtCliError> {
    let store = SnapshotStore::load(store_path)?;
    match store.latest(user) {
        Some(snapshot) => print_json(snapshot),
        None => Err(HdtCliError::NoData(user.to_string())),
    }
}

fn cmd_history(user: &str, store_path: &Path) -> Result<(), HdtCliError> {
    let store = SnapshotStore::load(store_path)?;
    print_json(&store.history(user))
}

fn cmd_validate(
    source: DataSource,
    input: &Path,
    player_nr: u32,
    json: bool,
) -> Result<(), HdtCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = ActivityBatch::parse(&input_data, source)?;
    let missing = match source {
        DataSource::Playthrough => PlaythroughAdapter.extract(&records, 0).report,
        DataSource::Engagement => EngagementAdapter::new(player_nr).extract(&records, 0).report,
        DataSource::Trivia => TriviaAdapter.extract(&records, 0).report,
    };

    let report = ValidationReport {
        source: source.as_str(),
        total_records: records.len(),
        missing_fields: missing.len(),
        undecodable_fields: missing.undecodable().count(),
        latest_record: ActivityBatch::latest(&records, 0).map(|latest| latest.id),
        entries: missing.entries().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", report.source);
        println!("=================");
        println!("Total records:      {}", report.total_records);
        println!("Missing fields:     {}", report.missing_fields);
        println!("Undecodable fields: {}", report.undecodable_fields);

        if !report.entries.is_empty() {
            println!("\nFields:");
            for entry in &report.entries {
                println!(
                    "  - Record {}: {} ({:?})",
                    entry.record_id,
                    entry.field.as_str(),
                    entry.reason
                );
            }
        }
    }

    if report.undecodable_fields > 0 {
        Err(HdtCliError::ValidationFailed(report.undecodable_fields))
    } else {
        Ok(())
    }
}

/// Read a batch file; no path means an empty batch
fn read_batch(path: Option<&Path>) -> Result<String, HdtCliError> {
    match path {
        None => Ok(String::new()),
        Some(path) if path.to_string_lossy() == "-" => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        Some(path) => Ok(fs::read_to_string(path)?),
    }
}

/// Pretty JSON on a terminal, compact JSON when piped
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), HdtCliError> {
    let output = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

// Error types

#[derive(Debug)]
enum HdtCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoData(String),
    ValidationFailed(usize),
}

impl From<io::Error> for HdtCliError {
    fn from(e: io::Error) -> Self {
        HdtCliError::Io(e)
    }
}

impl From<ComputeError> for HdtCliError {
    fn from(e: ComputeError) -> Self {
        HdtCliError::Compute(e)
    }
}

impl From<serde_json::Error> for HdtCliError {
    fn from(e: serde_json::Error) -> Self {
        HdtCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HdtCliError> for CliError {
    fn from(e: HdtCliError) -> Self {
        match e {
            HdtCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HdtCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::MalformedBatch { .. } | ComputeError::JsonError(_) => (
                        "MALFORMED_BATCH",
                        "Ensure each batch is a JSON array of GameBus activity records",
                    ),
                    ComputeError::UnknownMetric { .. } | ComputeError::MissingMetric { .. } => (
                        "CONFIGURATION_ERROR",
                        "The stored overviews do not match this version's metric keys",
                    ),
                    ComputeError::StorageError(_) => (
                        "STORAGE_ERROR",
                        "Check the snapshot store file; it is never overwritten when unreadable",
                    ),
                    ComputeError::EncodingError(_) => {
                        ("ENCODING_ERROR", "A score was not a finite number")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            HdtCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HdtCliError::NoData(user) => CliError {
                code: "NO_DATA".to_string(),
                message: format!("No data yet for user {user}"),
                hint: Some("Run 'hdt score' for this user first".to_string()),
            },
            HdtCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} fields could not be decoded"),
                hint: Some("Fix the listed fields and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    source: &'static str,
    total_records: usize,
    missing_fields: usize,
    undecodable_fields: usize,
    latest_record: Option<u64>,
    entries: Vec<MissingField>,
}
