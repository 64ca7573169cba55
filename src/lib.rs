//! HDT scoring - player-type and health-literacy engine for diabetes game telemetry
//!
//! Turns GameBus activity records from the SugarVita game and the diabetes
//! trivia into a per-user score snapshot through a deterministic pipeline:
//! source adaptation → session aggregation and glucose analysis → incremental
//! merge → normalization → weighted scoring → snapshot encoding.
//!
//! ## Modules
//!
//! - **Game sessions**: playthrough and engagement logs feed player-type
//!   affinities and the game-session health-literacy score
//! - **Trivia**: quiz answers feed the trivia health-literacy score

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod glucose;
pub mod history;
pub mod merge;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod scoring;
pub mod types;

pub use config::ProcessorConfig;
pub use error::ComputeError;
pub use history::SnapshotStore;
pub use pipeline::{activity_to_snapshot, PollInput, PollOutcome, PollReport, TwinProcessor};

// Schema exports
pub use schema::{ActivityBatch, ActivityRecord, PropertyKey};

/// Version embedded in every snapshot
pub const HDT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshots
pub const PRODUCER_NAME: &str = "hdt-scoring";
