//! Command handlers for the datalens CLI.
//!
//! Every command receives the store opened by `main`; none opens its own.

pub mod ingest;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
