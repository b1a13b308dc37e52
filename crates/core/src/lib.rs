//! Datalens Core Library
//!
//! This crate provides the foundational utilities shared by the store and CLI:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (`AppConfig`, `EncoderConfig`)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, EncoderConfig};
pub use error::{AppError, AppResult};
