//! Text encoders.
//!
//! The store treats the encoder as a black box mapping text to vectors of a
//! fixed dimension. Providers live under [`providers`].

pub mod provider;
pub mod providers;

pub use provider::{create_encoder, Encoder};
