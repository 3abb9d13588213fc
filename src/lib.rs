//! sosfeed library
//!
//! Cached access to the SOS emergency feed plus the pure views built on it.
//! Exposed as a library for the binary and the integration tests.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod data;
pub mod geo;
pub mod refresh;
pub mod severity;
pub mod views;
