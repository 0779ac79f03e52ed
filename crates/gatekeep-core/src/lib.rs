//! Gatekeep Core
//!
//! Core domain types, traits, and error handling for Gatekeep.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the config loader, the scheduler and the CLI.

pub mod decision;
pub mod error;
pub mod event;
pub mod events;
pub mod ids;
pub mod params;
pub mod pipeline;
pub mod ports;

pub use error::{Error, Result};
pub use ids::*;
