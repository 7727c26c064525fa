//! # CEP Common Library
//!
//! Shared code for the CEP resolution workspace:
//! - Error type shared by all crates
//! - TOML configuration model and file handling
//! - Event types (`LookupEvent`) and the `EventBus`
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
