//! Common utilities for the venue-route toolkit

pub mod error;

pub use error::{suggest_name, Error, Result};
