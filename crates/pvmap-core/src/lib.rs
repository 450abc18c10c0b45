//! PV Map Core - Domain models, configuration, and ports
//!
//! This crate contains the project records, viewport and filter models, the
//! remote search contract, and the port that fetch adapters implement.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use error::{PvMapError, Result};
