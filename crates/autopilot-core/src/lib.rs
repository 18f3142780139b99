pub mod config;
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod rebalance;
pub mod risk;
pub mod schedule;
pub mod signals;
pub mod types;

pub use error::{AutopilotError, Result};
