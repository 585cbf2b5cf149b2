pub mod actions;
pub mod confidence;
pub mod covenant;
pub mod decision;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod precedent;
pub mod replay;
pub mod severity;
pub mod thresholds;
pub mod types;

pub use error::{Result, SentinelError};
