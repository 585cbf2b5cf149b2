pub mod catalog;
pub mod covenants;
pub mod replay;
pub mod thresholds;
