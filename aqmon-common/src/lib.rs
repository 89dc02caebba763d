//! Domain types shared by the air-quality monitoring workspace.

mod types;

pub use types::{Color, Position, QualityLevel, StationRecord, UNKNOWN_REGION};
