//! CLI command implementations

pub mod rewards;
pub mod simulate;
