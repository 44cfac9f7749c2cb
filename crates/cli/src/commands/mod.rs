//! CLI command implementations

pub mod generate;
pub mod predict;
pub mod train;
