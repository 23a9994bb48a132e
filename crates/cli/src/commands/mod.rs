//! CLI command implementations

pub mod describe;
pub mod recommendations;
pub mod savings;
