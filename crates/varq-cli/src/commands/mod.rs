//! CLI command implementations.

pub mod common;
pub mod maxcut;
pub mod partition;
pub mod problem;
pub mod run;
pub mod version;
