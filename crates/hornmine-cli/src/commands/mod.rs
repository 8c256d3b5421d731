//! CLI command implementations

pub mod completions;
pub mod config;
pub mod explore;
pub mod io;
pub mod mine;
