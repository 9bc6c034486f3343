//! Command-line interface handlers

mod commands;

pub use commands::*;
