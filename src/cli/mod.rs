//! CLI module for the ec2drift tool.
//!
//! This module provides the command-line interface for running drift
//! detection and inspecting configuration.

mod commands;
mod output;

pub use commands::{Cli, Commands, DetectArgs, OutputFormat};
pub use output::OutputFormatter;
