//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing and subcommand handlers.

mod args;
mod commands;

pub use args::{Args, Command, ConfigAction, ScanOptions, Strategy};
pub use commands::{
    build_decoder, handle_config_action, list_cameras, print_result, result_details, run_decode,
    run_scan, CommandError, ScanSettings,
};
