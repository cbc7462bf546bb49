//! CLI module for macrolog - command-line interface and subcommands.
//!
//! Hosts the meal interpreter: one-shot parse and refine commands for people,
//! and an envelope handler for programs.

pub mod commands;
pub mod render;

pub use commands::Cli;
