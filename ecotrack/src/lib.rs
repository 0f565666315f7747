//! EcoTrack command line
//!
//! Wires configuration, the factor table and storage into an
//! [`footprint_ledger::EntryService`] and runs one command against it.

pub mod cli;
pub mod config;

pub use cli::{execute_command, ActivityCommand, Command};
pub use config::Args;
