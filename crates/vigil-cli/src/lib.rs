//! # vigil-cli
//!
//! Vigil command-line interface.
//!
//! Provides commands for:
//! - Listing filters and showing the incidents they select
//! - Checking which time recurrence groups are active
//! - Resolving notification profiles
//! - Dispatching incident events to matching destinations
//!
//! # Architecture
//!
//! The CLI loads a JSON configuration and a JSON fixture into the
//! in-memory stores, then runs one command against them.
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────────────────────┐
//! │  config  │──►│          │   │ vigil-filter / vigil-notify │
//! ├──────────┤   │ Context  │──►│  resolver, dispatcher       │
//! │ fixture  │──►│          │   │                             │
//! └──────────┘   └──────────┘   └─────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod fixture;
pub mod output;

pub use cli::{Cli, Commands, DispatchArgs, Format, FilterCommands, ProfileCommands};
pub use error::CliError;
pub use fixture::{Context, Fixture};
pub use output::OutputFormat;
