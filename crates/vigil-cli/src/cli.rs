//! Command-line argument parsing with clap.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use vigil_incident::{EventType, IncidentId};

/// Vigil - incident filters, schedules and notifications.
#[derive(Parser, Debug, Clone)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Notification configuration file (JSON).
    #[arg(short, long, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fixture with incidents, users, filters, schedules and profiles (JSON).
    #[arg(long, env = "VIGIL_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// IANA timezone of recurrence windows, overriding the configuration.
    #[arg(long, env = "VIGIL_TIMEZONE")]
    pub timezone: Option<String>,

    /// Whether to actually send notifications, overriding the configuration.
    #[arg(long, env = "VIGIL_SEND_NOTIFICATIONS")]
    pub send_notifications: Option<bool>,

    /// Evaluate at this instant (RFC 3339) instead of now.
    #[arg(long, global = true)]
    pub at: Option<DateTime<Utc>>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Filter commands.
    Filter {
        /// Filter subcommand to execute.
        #[command(subcommand)]
        command: FilterCommands,
    },

    /// Time recurrence commands.
    Schedule {
        /// Schedule subcommand to execute.
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Notification profile commands.
    Profile {
        /// Profile subcommand to execute.
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Dispatch an incident event to matching profiles.
    Dispatch(DispatchArgs),

    /// Delivery media commands.
    Media {
        /// Media subcommand to execute.
        #[command(subcommand)]
        command: MediaCommands,
    },
}

/// Filter subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FilterCommands {
    /// List stored filters.
    List,

    /// Show the incidents a stored filter selects.
    Match {
        /// Filter ID.
        id: u64,
    },

    /// Show the incidents an ad-hoc specification selects.
    Eval {
        /// Filter specification as JSON.
        spec: String,
    },
}

/// Schedule subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ScheduleCommands {
    /// Show which recurrence groups are active.
    Active {
        /// Only this group.
        #[arg(long)]
        group: Option<u64>,
    },
}

/// Profile subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommands {
    /// List profiles.
    List,

    /// Show the incidents a profile selects.
    Resolve {
        /// Profile ID.
        id: u64,
    },
}

/// Media subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum MediaCommands {
    /// List registered media.
    List,

    /// Print a medium's settings schema.
    Schema {
        /// Medium slug.
        slug: String,
    },
}

/// Arguments for the dispatch command.
#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Incident ID.
    pub incident: IncidentId,

    /// Event type code (STA, END, CHI, STL, ACK, REO, OTH).
    #[arg(short, long, default_value = "STA")]
    pub event: EventType,

    /// Event description.
    #[arg(short, long, default_value = "")]
    pub description: String,
}
