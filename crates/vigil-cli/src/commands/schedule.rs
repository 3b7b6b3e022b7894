//! Schedule command implementation.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::ScheduleCommands;
use crate::error::CliError;
use crate::fixture::Context;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for schedule subcommands.
pub struct ScheduleCommand<'a> {
    ctx: &'a Context,
    at: DateTime<Utc>,
}

impl<'a> ScheduleCommand<'a> {
    /// Creates a new schedule command handler evaluating at `at`.
    #[must_use]
    pub const fn new(ctx: &'a Context, at: DateTime<Utc>) -> Self {
        Self { ctx, at }
    }

    /// Executes the schedule subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the timezone or group is unknown.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &ScheduleCommands,
    ) -> Result<(), CliError> {
        match command {
            ScheduleCommands::Active { group } => self.active(out, format, *group),
        }
    }

    fn active<W: Write>(&self, out: &mut W, format: &OutputFormat, only: Option<u64>) -> Result<(), CliError> {
        let engine = self.ctx.config.schedule_engine()?;
        let groups = match only {
            Some(id) => vec![self
                .ctx
                .store
                .group(id)
                .ok_or_else(|| CliError::NotFound(format!("time recurrence group {id}")))?],
            None => self.ctx.store.groups(),
        };

        let report = ScheduleReport {
            timezone: engine.timezone().name().to_string(),
            at: self.at,
            groups: groups
                .iter()
                .map(|g| GroupActivity {
                    id: g.id,
                    user: g.user,
                    name: g.name.clone(),
                    recurrences: g.recurrences.len(),
                    active: engine.is_active(g, self.at),
                })
                .collect(),
        };
        format.write(out, &report)
    }
}

// Output types

/// Activity of recurrence groups at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    /// Timezone used to interpret recurrences.
    pub timezone: String,
    /// Evaluated instant.
    pub at: DateTime<Utc>,
    /// Groups.
    pub groups: Vec<GroupActivity>,
}

/// Activity of one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupActivity {
    /// Group ID.
    pub id: u64,
    /// Owner.
    pub user: u64,
    /// Name.
    pub name: String,
    /// Number of recurrences.
    pub recurrences: usize,
    /// Whether any recurrence covers the instant.
    pub active: bool,
}

impl TableDisplay for ScheduleReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Schedules at {} ({})", self.at.to_rfc3339(), self.timezone)?;
        writeln!(writer, "══════════════════════════════════")?;
        if self.groups.is_empty() {
            writeln!(writer, "No time recurrence groups")?;
            return Ok(());
        }

        writeln!(writer, "{:>6}  {:>6}  {:<24}  {:>11}  ACTIVE", "ID", "USER", "NAME", "RECURRENCES")?;
        for g in &self.groups {
            writeln!(
                writer,
                "{:>6}  {:>6}  {:<24}  {:>11}  {}",
                g.id,
                g.user,
                g.name,
                g.recurrences,
                if g.active { "yes" } else { "no" }
            )?;
        }
        Ok(())
    }
}
