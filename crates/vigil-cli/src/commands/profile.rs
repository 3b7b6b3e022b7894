//! Profile command implementation.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_notify::ProfileResolver;

use crate::cli::ProfileCommands;
use crate::error::CliError;
use crate::fixture::Context;
use crate::output::{OutputFormat, TableDisplay};

use super::incident_list;

/// Handler for profile subcommands.
pub struct ProfileCommand<'a> {
    ctx: &'a Context,
    at: DateTime<Utc>,
}

impl<'a> ProfileCommand<'a> {
    /// Creates a new profile command handler evaluating at `at`.
    #[must_use]
    pub const fn new(ctx: &'a Context, at: DateTime<Utc>) -> Self {
        Self { ctx, at }
    }

    /// Executes the profile subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the profile is unknown or one of its filters is
    /// malformed.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &ProfileCommands,
    ) -> Result<(), CliError> {
        match command {
            ProfileCommands::List => self.list(out, format),
            ProfileCommands::Resolve { id } => self.resolve(out, format, *id),
        }
    }

    fn resolver(&self) -> Result<ProfileResolver<'a>, CliError> {
        let ctx: &'a Context = self.ctx;
        Ok(ProfileResolver::new(&ctx.store, ctx.config.schedule_engine()?))
    }

    fn list<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let resolver = self.resolver()?;
        let store = &self.ctx.store;
        let profiles = store
            .profiles()
            .into_iter()
            .map(|p| ProfileRow {
                id: p.id,
                user: p.user,
                name: p.name.clone(),
                group: p.time_recurrence_group,
                active: p.active,
                scheduled: resolver.is_scheduled(&p, self.at),
                filters: store.profile_filters(p.id).iter().map(|f| f.id).collect(),
                destinations: store.profile_destinations(p.id).iter().map(|d| d.id).collect(),
            })
            .collect();
        format.write(out, &ProfileList { profiles })
    }

    fn resolve<W: Write>(&self, out: &mut W, format: &OutputFormat, id: u64) -> Result<(), CliError> {
        let profile = self
            .ctx
            .store
            .profile(id)
            .ok_or_else(|| CliError::NotFound(format!("notification profile {id}")))?;
        let selected = self
            .resolver()?
            .resolve(&profile, self.ctx.incidents.as_ref(), self.at)?;
        let list = incident_list(self.ctx, &selected, format!("profile '{}'", profile.name), self.at);
        format.write(out, &list)
    }
}

// Output types

/// List of profiles.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileList {
    /// Profiles.
    pub profiles: Vec<ProfileRow>,
}

/// Profile summary.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    /// Profile ID.
    pub id: u64,
    /// Owner.
    pub user: u64,
    /// Name.
    pub name: String,
    /// Recurrence group ID.
    pub group: u64,
    /// Switched on.
    pub active: bool,
    /// Switched on and inside its schedule at the evaluated instant.
    pub scheduled: bool,
    /// Linked filter IDs.
    pub filters: Vec<u64>,
    /// Linked destination IDs.
    pub destinations: Vec<u64>,
}

impl TableDisplay for ProfileList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.profiles.is_empty() {
            writeln!(writer, "No notification profiles")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:>6}  {:>6}  {:<24}  {:>6}  {:<6}  {:<9}  {:>7}  {:>12}",
            "ID", "USER", "NAME", "GROUP", "ACTIVE", "SCHEDULED", "FILTERS", "DESTINATIONS"
        )?;
        writeln!(writer, "{}", "─".repeat(92))?;
        for p in &self.profiles {
            writeln!(
                writer,
                "{:>6}  {:>6}  {:<24}  {:>6}  {:<6}  {:<9}  {:>7}  {:>12}",
                p.id,
                p.user,
                p.name,
                p.group,
                if p.active { "yes" } else { "no" },
                if p.scheduled { "yes" } else { "no" },
                p.filters.len(),
                p.destinations.len()
            )?;
        }
        Ok(())
    }
}
