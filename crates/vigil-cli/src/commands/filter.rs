//! Filter command implementation.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_filter::{FilterEngine, FilterSpecification};
use vigil_notify::NotifyError;

use crate::cli::FilterCommands;
use crate::error::CliError;
use crate::fixture::Context;
use crate::output::{OutputFormat, TableDisplay};

use super::incident_list;

/// Handler for filter subcommands.
pub struct FilterCommand<'a> {
    ctx: &'a Context,
    at: DateTime<Utc>,
}

impl<'a> FilterCommand<'a> {
    /// Creates a new filter command handler evaluating at `at`.
    #[must_use]
    pub const fn new(ctx: &'a Context, at: DateTime<Utc>) -> Self {
        Self { ctx, at }
    }

    /// Executes the filter subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the filter is unknown or malformed.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &FilterCommands,
    ) -> Result<(), CliError> {
        match command {
            FilterCommands::List => self.list(out, format),
            FilterCommands::Match { id } => self.matching(out, format, *id),
            FilterCommands::Eval { spec } => self.eval(out, format, spec),
        }
    }

    fn list<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let filters = self
            .ctx
            .store
            .filters()
            .into_iter()
            .map(|f| FilterRow {
                id: f.id,
                user: f.user,
                name: f.name,
                specification: serde_json::to_string(&f.filter).unwrap_or_default(),
            })
            .collect();
        format.write(out, &FilterList { filters })
    }

    fn matching<W: Write>(&self, out: &mut W, format: &OutputFormat, id: u64) -> Result<(), CliError> {
        let filter = self
            .ctx
            .store
            .filter(id)
            .ok_or_else(|| CliError::NotFound(format!("filter {id}")))?;
        let selected = FilterEngine::matching(&filter.filter, self.ctx.incidents.as_ref(), self.at)
            .map_err(NotifyError::from)?;
        let list = incident_list(self.ctx, &selected, format!("filter '{}'", filter.name), self.at);
        format.write(out, &list)
    }

    fn eval<W: Write>(&self, out: &mut W, format: &OutputFormat, raw: &str) -> Result<(), CliError> {
        let spec = FilterSpecification::parse_json(raw).map_err(NotifyError::from)?;
        let selected = FilterEngine::matching(&spec, self.ctx.incidents.as_ref(), self.at)
            .map_err(NotifyError::from)?;
        let list = incident_list(self.ctx, &selected, "the specification".to_string(), self.at);
        format.write(out, &list)
    }
}

// Output types

/// List of filters.
#[derive(Debug, Clone, Serialize)]
pub struct FilterList {
    /// Filters.
    pub filters: Vec<FilterRow>,
}

/// Filter summary.
#[derive(Debug, Clone, Serialize)]
pub struct FilterRow {
    /// Filter ID.
    pub id: u64,
    /// Owner.
    pub user: u64,
    /// Name.
    pub name: String,
    /// Specification as compact JSON.
    pub specification: String,
}

impl TableDisplay for FilterList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.filters.is_empty() {
            writeln!(writer, "No filters")?;
            return Ok(());
        }

        writeln!(writer, "{:>6}  {:>6}  {:<24}  SPECIFICATION", "ID", "USER", "NAME")?;
        writeln!(writer, "{}", "─".repeat(80))?;
        for f in &self.filters {
            writeln!(writer, "{:>6}  {:>6}  {:<24}  {}", f.id, f.user, f.name, f.specification)?;
        }
        Ok(())
    }
}
