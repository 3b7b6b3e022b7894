//! Dispatch command implementation.
//!
//! Sends an event for a fixture incident through the regular dispatcher.
//! Whether mail actually leaves the machine depends on the configured
//! backend and `send_notifications`.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_incident::Event;
use vigil_notify::DispatchReport;

use crate::cli::DispatchArgs;
use crate::error::CliError;
use crate::fixture::Context;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the dispatch command.
pub struct DispatchCommand<'a> {
    ctx: &'a Context,
    at: DateTime<Utc>,
}

impl<'a> DispatchCommand<'a> {
    /// Creates a new dispatch command handler evaluating at `at`.
    #[must_use]
    pub const fn new(ctx: &'a Context, at: DateTime<Utc>) -> Self {
        Self { ctx, at }
    }

    /// Dispatches the event and prints the report.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Command` if every attempted medium failed.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &DispatchArgs,
    ) -> Result<(), CliError> {
        let event = Event::new(args.incident, args.event, self.at).with_description(args.description.clone());
        let summary = event.to_string();

        let dispatcher = Arc::clone(&self.ctx.dispatcher);
        let at = self.at;
        let report = tokio::task::spawn_blocking(move || dispatcher.dispatch_at(&event, at))
            .await
            .map_err(|e| CliError::Command(format!("dispatch task failed: {e}")))?;

        let success = report.success();
        format.write(out, &DispatchOutput { event: summary, report })?;
        if success {
            Ok(())
        } else {
            Err(CliError::Command("delivery failed for every medium".to_string()))
        }
    }
}

// Output types

/// Dispatch result for display.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutput {
    /// The event, as shown in notifications.
    pub event: String,
    /// The dispatcher's report.
    #[serde(flatten)]
    pub report: DispatchReport,
}

fn join_ids(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl TableDisplay for DispatchOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.event)?;
        writeln!(writer, "══════════════════════════════════")?;
        if let Some(reason) = self.report.skipped {
            writeln!(writer, "Skipped:        {reason:?}")?;
            return Ok(());
        }

        writeln!(writer, "Profiles:       {}", join_ids(&self.report.profiles))?;
        writeln!(writer, "Destinations:   {}", join_ids(&self.report.destinations))?;
        writeln!(writer)?;
        if self.report.media.is_empty() {
            writeln!(writer, "Media:          none attempted")?;
        } else {
            writeln!(writer, "Media")?;
            for (slug, ok) in &self.report.media {
                writeln!(writer, "  {:<14}{}", slug, if *ok { "sent" } else { "failed" })?;
            }
        }
        writeln!(writer)?;
        writeln!(
            writer,
            "Result:         {}",
            if self.report.success() { "success" } else { "failure" }
        )?;
        Ok(())
    }
}
