//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use vigil_incident::{EndTime, Incident};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Incident row for listing.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentRow {
    /// Incident ID.
    pub id: u64,
    /// Source system ID.
    pub source: u64,
    /// Severity level.
    pub level: u8,
    /// open, closed or stateless.
    pub state: String,
    /// Whether the incident is acknowledged at the evaluated instant.
    pub acked: bool,
    /// Tags as `key=value`.
    pub tags: Vec<String>,
    /// Description.
    pub description: String,
}

impl IncidentRow {
    /// Builds a row for `incident` as of `acked`.
    #[must_use]
    pub fn new(incident: &Incident, acked: bool) -> Self {
        let state = match incident.end_time {
            Some(EndTime::Infinity) => "open",
            Some(EndTime::At(_)) => "closed",
            None => "stateless",
        };
        Self {
            id: incident.id,
            source: incident.source,
            level: incident.level,
            state: state.to_string(),
            acked,
            tags: incident.tags.iter().map(ToString::to_string).collect(),
            description: incident.description.clone(),
        }
    }
}

/// Incidents selected by a filter or profile.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentList {
    /// What selected the incidents.
    pub selector: String,
    /// Selected incidents.
    pub incidents: Vec<IncidentRow>,
}

impl TableDisplay for IncidentList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.incidents.is_empty() {
            writeln!(writer, "No incidents match {}", self.selector)?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:>6}  {:>6}  {:>5}  {:<9}  {:<5}  {:<30}  DESCRIPTION",
            "ID", "SOURCE", "LEVEL", "STATE", "ACKED", "TAGS"
        )?;
        writeln!(writer, "{}", "─".repeat(90))?;

        for row in &self.incidents {
            writeln!(
                writer,
                "{:>6}  {:>6}  {:>5}  {:<9}  {:<5}  {:<30}  {}",
                row.id,
                row.source,
                row.level,
                row.state,
                if row.acked { "yes" } else { "no" },
                truncate(&row.tags.join(","), 30),
                row.description
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} incident(s) match {}", self.incidents.len(), self.selector)?;
        Ok(())
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use vigil_incident::Tag;

    fn list() -> IncidentList {
        let incident = Incident::builder(1, Utc::now())
            .level(2)
            .description("disk full")
            .tag(Arc::new(Tag::parse("env=prod").unwrap()))
            .build(4)
            .unwrap();
        IncidentList {
            selector: "filter 'Prod'".into(),
            incidents: vec![IncidentRow::new(&incident, false)],
        }
    }

    #[test]
    fn incident_table() {
        let out = OutputFormat::default().to_string(&list()).unwrap();
        assert!(out.contains("disk full"));
        assert!(out.contains("env=prod"));
        assert!(out.contains("Total: 1 incident(s) match filter 'Prod'"));
    }

    #[test]
    fn incident_json() {
        let out = OutputFormat::new(Format::Json).to_string(&list()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["incidents"][0]["id"], 4);
        assert_eq!(value["incidents"][0]["state"], "open");
    }

    #[test]
    fn empty_list() {
        let empty = IncidentList {
            selector: "profile 'p'".into(),
            incidents: vec![],
        };
        let out = OutputFormat::default().to_string(&empty).unwrap();
        assert_eq!(out, "No incidents match profile 'p'\n");
    }

    #[test]
    fn truncate_long() {
        assert_eq!(truncate("abcdefgh", 6), "abc...");
        assert_eq!(truncate("abc", 6), "abc");
    }
}
