//! Media command implementation.

use std::io::Write;

use serde::Serialize;
use vigil_notify::MediumSchema;

use crate::cli::MediaCommands;
use crate::error::CliError;
use crate::fixture::Context;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for media subcommands.
pub struct MediaCommand<'a> {
    ctx: &'a Context,
}

impl<'a> MediaCommand<'a> {
    /// Creates a new media command handler.
    #[must_use]
    pub const fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Executes the media subcommand.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown medium.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &MediaCommands,
    ) -> Result<(), CliError> {
        let registry = self.ctx.store.registry();
        match command {
            MediaCommands::List => {
                let media = registry
                    .slugs()
                    .into_iter()
                    .filter_map(|slug| registry.get(&slug))
                    .map(|m| MediumInfo {
                        slug: m.slug().to_string(),
                        name: m.name().to_string(),
                    })
                    .collect();
                format.write(out, &MediaList { media })
            }
            MediaCommands::Schema { slug } => {
                let medium = registry.require(slug)?;
                format.write(
                    out,
                    &SchemaOutput {
                        slug: slug.clone(),
                        schema: medium.json_schema(),
                    },
                )
            }
        }
    }
}

// Output types

/// Registered media.
#[derive(Debug, Clone, Serialize)]
pub struct MediaList {
    /// Media.
    pub media: Vec<MediumInfo>,
}

/// One medium.
#[derive(Debug, Clone, Serialize)]
pub struct MediumInfo {
    /// Slug.
    pub slug: String,
    /// Name.
    pub name: String,
}

/// A medium's settings schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaOutput {
    /// Medium slug.
    pub slug: String,
    /// The schema.
    #[serde(flatten)]
    pub schema: MediumSchema,
}

impl TableDisplay for MediaList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{:<10}  NAME", "SLUG")?;
        for m in &self.media {
            writeln!(writer, "{:<10}  {}", m.slug, m.name)?;
        }
        Ok(())
    }
}

impl TableDisplay for SchemaOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{} ({})", self.schema.title, self.slug)?;
        writeln!(writer, "{}", self.schema.description)?;
        writeln!(writer)?;
        for (name, property) in &self.schema.properties {
            let required = if self.schema.required.contains(name) { " (required)" } else { "" };
            writeln!(writer, "  {name:<16}{:<8}{}{required}", property.kind, property.title)?;
        }
        Ok(())
    }
}
