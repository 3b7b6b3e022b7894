//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`filter`] - Filter listing and matching
//! - [`schedule`] - Recurrence group activity
//! - [`profile`] - Profile listing and resolution
//! - [`dispatch`] - Event dispatch
//! - [`media`] - Delivery media

pub mod dispatch;
pub mod filter;
pub mod media;
pub mod profile;
pub mod schedule;

pub use dispatch::DispatchCommand;
pub use filter::FilterCommand;
pub use media::MediaCommand;
pub use profile::ProfileCommand;
pub use schedule::ScheduleCommand;

use chrono::{DateTime, Utc};
use vigil_incident::{IncidentSet, IncidentStore};

use crate::fixture::Context;
use crate::output::{IncidentList, IncidentRow};

/// Builds the listing of `selected` incidents.
pub(crate) fn incident_list(
    ctx: &Context,
    selected: &IncidentSet,
    selector: String,
    at: DateTime<Utc>,
) -> IncidentList {
    let incidents = selected
        .iter()
        .filter_map(|id| ctx.incidents.get(id))
        .map(|incident| IncidentRow::new(&incident, incident.is_acked_at(at)))
        .collect();
    IncidentList {
        selector,
        incidents,
    }
}
