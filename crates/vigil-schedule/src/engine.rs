//! Schedule evaluation.
//!
//! Recurrences store local wall-clock times. To decide whether a UTC instant
//! falls inside a window, [`ScheduleEngine`] shifts the window to UTC using
//! the offset of its configured timezone that is in effect at that instant,
//! then compares UTC times of day. Windows that end up with
//! `start_utc > end_utc` wrap around midnight.

use chrono::{DateTime, Datelike, NaiveTime, Offset, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::trace;

use crate::error::{Result, ScheduleError};
use crate::types::{TimeRecurrence, TimeRecurrenceGroup, Weekday};

/// Evaluates recurrence groups in a fixed timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEngine {
    tz: Tz,
}

impl ScheduleEngine {
    /// Creates an engine for the given timezone.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Creates an engine from an IANA timezone name.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidTimezone` for unknown names.
    pub fn from_name(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))?;
        Ok(Self::new(tz))
    }

    /// Returns the configured timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns true if any recurrence of `group` covers `instant`.
    ///
    /// A group without recurrences is never active.
    #[must_use]
    pub fn is_active(&self, group: &TimeRecurrenceGroup, instant: DateTime<Utc>) -> bool {
        let active = group
            .recurrences
            .iter()
            .any(|rec| self.recurrence_is_active(rec, instant));
        trace!(group = group.id, %instant, active, "schedule evaluated");
        active
    }

    /// Returns true if a single recurrence covers `instant`.
    #[must_use]
    pub fn recurrence_is_active(&self, recurrence: &TimeRecurrence, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.tz);
        let offset = TimeDelta::seconds(i64::from(local.offset().fix().local_minus_utc()));

        let start_utc = recurrence.start - offset;
        let end_utc = recurrence.end - offset;
        if !timestamp_is_within(instant.time(), start_utc, end_utc) {
            return false;
        }

        let day = recurrence.anchor_day(Weekday::from(local.weekday()), local.time());
        recurrence.days.contains(&day)
    }

    /// Returns the groups active at `instant`.
    pub fn active_groups<'a, I>(&self, groups: I, instant: DateTime<Utc>) -> Vec<&'a TimeRecurrenceGroup>
    where
        I: IntoIterator<Item = &'a TimeRecurrenceGroup>,
    {
        groups
            .into_iter()
            .filter(|group| self.is_active(group, instant))
            .collect()
    }
}

impl Default for ScheduleEngine {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

/// Returns true if `t` lies in `[start, end]`, wrapping past midnight when
/// `start > end`.
#[must_use]
pub fn timestamp_is_within(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= t && t <= end
    } else {
        t >= start || t <= end
    }
}
