//! Weekdays, recurrences and recurrence groups.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use vigil_incident::UserId;

use crate::error::{Result, ScheduleError};

/// Identifier of a time recurrence group.
pub type GroupId = u64;

/// ISO weekday, Monday = 1 through Sunday = 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Weekday {
    /// Monday (1).
    Monday,
    /// Tuesday (2).
    Tuesday,
    /// Wednesday (3).
    Wednesday,
    /// Thursday (4).
    Thursday,
    /// Friday (5).
    Friday,
    /// Saturday (6).
    Saturday,
    /// Sunday (7).
    Sunday,
}

impl Weekday {
    /// Every day of the week, Monday first.
    pub const ALL: [Self; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Parses an ISO day number.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidRecurrence` outside 1–7.
    pub fn from_iso(day: u8) -> Result<Self> {
        match day {
            1..=7 => Ok(Self::ALL[usize::from(day - 1)]),
            _ => Err(ScheduleError::InvalidRecurrence {
                reason: format!("weekday {day} is outside 1-7"),
            }),
        }
    }

    /// Returns the ISO day number.
    #[must_use]
    pub const fn iso(self) -> u8 {
        self as u8 + 1
    }

    /// Returns the day before.
    #[must_use]
    pub const fn previous(self) -> Self {
        match self {
            Self::Monday => Self::Sunday,
            Self::Tuesday => Self::Monday,
            Self::Wednesday => Self::Tuesday,
            Self::Thursday => Self::Wednesday,
            Self::Friday => Self::Thursday,
            Self::Saturday => Self::Friday,
            Self::Sunday => Self::Saturday,
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_monday() as usize]
    }
}

impl TryFrom<u8> for Weekday {
    type Error = ScheduleError;

    fn try_from(day: u8) -> Result<Self> {
        Self::from_iso(day)
    }
}

impl From<Weekday> for u8 {
    fn from(day: Weekday) -> Self {
        day.iso()
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        };
        f.write_str(name)
    }
}

/// The last representable instant of a day.
fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or_else(|| unreachable!())
}

/// A daily time window on a set of weekdays.
///
/// `start` and `end` are local wall-clock times. A window with
/// `start > end` runs overnight and ends on the following day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecurrence {
    /// Days the window opens on.
    pub days: BTreeSet<Weekday>,
    /// Local start of the window.
    pub start: NaiveTime,
    /// Local end of the window, inclusive.
    pub end: NaiveTime,
}

impl TimeRecurrence {
    /// Creates a recurrence.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidRecurrence` if `days` is empty.
    pub fn new(
        days: impl IntoIterator<Item = Weekday>,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Self> {
        let days: BTreeSet<_> = days.into_iter().collect();
        if days.is_empty() {
            return Err(ScheduleError::InvalidRecurrence {
                reason: "a recurrence needs at least one day".to_string(),
            });
        }
        Ok(Self { days, start, end })
    }

    /// Every day, all day.
    #[must_use]
    pub fn all_week() -> Self {
        Self {
            days: Weekday::ALL.into_iter().collect(),
            start: NaiveTime::MIN,
            end: end_of_day(),
        }
    }

    /// Returns true if the window runs past local midnight.
    #[must_use]
    pub fn is_overnight(&self) -> bool {
        self.start > self.end
    }

    /// Returns the weekday a local moment counts against.
    ///
    /// The part of an overnight window after midnight belongs to the day the
    /// window opened on.
    #[must_use]
    pub fn anchor_day(&self, day: Weekday, local: NaiveTime) -> Weekday {
        if self.is_overnight() && local <= self.end {
            day.previous()
        } else {
            day
        }
    }
}

/// A named, user-owned set of recurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecurrenceGroup {
    /// Unique identifier.
    pub id: GroupId,
    /// Owner.
    pub user: UserId,
    /// Name, unique per user.
    pub name: String,
    /// The windows. An empty group is never active.
    #[serde(default)]
    pub recurrences: Vec<TimeRecurrence>,
}

impl TimeRecurrenceGroup {
    /// Maximum allowed length for group names.
    pub const MAX_NAME_LENGTH: usize = 40;

    /// Creates an empty group.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidRecurrence` for an empty or overlong
    /// name.
    pub fn new(id: GroupId, user: UserId, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScheduleError::InvalidRecurrence {
                reason: "group name cannot be empty".to_string(),
            });
        }
        if name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(ScheduleError::InvalidRecurrence {
                reason: format!(
                    "group name cannot exceed {} characters",
                    Self::MAX_NAME_LENGTH
                ),
            });
        }
        Ok(Self {
            id,
            user,
            name,
            recurrences: Vec::new(),
        })
    }

    /// Adds a recurrence.
    #[must_use]
    pub fn with_recurrence(mut self, recurrence: TimeRecurrence) -> Self {
        self.recurrences.push(recurrence);
        self
    }

    /// Returns true if the group has no recurrences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recurrences.is_empty()
    }
}

impl fmt::Display for TimeRecurrenceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
