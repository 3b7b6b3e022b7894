//! Time recurrence rules for Vigil.
//!
//! A [`TimeRecurrenceGroup`] holds one or more weekly windows
//! ([`TimeRecurrence`]) during which a notification profile may fire. The
//! [`ScheduleEngine`] decides whether a group is active at a UTC instant,
//! interpreting each window's local wall-clock times in a configured IANA
//! timezone.
//!
//! # Example
//!
//! ```rust
//! use chrono::{NaiveTime, TimeZone, Utc};
//! use vigil_schedule::{ScheduleEngine, TimeRecurrence, TimeRecurrenceGroup, Weekday};
//!
//! let night = TimeRecurrence::new(
//!     Weekday::ALL,
//!     NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
//!     NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
//! )
//! .unwrap();
//! let group = TimeRecurrenceGroup::new(1, 1, "On call").unwrap().with_recurrence(night);
//!
//! let engine = ScheduleEngine::default();
//! assert!(engine.is_active(&group, Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap()));
//! assert!(!engine.is_active(&group, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod types;

pub use chrono_tz::Tz;
pub use engine::{timestamp_is_within, ScheduleEngine};
pub use error::{Result, ScheduleError};
pub use types::{GroupId, TimeRecurrence, TimeRecurrenceGroup, Weekday};
