//! Incident, tag and event model for Vigil.
//!
//! `vigil-incident` holds the entities the notification engine consumes:
//! incidents reported by source systems, the tags attached to them, the
//! lifecycle events that trigger notifications, and a queryable store.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use vigil_incident::{InMemoryIncidentStore, Incident, IncidentStore, SourceSystem, Tag};
//!
//! let store = InMemoryIncidentStore::new();
//! store.add_source(SourceSystem::new(1, "nav", true));
//!
//! let incident = store
//!     .insert(
//!         Incident::builder(1, Utc::now())
//!             .level(2)
//!             .tag(Arc::new(Tag::parse("environment=prod").unwrap())),
//!     )
//!     .unwrap();
//!
//! assert!(incident.is_open());
//! assert!(store.with_max_level(2).contains(incident.id));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod store;
pub mod tag;
pub mod types;

pub use error::{IncidentError, Result};
pub use event::{Event, EventType};
pub use store::{InMemoryIncidentStore, IncidentSet, IncidentStore};
pub use tag::{group_by_key, Tag, TagRegistry, TAG_DELIMITER};
pub use types::{
    validate_level, Acknowledgement, EndTime, Incident, IncidentBuilder, IncidentId,
    IncidentPredicate, SourceSystem, SourceSystemId, UserId, MAX_LEVEL, MIN_LEVEL,
};
