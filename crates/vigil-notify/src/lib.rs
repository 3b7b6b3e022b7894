//! Notification profiles and delivery for Vigil.
//!
//! This crate connects incidents to people:
//!
//! - **Profiles**: a [`NotificationProfile`] combines a user's filters, a
//!   recurrence group deciding when it may fire, and the destinations to
//!   notify
//! - **Media**: each destination uses a [`Medium`] such as email or SMS,
//!   looked up by slug in a [`MediumRegistry`]
//! - **Dispatch**: the [`Dispatcher`] resolves the profiles that want an
//!   event and sends it to their destinations, one thread per medium
//! - **Lifecycle**: [`IncidentLifecycle`] records incident transitions and
//!   dispatches their events in the background
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use serde_json::json;
//! use vigil_filter::FilterSpecification;
//! use vigil_incident::{Event, EventType, Incident};
//! use vigil_notify::{
//!     Dispatcher, LogTransport, MediumRegistry, NewProfile, NotificationStore, NotifyConfig, User,
//! };
//! use vigil_schedule::TimeRecurrence;
//!
//! let config = NotifyConfig::default().with_send_notifications(true);
//! let registry = MediumRegistry::with_transport(&config, Arc::new(LogTransport));
//! let store = Arc::new(NotificationStore::new(Arc::new(registry)));
//! store.add_user(User::new(1, "ola"));
//!
//! let group = store.create_group(1, "Always", vec![TimeRecurrence::all_week()]).unwrap();
//! let filter = store.create_filter(1, "Open", FilterSpecification::new().open(true)).unwrap();
//! let email = store
//!     .create_destination(1, "email", json!({"email_address": "ops@example.com"}))
//!     .unwrap();
//! store
//!     .add_profile(
//!         NewProfile::new(1, "On call", group.id)
//!             .with_filters([filter.id])
//!             .with_destinations([email.id]),
//!     )
//!     .unwrap();
//!
//! let incidents = vec![Incident::builder(1, Utc::now()).build(1).unwrap()];
//! let dispatcher = Dispatcher::new(config, store, Arc::new(incidents)).unwrap();
//! let report = dispatcher.dispatch(&Event::new(1, EventType::IncidentStart, Utc::now()));
//! assert_eq!(report.destinations, vec![email.id]);
//! assert!(report.success());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod destination;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod media;
pub mod profile;
pub mod resolver;
pub mod store;

pub use config::{EmailConfig, MailBackend, NotifyConfig, SmsConfig, SmtpSecurity};
pub use destination::{Destination, DestinationId, User};
pub use dispatcher::{DispatchReport, Dispatcher, SkipReason};
pub use error::{NotifyError, Result};
pub use lifecycle::{IncidentLifecycle, Transition};
pub use media::{
    EmailMedium, LogTransport, MailTransport, Medium, MediumRegistry, MediumSchema, OutgoingMail,
    SmsMedium, SmtpMailTransport,
};
pub use profile::{NewProfile, NotificationProfile, ProfileId};
pub use resolver::ProfileResolver;
pub use store::NotificationStore;
