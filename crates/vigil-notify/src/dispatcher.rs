//! Event dispatch.
//!
//! The [`Dispatcher`] turns an incident event into deliveries: it finds the
//! profiles that want the event, collects their destinations once each,
//! groups them by medium and lets every medium send its batch on its own
//! thread. Delivery problems never reach the caller; they are logged and
//! summarized in a [`DispatchReport`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vigil_incident::{Event, EventType, IncidentId, IncidentStore};
use vigil_schedule::ScheduleEngine;

use crate::config::NotifyConfig;
use crate::destination::{Destination, DestinationId};
use crate::error::Result;
use crate::profile::ProfileId;
use crate::resolver::ProfileResolver;
use crate::store::NotificationStore;

/// Why an event was not dispatched at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Sending is switched off in the configuration.
    NotificationsDisabled,
    /// The event refers to an incident the store does not know.
    UnknownIncident,
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// The event's incident.
    pub incident_id: IncidentId,
    /// The event's type.
    pub event_type: EventType,
    /// Set when nothing was attempted.
    pub skipped: Option<SkipReason>,
    /// Profiles that matched.
    pub profiles: Vec<ProfileId>,
    /// Destinations notified, each once.
    pub destinations: Vec<DestinationId>,
    /// Per-medium send results.
    pub media: BTreeMap<String, bool>,
}

impl DispatchReport {
    fn new(event: &Event) -> Self {
        Self {
            incident_id: event.incident_id,
            event_type: event.event_type,
            skipped: None,
            profiles: Vec::new(),
            destinations: Vec::new(),
            media: BTreeMap::new(),
        }
    }

    fn skipped(event: &Event, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(event)
        }
    }

    /// True if at least one medium succeeded, or if no medium was tried.
    #[must_use]
    pub fn success(&self) -> bool {
        self.media.is_empty() || self.media.values().any(|ok| *ok)
    }
}

/// Delivers incident events to the destinations of matching profiles.
pub struct Dispatcher {
    config: NotifyConfig,
    schedule: ScheduleEngine,
    profiles: Arc<NotificationStore>,
    incidents: Arc<dyn IncidentStore>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("schedule", &self.schedule)
            .field("profiles", &self.profiles)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Schedule` if the configured timezone is unknown.
    pub fn new(
        config: NotifyConfig,
        profiles: Arc<NotificationStore>,
        incidents: Arc<dyn IncidentStore>,
    ) -> Result<Self> {
        let schedule = config.schedule_engine()?;
        Ok(Self {
            config,
            schedule,
            profiles,
            incidents,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Returns the notification store.
    #[must_use]
    pub fn store(&self) -> &NotificationStore {
        &self.profiles
    }

    /// Dispatches `event` using the current time for schedules and filters.
    #[must_use]
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        self.dispatch_at(event, Utc::now())
    }

    /// Dispatches `event` as if it were `now`.
    #[must_use]
    pub fn dispatch_at(&self, event: &Event, now: DateTime<Utc>) -> DispatchReport {
        if !self.config.send_notifications {
            debug!(incident_id = event.incident_id, "notifications disabled, not dispatching");
            return DispatchReport::skipped(event, SkipReason::NotificationsDisabled);
        }
        let Some(incident) = self.incidents.get(event.incident_id) else {
            warn!(incident_id = event.incident_id, "event for unknown incident, not dispatching");
            return DispatchReport::skipped(event, SkipReason::UnknownIncident);
        };

        let mut report = DispatchReport::new(event);
        let resolver = ProfileResolver::new(&self.profiles, self.schedule);
        report.profiles = resolver
            .matching_profiles(&incident, event, now)
            .iter()
            .map(|p| p.id)
            .collect();

        let destinations = self.profiles.destinations_of(report.profiles.iter().copied());
        report.destinations = destinations.iter().map(|d| d.id).collect();

        let mut by_medium: BTreeMap<String, Vec<Destination>> = BTreeMap::new();
        for destination in destinations {
            by_medium
                .entry(destination.media.clone())
                .or_default()
                .push(destination);
        }

        let registry = self.profiles.registry();
        let batches: Vec<_> = by_medium
            .into_iter()
            .filter_map(|(slug, batch)| match registry.get(&slug) {
                Some(medium) => Some((slug, medium, batch)),
                None => {
                    error!(medium = %slug, destinations = batch.len(), "unknown medium, skipping destinations");
                    None
                }
            })
            .collect();

        let incident = &incident;
        report.media = thread::scope(|scope| {
            let handles: Vec<_> = batches
                .iter()
                .map(|(slug, medium, batch)| {
                    (slug, scope.spawn(move || medium.send(event, incident, batch)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(slug, handle)| {
                    let ok = handle.join().unwrap_or_else(|_| {
                        error!(medium = %slug, "medium panicked while sending");
                        false
                    });
                    (slug.clone(), ok)
                })
                .collect()
        });

        info!(
            incident_id = event.incident_id,
            event_type = %event.event_type,
            profiles = report.profiles.len(),
            destinations = report.destinations.len(),
            success = report.success(),
            "dispatched event"
        );
        report
    }

    /// Dispatches `event` on the blocking pool without waiting for it.
    ///
    /// The outcome is logged. Must be called from within a tokio runtime.
    pub fn spawn(self: &Arc<Self>, event: Event) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let report = dispatcher.dispatch(&event);
            if report.success() {
                debug!(incident_id = report.incident_id, "background dispatch finished");
            } else {
                let failed: Vec<&str> = report.media.keys().map(String::as_str).collect();
                warn!(incident_id = report.incident_id, ?failed, "background dispatch failed for every medium");
            }
        })
    }
}
