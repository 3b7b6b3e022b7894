//! Incident lifecycle orchestration.
//!
//! Every state change goes through [`IncidentLifecycle`], which updates the
//! incident, records the matching event and hands the event to the
//! dispatcher in the background. The caller gets the updated incident and
//! event immediately.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::info;
use vigil_incident::{Event, EventType, Incident, IncidentBuilder, IncidentId, InMemoryIncidentStore, Tag, UserId};

use crate::dispatcher::Dispatcher;
use crate::error::Result;

/// Result of a lifecycle operation.
#[derive(Debug)]
pub struct Transition {
    /// The incident after the change.
    pub incident: Incident,
    /// The recorded event.
    pub event: Event,
    /// The background dispatch of `event`.
    pub dispatch: JoinHandle<()>,
}

/// Applies incident state changes and triggers notifications.
#[derive(Debug, Clone)]
pub struct IncidentLifecycle {
    incidents: Arc<InMemoryIncidentStore>,
    dispatcher: Arc<Dispatcher>,
}

impl IncidentLifecycle {
    /// Creates the orchestrator. `dispatcher` should read from `incidents`.
    #[must_use]
    pub const fn new(incidents: Arc<InMemoryIncidentStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            incidents,
            dispatcher,
        }
    }

    /// Returns the incident store.
    #[must_use]
    pub fn incidents(&self) -> &InMemoryIncidentStore {
        &self.incidents
    }

    fn record(&self, incident: Incident, event: Event) -> Result<Transition> {
        let event = self.incidents.record_event(event)?;
        info!(incident_id = incident.id, event_type = %event.event_type, "incident changed");
        let dispatch = self.dispatcher.spawn(event.clone());
        Ok(Transition {
            incident,
            event,
            dispatch,
        })
    }

    /// Stores a new incident and announces it.
    ///
    /// The first event is `IncidentStart` for stateful incidents and
    /// `Stateless` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Incident` if the incident cannot be stored.
    pub fn create_incident(&self, builder: IncidentBuilder) -> Result<Transition> {
        let incident = self.incidents.insert(builder)?;
        let event_type = if incident.is_stateful() {
            EventType::IncidentStart
        } else {
            EventType::Stateless
        };
        let event = Event::new(incident.id, event_type, incident.start_time);
        self.record(incident, event)
    }

    /// Acknowledges an incident on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Incident` for unknown incidents.
    pub fn acknowledge(
        &self,
        id: IncidentId,
        actor: UserId,
        at: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<Transition> {
        let incident = self.incidents.acknowledge(id, actor, at, expiration)?;
        let event = Event::new(id, EventType::Acknowledge, at).with_actor(actor);
        self.record(incident, event)
    }

    /// Closes an open incident.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Incident` for unknown incidents or incidents
    /// that are not open.
    pub fn close(&self, id: IncidentId, at: DateTime<Utc>, actor: Option<UserId>) -> Result<Transition> {
        let incident = self.incidents.close(id, at)?;
        let mut event = Event::new(id, EventType::IncidentEnd, at);
        event.actor = actor;
        self.record(incident, event)
    }

    /// Reopens a closed incident.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Incident` for unknown incidents or incidents
    /// that are not closed.
    pub fn reopen(&self, id: IncidentId, at: DateTime<Utc>, actor: Option<UserId>) -> Result<Transition> {
        let incident = self.incidents.reopen(id)?;
        let mut event = Event::new(id, EventType::Reopen, at);
        event.actor = actor;
        self.record(incident, event)
    }

    /// Replaces an incident's tags.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Incident` for unknown incidents.
    pub fn change_tags(&self, id: IncidentId, tags: &[Tag], at: DateTime<Utc>) -> Result<Transition> {
        let incident = self.incidents.set_tags(id, tags)?;
        let listed: Vec<String> = tags.iter().map(ToString::to_string).collect();
        let event = Event::new(id, EventType::IncidentChange, at)
            .with_description(format!("Tags changed to: {}", listed.join(", ")));
        self.record(incident, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::destination::User;
    use crate::media::testing::RecordingTransport;
    use crate::media::MediumRegistry;
    use crate::profile::NewProfile;
    use crate::store::NotificationStore;
    use serde_json::json;
    use vigil_filter::FilterSpecification;
    use vigil_incident::SourceSystem;
    use vigil_schedule::TimeRecurrence;

    fn lifecycle(spec: FilterSpecification) -> (IncidentLifecycle, Arc<RecordingTransport>) {
        let config = NotifyConfig::default().with_send_notifications(true);
        let transport = Arc::new(RecordingTransport::default());
        let registry = MediumRegistry::with_transport(&config, transport.clone());
        let store = Arc::new(NotificationStore::new(Arc::new(registry)));
        store.add_user(User::new(1, "ola"));

        let group = store.create_group(1, "always", vec![TimeRecurrence::all_week()]).unwrap();
        let filter = store.create_filter(1, "f", spec).unwrap();
        let dest = store
            .create_destination(1, "email", json!({"email_address": "ops@example.com"}))
            .unwrap();
        store
            .add_profile(
                NewProfile::new(1, "p", group.id)
                    .with_filters([filter.id])
                    .with_destinations([dest.id]),
            )
            .unwrap();

        let incidents = Arc::new(InMemoryIncidentStore::new());
        incidents.add_source(SourceSystem::new(1, "nagios", true));
        incidents.add_source(SourceSystem::new(2, "syslog", false));
        let dispatcher = Dispatcher::new(config, store, incidents.clone()).unwrap();
        (IncidentLifecycle::new(incidents, Arc::new(dispatcher)), transport)
    }

    #[tokio::test]
    async fn create_announces_start() {
        let (lc, transport) = lifecycle(FilterSpecification::new().open(true));
        let t = lc.create_incident(Incident::builder(1, Utc::now())).unwrap();
        assert_eq!(t.event.event_type, EventType::IncidentStart);
        t.dispatch.await.unwrap();
        assert_eq!(transport.recipients(), vec!["ops@example.com"]);
        assert_eq!(lc.incidents().events_for(t.incident.id).len(), 1);
    }

    #[tokio::test]
    async fn stateless_source_announces_stateless() {
        let (lc, transport) = lifecycle(FilterSpecification::new().open(true));
        let t = lc.create_incident(Incident::builder(2, Utc::now())).unwrap();
        assert_eq!(t.event.event_type, EventType::Stateless);
        t.dispatch.await.unwrap();
        assert!(transport.recipients().is_empty());
    }

    #[tokio::test]
    async fn transitions_record_events() {
        let (lc, transport) = lifecycle(
            FilterSpecification::new()
                .maxlevel(5)
                .with_event_types([EventType::IncidentEnd, EventType::Reopen]),
        );
        let now = Utc::now();
        let id = lc.create_incident(Incident::builder(1, now)).unwrap().incident.id;

        let ack = lc.acknowledge(id, 1, now, None).unwrap();
        assert_eq!(ack.event.actor, Some(1));
        assert!(ack.incident.is_acked_at(now));

        let closed = lc.close(id, now, Some(1)).unwrap();
        assert!(closed.incident.is_closed());
        closed.dispatch.await.unwrap();

        let reopened = lc.reopen(id, now, None).unwrap();
        assert!(reopened.incident.is_open());
        reopened.dispatch.await.unwrap();

        let tagged = lc
            .change_tags(id, &[Tag::parse("host=db1").unwrap()], now)
            .unwrap();
        assert_eq!(tagged.event.description, "Tags changed to: host=db1");
        tagged.dispatch.await.unwrap();

        let kinds: Vec<_> = lc.incidents().events_for(id).iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                EventType::IncidentStart,
                EventType::Acknowledge,
                EventType::IncidentEnd,
                EventType::Reopen,
                EventType::IncidentChange,
            ]
        );
        assert_eq!(transport.recipients().len(), 2);
    }

    #[tokio::test]
    async fn invalid_transition_is_an_error() {
        let (lc, _) = lifecycle(FilterSpecification::new().open(true));
        let id = lc.create_incident(Incident::builder(1, Utc::now())).unwrap().incident.id;
        assert!(lc.reopen(id, Utc::now(), None).is_err());
        assert!(lc.close(99, Utc::now(), None).is_err());
    }
}
