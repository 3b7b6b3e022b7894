//! Queryable incident storage.
//!
//! The [`IncidentStore`] trait is the boundary the filter engine queries: it
//! hands out [`IncidentSet`]s for individual constraints, which callers then
//! combine with set intersection and union. [`InMemoryIncidentStore`] is the
//! in-process implementation; slices of incidents also implement the trait so
//! any candidate collection can be filtered directly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{IncidentError, Result};
use crate::event::Event;
use crate::tag::{Tag, TagRegistry};
use crate::types::{
    Acknowledgement, EndTime, Incident, IncidentBuilder, IncidentId, IncidentPredicate,
    SourceSystem, SourceSystemId, UserId, validate_level,
};

/// A set of incident identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentSet(BTreeSet<IncidentId>);

impl IncidentSet {
    /// The empty set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns the elements present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// Returns the elements present in either set.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// Returns true if `id` is in the set.
    #[must_use]
    pub fn contains(&self, id: IncidentId) -> bool {
        self.0.contains(&id)
    }

    /// Returns true if every element is also in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns the number of incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the identifiers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = IncidentId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<IncidentId> for IncidentSet {
    fn from_iter<I: IntoIterator<Item = IncidentId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Query capability over a universe of incidents.
pub trait IncidentStore: Send + Sync {
    /// Every incident in the store.
    fn universe(&self) -> IncidentSet;

    /// Looks up a single incident.
    fn get(&self, id: IncidentId) -> Option<Incident>;

    /// Incidents for which `predicate` returns true.
    fn select(&self, predicate: &dyn Fn(&Incident) -> bool) -> IncidentSet;

    /// Incidents reported by any of `sources`.
    fn with_sources(&self, sources: &[SourceSystemId]) -> IncidentSet {
        self.select(&|incident| sources.contains(&incident.source))
    }

    /// Incidents that, for every key, carry at least one of its values.
    fn with_tag_groups(&self, groups: &BTreeMap<String, BTreeSet<String>>) -> IncidentSet {
        self.select(&|incident| {
            groups
                .iter()
                .all(|(key, values)| incident.has_any_value(key, values))
        })
    }

    /// Incidents for which the tri-state predicate holds with `expected`.
    fn with_state(
        &self,
        predicate: IncidentPredicate,
        expected: bool,
        now: DateTime<Utc>,
    ) -> IncidentSet {
        self.select(&|incident| predicate.holds(incident, expected, now))
    }

    /// Incidents at least as severe as `max_level`.
    fn with_max_level(&self, max_level: u8) -> IncidentSet {
        self.select(&|incident| incident.level <= max_level)
    }
}

impl IncidentStore for [Incident] {
    fn universe(&self) -> IncidentSet {
        self.iter().map(|incident| incident.id).collect()
    }

    fn get(&self, id: IncidentId) -> Option<Incident> {
        self.iter().find(|incident| incident.id == id).cloned()
    }

    fn select(&self, predicate: &dyn Fn(&Incident) -> bool) -> IncidentSet {
        self.iter()
            .filter(|incident| predicate(incident))
            .map(|incident| incident.id)
            .collect()
    }
}

impl IncidentStore for Vec<Incident> {
    fn universe(&self) -> IncidentSet {
        self.as_slice().universe()
    }

    fn get(&self, id: IncidentId) -> Option<Incident> {
        IncidentStore::get(self.as_slice(), id)
    }

    fn select(&self, predicate: &dyn Fn(&Incident) -> bool) -> IncidentSet {
        self.as_slice().select(predicate)
    }
}

/// In-memory incident store with source systems, interned tags and an
/// event log.
#[derive(Debug)]
pub struct InMemoryIncidentStore {
    sources: RwLock<BTreeMap<SourceSystemId, SourceSystem>>,
    incidents: RwLock<BTreeMap<IncidentId, Incident>>,
    events: RwLock<Vec<Event>>,
    tags: TagRegistry,
    next_id: AtomicU64,
}

impl InMemoryIncidentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(BTreeMap::new()),
            incidents: RwLock::new(BTreeMap::new()),
            events: RwLock::new(Vec::new()),
            tags: TagRegistry::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the tag registry used for interning.
    #[must_use]
    pub const fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    // ============ Sources ============

    /// Registers a source system, replacing any with the same ID.
    pub fn add_source(&self, source: SourceSystem) {
        info!(source_id = source.id, name = %source.name, "registered source system");
        self.sources.write().insert(source.id, source);
    }

    /// Looks up a source system.
    #[must_use]
    pub fn source(&self, id: SourceSystemId) -> Option<SourceSystem> {
        self.sources.read().get(&id).cloned()
    }

    // ============ Incidents ============

    fn allocate_id(&self) -> Result<IncidentId> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|id| IncidentError::IdSpaceExhausted { id })
    }

    fn reserve_id(&self, id: IncidentId) -> Result<()> {
        let next = id.checked_add(1).ok_or(IncidentError::IdSpaceExhausted { id })?;
        self.next_id.fetch_max(next, Ordering::Relaxed);
        Ok(())
    }

    /// Applies the rules every stored incident obeys: a known source, a
    /// valid level, no end time for stateless sources and interned tags.
    fn normalize(&self, mut incident: Incident) -> Result<Incident> {
        validate_level(incident.level)?;
        let source = self
            .source(incident.source)
            .ok_or(IncidentError::SourceNotFound {
                id: incident.source,
            })?;
        if !source.stateful {
            incident.end_time = None;
        }
        incident.tags = incident
            .tags
            .into_iter()
            .map(|tag| self.tags.intern(tag.as_ref().clone()))
            .collect();
        Ok(incident)
    }

    /// Stores a new incident and returns it with its assigned ID.
    ///
    /// Incidents from stateless sources are stored without an end time.
    ///
    /// # Errors
    ///
    /// Returns `IncidentError::SourceNotFound` for an unknown source, or the
    /// builder's validation error.
    pub fn insert(&self, builder: IncidentBuilder) -> Result<Incident> {
        let incident = self.normalize(builder.build(self.allocate_id()?)?)?;
        debug!(incident_id = incident.id, source = incident.source, "stored incident");
        self.incidents.write().insert(incident.id, incident.clone());
        Ok(incident)
    }

    /// Stores an incident with a caller-chosen ID, replacing any existing one.
    ///
    /// The same rules as [`insert`](Self::insert) apply.
    ///
    /// # Errors
    ///
    /// Returns `IncidentError::SourceNotFound`, `IncidentError::InvalidLevel`
    /// or `IncidentError::IdSpaceExhausted` for the largest possible ID.
    pub fn put(&self, incident: Incident) -> Result<Incident> {
        let incident = self.normalize(incident)?;
        self.reserve_id(incident.id)?;
        debug!(incident_id = incident.id, source = incident.source, "put incident");
        self.incidents.write().insert(incident.id, incident.clone());
        Ok(incident)
    }

    /// Returns the number of stored incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.read().len()
    }

    /// Returns true if no incidents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.read().is_empty()
    }

    fn modify<F>(&self, id: IncidentId, f: F) -> Result<Incident>
    where
        F: FnOnce(&mut Incident) -> Result<()>,
    {
        let mut incidents = self.incidents.write();
        let incident = incidents
            .get_mut(&id)
            .ok_or(IncidentError::IncidentNotFound { id })?;
        f(incident)?;
        Ok(incident.clone())
    }

    /// Adds an acknowledgement.
    pub fn acknowledge(
        &self,
        id: IncidentId,
        actor: UserId,
        timestamp: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<Incident> {
        self.modify(id, |incident| {
            incident.acknowledgements.push(Acknowledgement {
                actor,
                timestamp,
                expiration,
            });
            Ok(())
        })
    }

    /// Ends an open stateful incident at `at`.
    pub fn close(&self, id: IncidentId, at: DateTime<Utc>) -> Result<Incident> {
        self.modify(id, |incident| {
            if !incident.is_open() {
                return Err(IncidentError::InvalidTransition {
                    id,
                    reason: "only open stateful incidents can be closed".to_string(),
                });
            }
            incident.end_time = Some(EndTime::At(at));
            Ok(())
        })
    }

    /// Reopens a closed incident.
    pub fn reopen(&self, id: IncidentId) -> Result<Incident> {
        self.modify(id, |incident| {
            if !incident.is_closed() {
                return Err(IncidentError::InvalidTransition {
                    id,
                    reason: "only closed incidents can be reopened".to_string(),
                });
            }
            incident.end_time = Some(EndTime::Infinity);
            Ok(())
        })
    }

    /// Replaces the incident's tags with interned copies of `tags`.
    pub fn set_tags(&self, id: IncidentId, tags: &[Tag]) -> Result<Incident> {
        let mut interned: Vec<Arc<Tag>> = Vec::with_capacity(tags.len());
        for tag in tags {
            let shared = self.tags.intern(tag.clone());
            if !interned.contains(&shared) {
                interned.push(shared);
            }
        }
        self.modify(id, |incident| {
            incident.tags = interned;
            Ok(())
        })
    }

    // ============ Events ============

    /// Appends an event to the log.
    ///
    /// # Errors
    ///
    /// Returns `IncidentError::IncidentNotFound` if the incident is unknown.
    pub fn record_event(&self, event: Event) -> Result<Event> {
        if !self.incidents.read().contains_key(&event.incident_id) {
            return Err(IncidentError::IncidentNotFound {
                id: event.incident_id,
            });
        }
        debug!(incident_id = event.incident_id, event_type = %event.event_type, "recorded event");
        self.events.write().push(event.clone());
        Ok(event)
    }

    /// Returns the events of an incident in recording order.
    #[must_use]
    pub fn events_for(&self, id: IncidentId) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|event| event.incident_id == id)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryIncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IncidentStore for InMemoryIncidentStore {
    fn universe(&self) -> IncidentSet {
        self.incidents.read().keys().copied().collect()
    }

    fn get(&self, id: IncidentId) -> Option<Incident> {
        self.incidents.read().get(&id).cloned()
    }

    fn select(&self, predicate: &dyn Fn(&Incident) -> bool) -> IncidentSet {
        self.incidents
            .read()
            .values()
            .filter(|incident| predicate(incident))
            .map(|incident| incident.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::tag::group_by_key;
    use chrono::Duration;
    use test_case::test_case;

    fn store_with_sources() -> InMemoryIncidentStore {
        let store = InMemoryIncidentStore::new();
        store.add_source(SourceSystem::new(1, "nav", true));
        store.add_source(SourceSystem::new(2, "syslog", false));
        store
    }

    fn tag(s: &str) -> Arc<Tag> {
        Arc::new(Tag::parse(s).unwrap())
    }

    #[test]
    fn set_algebra() {
        let a: IncidentSet = [1, 2, 3].into_iter().collect();
        let b: IncidentSet = [2, 3, 4].into_iter().collect();
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(a.union(&b).len(), 4);
        assert!(IncidentSet::none().is_empty());
        assert!(IncidentSet::none().is_subset(&a));
    }

    #[test]
    fn insert_assigns_ids_and_interns_tags() {
        let store = store_with_sources();
        let first = store
            .insert(Incident::builder(1, Utc::now()).tag(tag("env=prod")))
            .unwrap();
        let second = store
            .insert(Incident::builder(1, Utc::now()).tag(tag("env=prod")))
            .unwrap();

        assert_ne!(first.id, second.id);
        assert!(Arc::ptr_eq(&first.tags[0], &second.tags[0]));
        assert_eq!(store.tags().len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn insert_unknown_source_fails() {
        let store = store_with_sources();
        let result = store.insert(Incident::builder(99, Utc::now()));
        assert!(matches!(result, Err(IncidentError::SourceNotFound { id: 99 })));
    }

    #[test]
    fn stateless_source_strips_end_time() {
        let store = store_with_sources();
        let incident = store.insert(Incident::builder(2, Utc::now())).unwrap();
        assert!(!incident.is_stateful());
    }

    #[test]
    fn close_and_reopen() {
        let store = store_with_sources();
        let incident = store.insert(Incident::builder(1, Utc::now())).unwrap();

        let closed = store.close(incident.id, Utc::now()).unwrap();
        assert!(closed.is_closed());
        assert!(store.close(incident.id, Utc::now()).is_err());

        let reopened = store.reopen(incident.id).unwrap();
        assert!(reopened.is_open());
        assert!(store.reopen(incident.id).is_err());
    }

    #[test]
    fn queries_select_expected_incidents() {
        let store = store_with_sources();
        let now = Utc::now();
        let a = store
            .insert(
                Incident::builder(1, now)
                    .level(2)
                    .tag(tag("env=prod"))
                    .tag(tag("site=oslo")),
            )
            .unwrap();
        let b = store
            .insert(Incident::builder(2, now).level(4).tag(tag("env=dev")))
            .unwrap();
        let c = store
            .insert(Incident::builder(1, now - Duration::hours(2)).ended_at(now))
            .unwrap();

        assert_eq!(store.universe().len(), 3);
        assert!(store.with_sources(&[2]).contains(b.id));
        assert!(!store.with_sources(&[2]).contains(a.id));

        let prod = [Tag::parse("env=prod").unwrap()];
        let groups = group_by_key(&prod);
        assert_eq!(store.with_tag_groups(&groups).iter().collect::<Vec<_>>(), vec![a.id]);

        let closed = store.with_state(IncidentPredicate::Open, false, now);
        assert_eq!(closed.iter().collect::<Vec<_>>(), vec![c.id]);

        let severe = store.with_max_level(3);
        assert!(severe.contains(a.id));
        assert!(!severe.contains(b.id));
    }

    #[test]
    fn acknowledge_records_ack() {
        let store = store_with_sources();
        let now = Utc::now();
        let incident = store.insert(Incident::builder(1, now)).unwrap();
        let acked = store.acknowledge(incident.id, 5, now, None).unwrap();
        assert!(acked.is_acked_at(now));
        assert!(store.acknowledge(999, 5, now, None).is_err());
    }

    #[test]
    fn set_tags_dedups() {
        let store = store_with_sources();
        let incident = store.insert(Incident::builder(1, Utc::now())).unwrap();
        let env = Tag::parse("env=prod").unwrap();
        let updated = store
            .set_tags(incident.id, &[env.clone(), env])
            .unwrap();
        assert_eq!(updated.tags.len(), 1);
    }

    #[test]
    fn events_are_logged_per_incident() {
        let store = store_with_sources();
        let now = Utc::now();
        let incident = store.insert(Incident::builder(1, now)).unwrap();

        store
            .record_event(Event::new(incident.id, EventType::IncidentStart, now))
            .unwrap();
        assert!(store
            .record_event(Event::new(404, EventType::Other, now))
            .is_err());

        let events = store.events_for(incident.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::IncidentStart);
    }

    #[test]
    fn slices_are_stores() {
        let incidents = vec![
            Incident::builder(1, Utc::now()).build(10).unwrap(),
            Incident::builder(2, Utc::now()).build(11).unwrap(),
        ];
        assert_eq!(incidents.universe().len(), 2);
        assert_eq!(IncidentStore::get(&incidents, 11).map(|i| i.source), Some(2));
        assert!(incidents.with_sources(&[1]).contains(10));
    }

    #[test]
    fn put_advances_id_counter() {
        let store = store_with_sources();
        store.put(Incident::builder(1, Utc::now()).build(40).unwrap()).unwrap();
        let next = store.insert(Incident::builder(1, Utc::now())).unwrap();
        assert!(next.id > 40);
    }

    #[test]
    fn put_applies_source_statefulness() {
        let store = store_with_sources();
        let incident: Incident = serde_json::from_str(
            r#"{"id": 7, "source": 2, "start_time": "2024-03-04T08:00:00Z",
                "end_time": "infinity", "level": 3}"#,
        )
        .unwrap();
        let stored = store.put(incident).unwrap();

        assert!(!stored.is_stateful());
        assert!(store.with_state(IncidentPredicate::Stateful, false, Utc::now()).contains(7));
        assert!(!store.with_state(IncidentPredicate::Open, true, Utc::now()).contains(7));
    }

    #[test_case(0 ; "below range")]
    #[test_case(200 ; "above range")]
    fn put_rejects_level(level: u8) {
        let store = store_with_sources();
        let mut incident = Incident::builder(1, Utc::now()).build(8).unwrap();
        incident.level = level;
        assert!(matches!(store.put(incident), Err(IncidentError::InvalidLevel { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn put_rejects_unknown_source() {
        let store = store_with_sources();
        let incident = Incident::builder(9, Utc::now()).build(8).unwrap();
        assert!(matches!(store.put(incident), Err(IncidentError::SourceNotFound { id: 9 })));
    }

    #[test]
    fn put_rejects_last_id() {
        let store = store_with_sources();
        let incident = Incident::builder(1, Utc::now()).build(u64::MAX).unwrap();
        assert!(matches!(
            store.put(incident),
            Err(IncidentError::IdSpaceExhausted { id: u64::MAX })
        ));
        assert!(store.is_empty());

        store.put(Incident::builder(1, Utc::now()).build(u64::MAX - 1).unwrap()).unwrap();
        assert!(matches!(
            store.insert(Incident::builder(1, Utc::now())),
            Err(IncidentError::IdSpaceExhausted { .. })
        ));
    }
}
