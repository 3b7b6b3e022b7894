//! Profile resolution.
//!
//! A profile selects an incident when the profile is active, its recurrence
//! group covers the instant and at least one of its filters matches. The
//! profile's selection is the union of its filters' selections.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use vigil_filter::{CompiledFilter, FilterEngine};
use vigil_incident::{Event, Incident, IncidentSet, IncidentStore};
use vigil_schedule::ScheduleEngine;

use crate::error::Result;
use crate::profile::NotificationProfile;
use crate::store::NotificationStore;

/// Evaluates notification profiles against incidents.
#[derive(Debug, Clone, Copy)]
pub struct ProfileResolver<'a> {
    store: &'a NotificationStore,
    schedule: ScheduleEngine,
}

impl<'a> ProfileResolver<'a> {
    /// Creates a resolver reading profiles from `store`.
    #[must_use]
    pub const fn new(store: &'a NotificationStore, schedule: ScheduleEngine) -> Self {
        Self { store, schedule }
    }

    /// Returns true if the profile is switched on and its group covers
    /// `instant`. Profiles whose group is missing are never scheduled.
    #[must_use]
    pub fn is_scheduled(&self, profile: &NotificationProfile, instant: DateTime<Utc>) -> bool {
        if !profile.active {
            return false;
        }
        self.store
            .profile_group(profile)
            .is_some_and(|group| self.schedule.is_active(&group, instant))
    }

    /// Returns the incidents the profile selects at `instant`.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the first malformed filter.
    pub fn resolve<S>(
        &self,
        profile: &NotificationProfile,
        incidents: &S,
        instant: DateTime<Utc>,
    ) -> Result<IncidentSet>
    where
        S: IncidentStore + ?Sized,
    {
        if !self.is_scheduled(profile, instant) {
            debug!(profile_id = profile.id, "profile inactive or off schedule");
            return Ok(IncidentSet::none());
        }
        let filters = self.store.profile_filters(profile.id);
        let specs = filters.iter().map(|f| &f.filter);
        Ok(FilterEngine::matching_any(specs, incidents, instant)?)
    }

    fn compiled_filters(&self, profile: &NotificationProfile) -> Vec<CompiledFilter> {
        self.store
            .profile_filters(profile.id)
            .iter()
            .filter_map(|f| match f.filter.compile() {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(profile_id = profile.id, filter_id = f.id, error = %e, "skipping malformed filter");
                    None
                }
            })
            .collect()
    }

    /// Returns true if the profile selects `incident` at `instant`.
    #[must_use]
    pub fn matches(&self, profile: &NotificationProfile, incident: &Incident, instant: DateTime<Utc>) -> bool {
        self.is_scheduled(profile, instant)
            && self
                .compiled_filters(profile)
                .iter()
                .any(|f| f.matches(incident, instant))
    }

    /// Returns true if one of the profile's filters selects `incident` and
    /// accepts the event's type.
    #[must_use]
    pub fn matches_event(
        &self,
        profile: &NotificationProfile,
        incident: &Incident,
        event: &Event,
        instant: DateTime<Utc>,
    ) -> bool {
        self.is_scheduled(profile, instant)
            && self
                .compiled_filters(profile)
                .iter()
                .any(|f| f.matches_event(incident, event, instant))
    }

    /// Returns every profile that should be notified about `event`.
    #[must_use]
    pub fn matching_profiles(
        &self,
        incident: &Incident,
        event: &Event,
        instant: DateTime<Utc>,
    ) -> Vec<NotificationProfile> {
        self.store
            .profiles()
            .into_iter()
            .filter(|p| self.matches_event(p, incident, event, instant))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveTime, TimeZone};
    use vigil_filter::FilterSpecification;
    use vigil_incident::{EventType, Tag};
    use vigil_schedule::{TimeRecurrence, Weekday};

    use super::*;
    use crate::config::NotifyConfig;
    use crate::destination::User;
    use crate::media::{LogTransport, MediumRegistry};
    use crate::profile::NewProfile;

    fn store() -> NotificationStore {
        let registry = MediumRegistry::with_transport(&NotifyConfig::default(), Arc::new(LogTransport));
        let store = NotificationStore::new(Arc::new(registry));
        store.add_user(User::new(1, "ola"));
        store
    }

    // 2024-03-04 is a Monday
    fn monday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    fn incidents() -> Vec<Incident> {
        let start = monday_noon();
        vec![
            Incident::builder(1, start)
                .level(2)
                .tag(Arc::new(Tag::parse("env=prod").unwrap()))
                .build(1)
                .unwrap(),
            Incident::builder(1, start)
                .level(5)
                .tag(Arc::new(Tag::parse("env=test").unwrap()))
                .build(2)
                .unwrap(),
            Incident::builder(2, start).level(1).ended_at(start).build(3).unwrap(),
        ]
    }

    fn profile_with(store: &NotificationStore, specs: Vec<FilterSpecification>) -> NotificationProfile {
        let group = store
            .create_group(1, "always", vec![TimeRecurrence::all_week()])
            .unwrap();
        let filters: Vec<u64> = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| store.create_filter(1, format!("f{i}"), spec).unwrap().id)
            .collect();
        store
            .add_profile(NewProfile::new(1, "p", group.id).with_filters(filters))
            .unwrap()
    }

    #[test]
    fn union_of_filters() {
        let s = store();
        let p = profile_with(
            &s,
            vec![
                FilterSpecification::new().with_tags(["env=prod"]),
                FilterSpecification::new().open(false),
            ],
        );
        let resolver = ProfileResolver::new(&s, ScheduleEngine::default());
        let set = resolver.resolve(&p, &incidents(), monday_noon()).unwrap();
        assert_eq!(set, IncidentSet::from_iter([1, 3]));
    }

    #[test]
    fn no_filters_selects_nothing() {
        let s = store();
        let p = profile_with(&s, vec![]);
        let resolver = ProfileResolver::new(&s, ScheduleEngine::default());
        assert!(resolver.resolve(&p, &incidents(), monday_noon()).unwrap().is_empty());
    }

    #[test]
    fn inactive_profile_selects_nothing() {
        let s = store();
        let p = profile_with(&s, vec![FilterSpecification::new().maxlevel(5)]);
        let p = s.set_profile_active(p.id, false).unwrap();
        let resolver = ProfileResolver::new(&s, ScheduleEngine::default());
        assert!(resolver.resolve(&p, &incidents(), monday_noon()).unwrap().is_empty());
        assert!(!resolver.matches(&p, &incidents()[0], monday_noon()));
    }

    #[test]
    fn off_schedule_selects_nothing() {
        let s = store();
        let weekend = TimeRecurrence::new(
            [Weekday::Saturday, Weekday::Sunday],
            NaiveTime::MIN,
            NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        )
        .unwrap();
        let group = s.create_group(1, "weekend", vec![weekend]).unwrap();
        let filter = s.create_filter(1, "all", FilterSpecification::new().maxlevel(5)).unwrap();
        let p = s
            .add_profile(NewProfile::new(1, "weekend", group.id).with_filters([filter.id]))
            .unwrap();

        let resolver = ProfileResolver::new(&s, ScheduleEngine::default());
        assert!(!resolver.is_scheduled(&p, monday_noon()));
        assert!(resolver.resolve(&p, &incidents(), monday_noon()).unwrap().is_empty());

        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(resolver.resolve(&p, &incidents(), saturday).unwrap().len(), 3);
    }

    #[test]
    fn empty_group_never_fires() {
        let s = store();
        let group = s.create_group(1, "never", vec![]).unwrap();
        let filter = s.create_filter(1, "all", FilterSpecification::new().maxlevel(5)).unwrap();
        let p = s
            .add_profile(NewProfile::new(1, "never", group.id).with_filters([filter.id]))
            .unwrap();
        let resolver = ProfileResolver::new(&s, ScheduleEngine::default());
        assert!(resolver.resolve(&p, &incidents(), monday_noon()).unwrap().is_empty());
    }

    #[test]
    fn event_types_gate_per_filter() {
        let s = store();
        let p = profile_with(
            &s,
            vec![
                FilterSpecification::new()
                    .with_tags(["env=prod"])
                    .with_event_types([EventType::IncidentEnd]),
                FilterSpecification::new().with_tags(["env=test"]),
            ],
        );
        let resolver = ProfileResolver::new(&s, ScheduleEngine::default());
        let all = incidents();
        let start = Event::new(1, EventType::IncidentStart, monday_noon());
        let end = Event::new(1, EventType::IncidentEnd, monday_noon());

        assert!(resolver.matches(&p, &all[0], monday_noon()));
        assert!(!resolver.matches_event(&p, &all[0], &start, monday_noon()));
        assert!(resolver.matches_event(&p, &all[0], &end, monday_noon()));

        let start_two = Event::new(2, EventType::IncidentStart, monday_noon());
        assert!(resolver.matches_event(&p, &all[1], &start_two, monday_noon()));
        assert_eq!(resolver.matching_profiles(&all[1], &start_two, monday_noon()).len(), 1);
    }
}
