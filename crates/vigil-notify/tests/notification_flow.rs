//! End-to-end tests for profile resolution and dispatch.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use vigil_filter::{FilterEngine, FilterSpecification};
use vigil_incident::{
    Event, EventType, IncidentSet, InMemoryIncidentStore, Incident, SourceSystem, Tag,
};
use vigil_notify::{
    Dispatcher, IncidentLifecycle, MailTransport, MediumRegistry, NewProfile, NotificationStore,
    NotifyConfig, OutgoingMail, ProfileResolver, User,
};
use vigil_schedule::{ScheduleEngine, TimeRecurrence, Weekday};

// ============ Helpers ============

#[derive(Debug, Default)]
struct Outbox {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl Outbox {
    fn recipients(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.to.clone()).collect()
    }
}

impl MailTransport for Outbox {
    fn send(&self, mail: &OutgoingMail) -> vigil_notify::Result<()> {
        self.sent.lock().push(mail.clone());
        Ok(())
    }
}

struct World {
    outbox: Arc<Outbox>,
    store: Arc<NotificationStore>,
    incidents: Arc<InMemoryIncidentStore>,
    dispatcher: Arc<Dispatcher>,
}

fn world(config: NotifyConfig) -> World {
    let outbox = Arc::new(Outbox::default());
    let registry = MediumRegistry::with_transport(&config, outbox.clone());
    let store = Arc::new(NotificationStore::new(Arc::new(registry)));
    store.add_user(User::new(1, "ola").with_email("ola@example.com"));
    store.add_user(User::new(2, "kari"));

    let incidents = Arc::new(InMemoryIncidentStore::new());
    incidents.add_source(SourceSystem::new(1, "zabbix", true));
    let dispatcher =
        Arc::new(Dispatcher::new(config, Arc::clone(&store), incidents.clone()).unwrap());
    World {
        outbox,
        store,
        incidents,
        dispatcher,
    }
}

fn enabled() -> NotifyConfig {
    NotifyConfig::default().with_send_notifications(true)
}

// 2024-03-04 is a Monday
fn monday(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
}

fn tag(raw: &str) -> Arc<Tag> {
    Arc::new(Tag::parse(raw).unwrap())
}

// ============ Scenarios ============

#[test]
fn production_incident_reaches_on_call_profile() {
    let w = world(enabled());
    let prod = w
        .incidents
        .insert(Incident::builder(1, monday(8)).level(2).tag(tag("environment=prod")))
        .unwrap();
    let staging = w
        .incidents
        .insert(Incident::builder(1, monday(8)).level(2).tag(tag("environment=staging")))
        .unwrap();

    let weekdays = TimeRecurrence::new(
        [Weekday::Monday, Weekday::Tuesday, Weekday::Wednesday, Weekday::Thursday, Weekday::Friday],
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    )
    .unwrap();
    let group = w.store.create_group(1, "Office hours", vec![weekdays]).unwrap();
    let filter = w
        .store
        .create_filter(
            1,
            "Prod",
            FilterSpecification::new().with_tags(["environment=prod"]).maxlevel(3).open(true),
        )
        .unwrap();
    let synced = w.store.sync_user_email(1).unwrap().unwrap();
    w.store
        .add_profile(
            NewProfile::new(1, "On call", group.id)
                .with_filters([filter.id])
                .with_destinations([synced.id]),
        )
        .unwrap();

    let report = w
        .dispatcher
        .dispatch_at(&Event::new(prod.id, EventType::IncidentStart, monday(9)), monday(9));
    assert!(report.success());
    assert_eq!(w.outbox.recipients(), vec!["ola@example.com"]);

    let report = w
        .dispatcher
        .dispatch_at(&Event::new(staging.id, EventType::IncidentStart, monday(9)), monday(9));
    assert!(report.profiles.is_empty());

    let report = w
        .dispatcher
        .dispatch_at(&Event::new(prod.id, EventType::IncidentStart, monday(20)), monday(20));
    assert!(report.profiles.is_empty());
    assert_eq!(w.outbox.recipients().len(), 1);
}

#[test]
fn profiles_of_different_users_share_nothing() {
    let w = world(enabled());
    let incident = w.incidents.insert(Incident::builder(1, monday(8)).level(1)).unwrap();

    for (user, address) in [(1, "a@example.com"), (2, "b@example.com")] {
        let group = w.store.create_group(user, "Always", vec![TimeRecurrence::all_week()]).unwrap();
        let filter = w.store.create_filter(user, "All", FilterSpecification::new().maxlevel(5)).unwrap();
        let dest = w
            .store
            .create_destination(user, "email", json!({"email_address": address}))
            .unwrap();
        w.store
            .add_profile(
                NewProfile::new(user, "Everything", group.id)
                    .with_filters([filter.id])
                    .with_destinations([dest.id]),
            )
            .unwrap();
    }

    let report = w.dispatcher.dispatch(&Event::new(incident.id, EventType::IncidentStart, Utc::now()));
    assert_eq!(report.profiles.len(), 2);
    assert_eq!(w.outbox.recipients(), vec!["a@example.com", "b@example.com"]);
}

#[test]
fn redispatch_is_not_deduplicated() {
    let w = world(enabled());
    let incident = w.incidents.insert(Incident::builder(1, monday(8))).unwrap();
    let group = w.store.create_group(1, "Always", vec![TimeRecurrence::all_week()]).unwrap();
    let filter = w.store.create_filter(1, "Open", FilterSpecification::new().open(true)).unwrap();
    let dest = w
        .store
        .create_destination(1, "email", json!({"email_address": "ops@example.com"}))
        .unwrap();
    w.store
        .add_profile(NewProfile::new(1, "p", group.id).with_filters([filter.id]).with_destinations([dest.id]))
        .unwrap();

    let event = Event::new(incident.id, EventType::IncidentStart, Utc::now());
    let _ = w.dispatcher.dispatch(&event);
    let _ = w.dispatcher.dispatch(&event);
    assert_eq!(w.outbox.recipients().len(), 2);
}

#[tokio::test]
async fn lifecycle_notifies_on_close() {
    let w = world(enabled());
    let group = w.store.create_group(1, "Always", vec![TimeRecurrence::all_week()]).unwrap();
    let filter = w
        .store
        .create_filter(
            1,
            "Closed",
            FilterSpecification::new().open(false).with_event_types([EventType::IncidentEnd]),
        )
        .unwrap();
    let dest = w
        .store
        .create_destination(1, "email", json!({"email_address": "ops@example.com"}))
        .unwrap();
    w.store
        .add_profile(NewProfile::new(1, "p", group.id).with_filters([filter.id]).with_destinations([dest.id]))
        .unwrap();

    let lifecycle = IncidentLifecycle::new(Arc::clone(&w.incidents), Arc::clone(&w.dispatcher));
    let created = lifecycle.create_incident(Incident::builder(1, Utc::now() - Duration::hours(1))).unwrap();
    created.dispatch.await.unwrap();
    assert!(w.outbox.recipients().is_empty());

    let closed = lifecycle.close(created.incident.id, Utc::now(), Some(1)).unwrap();
    closed.dispatch.await.unwrap();
    assert_eq!(w.outbox.recipients(), vec!["ops@example.com"]);
    let body = w.outbox.sent.lock()[0].body.clone();
    assert!(body.contains("end_time: "));
    assert!(!body.contains("Still open"));
}

// ============ Properties ============

fn arb_spec() -> impl Strategy<Value = FilterSpecification> {
    (
        prop::collection::vec(prop::sample::select(vec!["env=prod", "env=test", "site=oslo"]), 0..2),
        any::<Option<bool>>(),
        prop::option::of(1u8..=5),
    )
        .prop_map(|(tags, open, maxlevel)| {
            let mut spec = FilterSpecification::new().with_tags(tags);
            spec.open = open;
            spec.maxlevel = maxlevel;
            spec
        })
}

fn arb_incidents() -> impl Strategy<Value = Vec<Incident>> {
    prop::collection::vec(
        (1u8..=5, any::<bool>(), prop::sample::select(vec!["env=prod", "env=test", "site=oslo"])),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (level, closed, raw))| {
                let mut builder = Incident::builder(1, monday(6)).level(level).tag(tag(raw));
                if closed {
                    builder = builder.ended_at(monday(7));
                }
                builder.build(i as u64 + 1).unwrap()
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn profile_selection_is_union_of_filters(
        specs in prop::collection::vec(arb_spec(), 0..4),
        incidents in arb_incidents(),
    ) {
        let w = world(enabled());
        let group = w.store.create_group(1, "Always", vec![TimeRecurrence::all_week()]).unwrap();
        let filters: Vec<u64> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| w.store.create_filter(1, format!("f{i}"), spec.clone()).unwrap().id)
            .collect();
        let profile = w.store
            .add_profile(NewProfile::new(1, "p", group.id).with_filters(filters))
            .unwrap();

        let resolver = ProfileResolver::new(&w.store, ScheduleEngine::default());
        let resolved = resolver.resolve(&profile, &incidents, monday(9)).unwrap();

        let expected = specs.iter().fold(IncidentSet::none(), |acc, spec| {
            acc.union(&FilterEngine::matching(spec, &incidents, monday(9)).unwrap())
        });
        prop_assert_eq!(&resolved, &expected);

        for incident in &incidents {
            prop_assert_eq!(resolver.matches(&profile, incident, monday(9)), resolved.contains(incident.id));
        }
    }

    #[test]
    fn shared_destination_notified_once(profiles in 1usize..6) {
        let w = world(enabled());
        let incident = w.incidents.insert(Incident::builder(1, monday(8)).level(1)).unwrap();
        let dest = w
            .store
            .create_destination(1, "email", json!({"email_address": "shared@example.com"}))
            .unwrap();
        for i in 0..profiles {
            let group = w.store.create_group(1, format!("g{i}"), vec![TimeRecurrence::all_week()]).unwrap();
            let filter = w.store.create_filter(1, format!("f{i}"), FilterSpecification::new().maxlevel(5)).unwrap();
            w.store
                .add_profile(
                    NewProfile::new(1, format!("p{i}"), group.id)
                        .with_filters([filter.id])
                        .with_destinations([dest.id]),
                )
                .unwrap();
        }

        let report = w.dispatcher.dispatch(&Event::new(incident.id, EventType::IncidentStart, Utc::now()));
        prop_assert_eq!(report.profiles.len(), profiles);
        prop_assert_eq!(report.destinations, vec![dest.id]);
        prop_assert_eq!(w.outbox.recipients(), vec!["shared@example.com".to_string()]);
    }
}
