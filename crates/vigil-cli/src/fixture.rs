//! Loading configuration and fixture data.
//!
//! A fixture is a JSON document describing everything the stores would
//! normally hold:
//!
//! ```json
//! {
//!   "sources": [{"id": 1, "name": "zabbix", "stateful": true}],
//!   "incidents": [{"id": 1, "source": 1, "start_time": "2024-03-04T08:00:00Z",
//!                  "end_time": "infinity", "level": 2, "tags": ["env=prod"]}],
//!   "users": [{"id": 1, "username": "ola", "email": "ola@example.com"}],
//!   "filters": [{"id": 1, "user": 1, "name": "Prod", "filter": {"tags": ["env=prod"]}}],
//!   "groups": [{"id": 1, "user": 1, "name": "Always", "recurrences": []}],
//!   "destinations": [{"id": 1, "user": 1, "media": "email",
//!                     "settings": {"email_address": "ops@example.com"}}],
//!   "profiles": [{"id": 1, "user": 1, "name": "On call", "time_recurrence_group": 1,
//!                 "filters": [1], "destinations": [1]}]
//! }
//! ```
//!
//! Entities are inserted in dependency order so every store invariant is
//! checked exactly as for entities created one by one.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};
use vigil_filter::Filter;
use vigil_incident::{InMemoryIncidentStore, Incident, SourceSystem};
use vigil_notify::{
    Destination, Dispatcher, MediumRegistry, NewProfile, NotificationStore, NotifyConfig, User,
};
use vigil_schedule::TimeRecurrenceGroup;

use crate::cli::Cli;
use crate::error::CliError;

/// Fixture contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Source systems.
    pub sources: Vec<SourceSystem>,
    /// Incidents.
    pub incidents: Vec<Incident>,
    /// Users.
    pub users: Vec<User>,
    /// Whether to provision a synced email destination per user email.
    pub sync_user_emails: bool,
    /// Filters.
    pub filters: Vec<Filter>,
    /// Recurrence groups.
    pub groups: Vec<TimeRecurrenceGroup>,
    /// Destinations.
    pub destinations: Vec<Destination>,
    /// Profiles with their links.
    pub profiles: Vec<NewProfile>,
}

impl Fixture {
    /// Parses a fixture from JSON.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Fixture` for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, CliError> {
        serde_json::from_str(json).map_err(|e| CliError::Fixture(e.to_string()))
    }

    /// Reads a fixture file.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Io` if the file cannot be read and
    /// `CliError::Fixture` for malformed JSON.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Inserts the fixture into the stores.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Fixture` naming the first entity that violates a
    /// store invariant.
    pub fn populate(
        self,
        incidents: &InMemoryIncidentStore,
        store: &NotificationStore,
    ) -> Result<(), CliError> {
        let invalid = |what: String| move |e: vigil_notify::NotifyError| CliError::Fixture(format!("{what}: {e}"));

        for source in self.sources {
            incidents.add_source(source);
        }
        for incident in self.incidents {
            let id = incident.id;
            incidents
                .put(incident)
                .map_err(|e| CliError::Fixture(format!("incident {id}: {e}")))?;
        }

        let user_ids: Vec<u64> = self.users.iter().map(|u| u.id).collect();
        for user in self.users {
            store.add_user(user);
        }
        if self.sync_user_emails {
            for id in user_ids {
                store
                    .sync_user_email(id)
                    .map_err(invalid(format!("user {id}")))?;
            }
        }

        for filter in self.filters {
            let id = filter.id;
            store.add_filter(filter).map_err(invalid(format!("filter {id}")))?;
        }
        for group in self.groups {
            let id = group.id;
            store.add_group(group).map_err(invalid(format!("group {id}")))?;
        }
        for destination in self.destinations {
            let id = destination.id;
            store
                .add_destination(destination)
                .map_err(invalid(format!("destination {id}")))?;
        }
        for profile in self.profiles {
            let name = profile.name.clone();
            store
                .add_profile(profile)
                .map_err(invalid(format!("profile '{name}'")))?;
        }

        info!(
            incidents = incidents.len(),
            profiles = store.profiles().len(),
            "fixture loaded"
        );
        Ok(())
    }
}

/// Everything a command needs: configuration, stores and the dispatcher.
#[derive(Debug)]
pub struct Context {
    /// Effective configuration.
    pub config: NotifyConfig,
    /// Incident store.
    pub incidents: Arc<InMemoryIncidentStore>,
    /// Notification store.
    pub store: Arc<NotificationStore>,
    /// Dispatcher over both stores.
    pub dispatcher: Arc<Dispatcher>,
}

impl Context {
    /// Builds the context from command-line arguments.
    ///
    /// The configuration file is read first; `--timezone` and
    /// `--send-notifications` override it. Without `--fixture` the stores
    /// start empty.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` for an unreadable or invalid
    /// configuration and the fixture's load or populate error.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = match &cli.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
                NotifyConfig::from_json(&json).map_err(|e| CliError::Config(e.to_string()))?
            }
            None => NotifyConfig::default(),
        };
        if let Some(tz) = &cli.timezone {
            config.timezone.clone_from(tz);
        }
        if let Some(send) = cli.send_notifications {
            config.send_notifications = send;
        }
        debug!(timezone = %config.timezone, send = config.send_notifications, "effective configuration");

        let fixture = match &cli.fixture {
            Some(path) => Fixture::load(path)?,
            None => Fixture::default(),
        };
        Self::build(config, fixture)
    }

    /// Builds the context from a configuration and a fixture.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` for an unknown timezone and the fixture's
    /// populate error.
    pub fn build(config: NotifyConfig, fixture: Fixture) -> Result<Self, CliError> {
        let registry = MediumRegistry::from_config(&config);
        let store = Arc::new(NotificationStore::new(Arc::new(registry)));
        let incidents = Arc::new(InMemoryIncidentStore::new());
        fixture.populate(&incidents, &store)?;

        let dispatcher = Dispatcher::new(config.clone(), Arc::clone(&store), incidents.clone())
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(Self {
            config,
            incidents,
            store,
            dispatcher: Arc::new(dispatcher),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_incident::{IncidentPredicate, IncidentStore};
    use vigil_notify::{EmailConfig, MailBackend};

    const FIXTURE: &str = r#"{
        "sources": [{"id": 1, "name": "zabbix", "stateful": true}],
        "incidents": [
            {"id": 4, "source": 1, "start_time": "2024-03-04T08:00:00Z",
             "end_time": "infinity", "level": 2, "tags": ["env=prod"]}
        ],
        "users": [{"id": 1, "username": "ola", "email": "ola@example.com"}],
        "sync_user_emails": true,
        "filters": [{"id": 1, "user": 1, "name": "Prod", "filter": {"tags": ["env=prod"]}}],
        "groups": [{"id": 1, "user": 1, "name": "Always",
                    "recurrences": [{"days": [1, 2, 3, 4, 5, 6, 7],
                                     "start": "00:00:00", "end": "23:59:59"}]}],
        "destinations": [{"id": 10, "user": 1, "media": "sms",
                          "settings": {"phone_number": "+4712345678"}}],
        "profiles": [{"id": 1, "user": 1, "name": "On call", "time_recurrence_group": 1,
                      "filters": [1], "destinations": [10]}]
    }"#;

    fn log_config() -> NotifyConfig {
        NotifyConfig::default().with_email(EmailConfig::default().with_backend(MailBackend::Log))
    }

    #[test]
    fn fixture_populates_stores() {
        let ctx = Context::build(log_config(), Fixture::from_json(FIXTURE).unwrap()).unwrap();
        assert_eq!(ctx.incidents.len(), 1);
        assert!(ctx.incidents.get(4).is_some());
        assert_eq!(ctx.store.profile_destinations(1).len(), 1);
        assert!(ctx.store.destinations_for(1).iter().any(|d| d.synced));
    }

    #[test]
    fn empty_fixture() {
        let ctx = Context::build(log_config(), Fixture::default()).unwrap();
        assert!(ctx.incidents.is_empty());
        assert!(ctx.store.profiles().is_empty());
    }

    #[test]
    fn unknown_source_is_rejected() {
        let fixture = Fixture::from_json(
            r#"{"incidents": [{"id": 1, "source": 9, "start_time": "2024-03-04T08:00:00Z", "level": 1}]}"#,
        )
        .unwrap();
        assert!(matches!(Context::build(log_config(), fixture), Err(CliError::Fixture(_))));
    }

    #[test]
    fn stateless_source_drops_end_time() {
        let fixture = Fixture::from_json(
            r#"{"sources": [{"id": 2, "name": "syslog", "stateful": false}],
                "incidents": [{"id": 5, "source": 2, "start_time": "2024-03-04T08:00:00Z",
                               "end_time": "infinity", "level": 3}]}"#,
        )
        .unwrap();
        let ctx = Context::build(log_config(), fixture).unwrap();
        let incident = ctx.incidents.get(5).unwrap();
        assert!(!incident.is_stateful());
        assert!(ctx
            .incidents
            .with_state(IncidentPredicate::Stateful, false, Utc::now())
            .contains(5));
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let fixture = Fixture::from_json(
            r#"{"sources": [{"id": 1, "name": "zabbix", "stateful": true}],
                "incidents": [{"id": 5, "source": 1, "start_time": "2024-03-04T08:00:00Z",
                               "level": 0}]}"#,
        )
        .unwrap();
        let err = Context::build(log_config(), fixture).unwrap_err();
        assert!(matches!(err, CliError::Fixture(_)));
        assert!(err.to_string().contains("incident 5"));
    }

    #[test]
    fn largest_incident_id_is_rejected() {
        let fixture = Fixture::from_json(&format!(
            r#"{{"sources": [{{"id": 1, "name": "zabbix", "stateful": true}}],
                "incidents": [{{"id": {}, "source": 1, "start_time": "2024-03-04T08:00:00Z",
                                "level": 2}}]}}"#,
            u64::MAX
        ))
        .unwrap();
        assert!(matches!(Context::build(log_config(), fixture), Err(CliError::Fixture(_))));
    }

    #[test]
    fn broken_invariant_names_entity() {
        let fixture = Fixture::from_json(
            r#"{"users": [{"id": 1, "username": "ola"}],
                "groups": [{"id": 1, "user": 1, "name": "g", "recurrences": []}],
                "profiles": [{"user": 1, "name": "a", "time_recurrence_group": 1},
                             {"user": 1, "name": "b", "time_recurrence_group": 1}]}"#,
        )
        .unwrap();
        let err = Context::build(log_config(), fixture).unwrap_err();
        assert!(err.to_string().contains("profile 'b'"));
    }

    #[test]
    fn unknown_timezone_is_config_error() {
        let config = log_config().with_timezone("Mars/Olympus");
        assert!(matches!(
            Context::build(config, Fixture::default()),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(Fixture::from_json("{"), Err(CliError::Fixture(_))));
    }
}
