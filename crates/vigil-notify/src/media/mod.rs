//! Delivery media.
//!
//! A [`Medium`] knows how to validate the settings of its destinations and
//! how to deliver an event to a batch of them. Media are looked up by slug
//! in a [`MediumRegistry`] built once at startup.

pub mod email;
pub mod message;
pub mod sms;
pub mod transport;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use vigil_incident::{Event, Incident};

use crate::config::{MailBackend, NotifyConfig};
use crate::destination::{Destination, User};
use crate::error::{NotifyError, Result};

pub use email::EmailMedium;
pub use sms::SmsMedium;
pub use transport::{LogTransport, MailTransport, OutgoingMail, SmtpMailTransport};

/// One property in a medium's settings schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaProperty {
    /// JSON type of the property.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable title.
    pub title: String,
}

impl SchemaProperty {
    /// A string property.
    #[must_use]
    pub fn string(title: impl Into<String>) -> Self {
        Self {
            kind: "string".to_string(),
            title: title.into(),
        }
    }
}

/// JSON schema describing a medium's destination settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediumSchema {
    /// Schema title.
    pub title: String,
    /// Schema description.
    pub description: String,
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Required property names.
    pub required: Vec<String>,
    /// Properties by name.
    pub properties: BTreeMap<String, SchemaProperty>,
}

/// How to apply a settings change that a medium handles itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// The destination with its new settings.
    pub updated: Destination,
    /// A copy of the old destination to keep as a new record.
    pub preserved: Option<Destination>,
}

/// A delivery channel for notifications.
///
/// Implementations must not panic in [`send`](Medium::send); delivery
/// problems are logged and reflected in the returned flag.
pub trait Medium: Send + Sync + fmt::Debug {
    /// Stable identifier stored on destinations.
    fn slug(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Schema for destination settings.
    fn json_schema(&self) -> MediumSchema;

    /// Validates raw settings for a destination owned by `owner`.
    ///
    /// `existing` holds the owner's other destinations on this medium.
    /// Returns the cleaned settings.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Validation` for invalid or duplicate settings.
    fn validate(&self, settings: &Value, owner: &User, existing: &[Destination]) -> Result<Value>;

    /// A short label for the destination, such as its address.
    fn get_label(&self, destination: &Destination) -> Option<String>;

    /// The addresses of this medium's destinations among `destinations`.
    fn get_relevant_addresses(&self, destinations: &[Destination]) -> BTreeSet<String>;

    /// Delivers `event` to `destinations`.
    ///
    /// Returns false if there was nobody to deliver to or every delivery
    /// failed.
    fn send(&self, event: &Event, incident: &Incident, destinations: &[Destination]) -> bool;

    /// Refuses deletion of destinations that are still needed.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotDeletable` if any profile uses the
    /// destination.
    fn raise_if_not_deletable(&self, destination: &Destination, in_use: bool) -> Result<()> {
        ensure_unused(destination, in_use)
    }

    /// Takes over a settings update. `None` means a plain in-place update.
    fn update(&self, _destination: &Destination, _validated: &Value) -> Option<UpdatePlan> {
        None
    }

    /// Returns true if `existing` already holds a destination with these
    /// settings.
    fn has_duplicate(&self, existing: &[Destination], settings: &Value) -> bool;
}

/// Refuses deletion of a destination linked to any profile.
///
/// # Errors
///
/// Returns `NotifyError::NotDeletable` if `in_use` is set.
pub fn ensure_unused(destination: &Destination, in_use: bool) -> Result<()> {
    if in_use {
        return Err(NotifyError::not_deletable(format!(
            "{destination} is used by one or more notification profiles"
        )));
    }
    Ok(())
}

/// Sends one message per address and summarizes the outcome.
///
/// A configuration error aborts the batch since no further address can
/// succeed.
pub(crate) fn deliver_each<F>(
    medium: &str,
    transport: &dyn MailTransport,
    addresses: &BTreeSet<String>,
    render: F,
) -> bool
where
    F: Fn(&str) -> OutgoingMail,
{
    if addresses.is_empty() {
        debug!(medium, "no addresses to deliver to");
        return false;
    }

    let mut failed = Vec::new();
    for address in addresses {
        match transport.send(&render(address)) {
            Ok(()) => {}
            Err(NotifyError::Configuration { reason }) => {
                error!(medium, %reason, "cannot deliver, check configuration");
                return false;
            }
            Err(e) => {
                debug!(medium, %address, error = %e, "delivery failed");
                failed.push(address.as_str());
            }
        }
    }

    if failed.len() == addresses.len() {
        error!(medium, "failed to send to any addresses");
        return false;
    }
    if !failed.is_empty() {
        warn!(
            medium,
            failed = failed.len(),
            total = addresses.len(),
            "failed to send to {} of {} addresses",
            failed.len(),
            addresses.len()
        );
        debug!(medium, failed = %failed.join(" "), "failed addresses");
    }
    true
}

/// Lookup table from slug to medium.
#[derive(Debug, Clone, Default)]
pub struct MediumRegistry {
    media: HashMap<String, Arc<dyn Medium>>,
}

impl MediumRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry with the built-in media, using the transport
    /// selected in `config`.
    #[must_use]
    pub fn from_config(config: &NotifyConfig) -> Self {
        let transport: Arc<dyn MailTransport> = match config.email.backend {
            MailBackend::Smtp => Arc::new(SmtpMailTransport::new(&config.email)),
            MailBackend::Log => Arc::new(LogTransport),
        };
        Self::with_transport(config, transport)
    }

    /// Builds the registry with the built-in media sharing `transport`.
    #[must_use]
    pub fn with_transport(config: &NotifyConfig, transport: Arc<dyn MailTransport>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EmailMedium::new(config, Arc::clone(&transport))));
        registry.register(Arc::new(SmsMedium::new(config, transport)));
        registry
    }

    /// Adds a medium, replacing any with the same slug.
    pub fn register(&mut self, medium: Arc<dyn Medium>) {
        info!(slug = %medium.slug(), name = %medium.name(), "registered medium");
        self.media.insert(medium.slug().to_string(), medium);
    }

    /// Looks up a medium.
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<Arc<dyn Medium>> {
        self.media.get(slug).cloned()
    }

    /// Looks up a medium that must exist.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::UnknownMedium` for unregistered slugs.
    pub fn require(&self, slug: &str) -> Result<Arc<dyn Medium>> {
        self.get(slug)
            .ok_or_else(|| NotifyError::UnknownMedium(slug.to_string()))
    }

    /// Registered slugs in sorted order.
    #[must_use]
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<_> = self.media.keys().cloned().collect();
        slugs.sort();
        slugs
    }

    /// Number of registered media.
    #[must_use]
    pub fn len(&self) -> usize {
        self.media.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use parking_lot::Mutex;

    use super::*;

    /// Records every message and fails for chosen recipients.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<OutgoingMail>>,
        pub failing: BTreeSet<String>,
        pub misconfigured: bool,
    }

    impl RecordingTransport {
        pub fn failing(addresses: &[&str]) -> Self {
            Self {
                failing: addresses.iter().map(ToString::to_string).collect(),
                ..Self::default()
            }
        }

        pub fn recipients(&self) -> Vec<String> {
            self.sent.lock().iter().map(|m| m.to.clone()).collect()
        }
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, mail: &OutgoingMail) -> Result<()> {
            if self.misconfigured {
                return Err(NotifyError::configuration("email host is not set"));
            }
            if self.failing.contains(&mail.to) {
                return Err(NotifyError::TransientDelivery {
                    reason: "connection reset".to_string(),
                });
            }
            self.sent.lock().push(mail.clone());
            Ok(())
        }
    }
}
