//! Email delivery.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lettre::Address;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use vigil_incident::{Event, Incident};

use super::message::{render_body, render_subject};
use super::transport::{MailTransport, OutgoingMail};
use super::{deliver_each, ensure_unused, Medium, MediumSchema, SchemaProperty, UpdatePlan};
use crate::config::NotifyConfig;
use crate::destination::{Destination, User};
use crate::error::{NotifyError, Result};

/// Slug of the email medium.
pub const EMAIL_SLUG: &str = "email";

const ADDRESS_KEY: &str = "email_address";

#[derive(Debug, Deserialize)]
struct EmailSettings {
    email_address: String,
}

/// Delivers notifications as plain-text email.
///
/// Destination settings are `{"email_address": "..."}`. Destinations synced
/// from a user's account cannot be deleted, and editing one keeps the synced
/// address as a separate destination.
#[derive(Debug, Clone)]
pub struct EmailMedium {
    config: NotifyConfig,
    transport: Arc<dyn MailTransport>,
}

impl EmailMedium {
    /// Creates the medium.
    #[must_use]
    pub fn new(config: &NotifyConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config: config.clone(),
            transport,
        }
    }

    /// Builds settings for an address.
    #[must_use]
    pub fn settings_for(address: &str) -> Value {
        json!({ ADDRESS_KEY: address })
    }
}

impl Medium for EmailMedium {
    fn slug(&self) -> &str {
        EMAIL_SLUG
    }

    fn name(&self) -> &str {
        "Email"
    }

    fn json_schema(&self) -> MediumSchema {
        MediumSchema {
            title: "Email Settings".to_string(),
            description: "Settings for a DestinationConfig using email.".to_string(),
            kind: "object".to_string(),
            required: vec![ADDRESS_KEY.to_string()],
            properties: BTreeMap::from([(
                ADDRESS_KEY.to_string(),
                SchemaProperty::string("Email address"),
            )]),
        }
    }

    fn validate(&self, settings: &Value, owner: &User, existing: &[Destination]) -> Result<Value> {
        let parsed: EmailSettings = serde_json::from_value(settings.clone())
            .map_err(|e| NotifyError::validation(format!("invalid email settings: {e}")))?;
        let address = parsed.email_address.trim();
        if address.parse::<Address>().is_err() {
            return Err(NotifyError::validation(format!(
                "'{address}' is not a valid email address"
            )));
        }
        if owner.email.as_deref() == Some(address) {
            return Err(NotifyError::validation(
                "This email address is already registered in another destination.",
            ));
        }

        let cleaned = Self::settings_for(address);
        if self.has_duplicate(existing, &cleaned) {
            return Err(NotifyError::validation("Email address already exists"));
        }
        Ok(cleaned)
    }

    fn get_label(&self, destination: &Destination) -> Option<String> {
        destination.setting(ADDRESS_KEY).map(ToString::to_string)
    }

    fn get_relevant_addresses(&self, destinations: &[Destination]) -> BTreeSet<String> {
        destinations
            .iter()
            .filter(|d| d.media == EMAIL_SLUG)
            .filter_map(|d| d.setting(ADDRESS_KEY))
            .map(ToString::to_string)
            .collect()
    }

    fn send(&self, event: &Event, incident: &Incident, destinations: &[Destination]) -> bool {
        let addresses = self.get_relevant_addresses(destinations);
        let subject = render_subject(&self.config.subject_prefix, event);
        let details = self.config.incident_url(incident.id);
        let body = render_body(event, incident, details.as_deref());
        debug!(incident_id = incident.id, recipients = addresses.len(), "sending email");

        deliver_each(EMAIL_SLUG, self.transport.as_ref(), &addresses, |address| OutgoingMail {
            to: address.to_string(),
            subject: subject.clone(),
            body: body.clone(),
        })
    }

    fn raise_if_not_deletable(&self, destination: &Destination, in_use: bool) -> Result<()> {
        ensure_unused(destination, in_use)?;
        if destination.synced {
            return Err(NotifyError::not_deletable(
                "Cannot delete this email destination since it was defined by an outside source.",
            ));
        }
        Ok(())
    }

    fn update(&self, destination: &Destination, validated: &Value) -> Option<UpdatePlan> {
        if !destination.synced {
            return None;
        }
        let updated = Destination {
            settings: validated.clone(),
            synced: false,
            ..destination.clone()
        };
        Some(UpdatePlan {
            updated,
            preserved: Some(destination.clone()),
        })
    }

    fn has_duplicate(&self, existing: &[Destination], settings: &Value) -> bool {
        let Some(address) = settings.get(ADDRESS_KEY).and_then(Value::as_str) else {
            return false;
        };
        existing
            .iter()
            .any(|d| d.media == EMAIL_SLUG && d.setting(ADDRESS_KEY) == Some(address))
    }
}
