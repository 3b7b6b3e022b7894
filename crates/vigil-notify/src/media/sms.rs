//! SMS delivery through an email-to-SMS gateway.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};
use vigil_incident::{Event, Incident};

use super::message::render_subject;
use super::transport::{MailTransport, OutgoingMail};
use super::{deliver_each, Medium, MediumSchema, SchemaProperty};
use crate::config::NotifyConfig;
use crate::destination::{Destination, User};
use crate::error::{NotifyError, Result};

/// Slug of the SMS medium.
pub const SMS_SLUG: &str = "sms";

const PHONE_KEY: &str = "phone_number";

/// E.164: a plus sign, then up to fifteen digits with no leading zero.
static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").unwrap_or_else(|_| unreachable!()));

#[derive(Debug, Deserialize)]
struct SmsSettings {
    phone_number: String,
}

/// Delivers short notifications as SMS.
///
/// Each message is mailed to the configured gateway address with the phone
/// number as the subject.
#[derive(Debug, Clone)]
pub struct SmsMedium {
    config: NotifyConfig,
    transport: Arc<dyn MailTransport>,
}

impl SmsMedium {
    /// Creates the medium.
    #[must_use]
    pub fn new(config: &NotifyConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config: config.clone(),
            transport,
        }
    }

    /// Builds settings for a phone number.
    #[must_use]
    pub fn settings_for(phone_number: &str) -> Value {
        json!({ PHONE_KEY: phone_number })
    }

    fn normalize(raw: &str) -> String {
        raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
    }
}

impl Medium for SmsMedium {
    fn slug(&self) -> &str {
        SMS_SLUG
    }

    fn name(&self) -> &str {
        "SMS"
    }

    fn json_schema(&self) -> MediumSchema {
        MediumSchema {
            title: "SMS Settings".to_string(),
            description: "Settings for a DestinationConfig using SMS.".to_string(),
            kind: "object".to_string(),
            required: vec![PHONE_KEY.to_string()],
            properties: BTreeMap::from([(
                PHONE_KEY.to_string(),
                SchemaProperty::string("Phone number"),
            )]),
        }
    }

    fn validate(&self, settings: &Value, _owner: &User, existing: &[Destination]) -> Result<Value> {
        let parsed: SmsSettings = serde_json::from_value(settings.clone())
            .map_err(|e| NotifyError::validation(format!("invalid SMS settings: {e}")))?;
        let phone = Self::normalize(&parsed.phone_number);
        if !PHONE_REGEX.is_match(&phone) {
            return Err(NotifyError::validation(format!(
                "'{}' is not an international phone number",
                parsed.phone_number
            )));
        }

        let cleaned = Self::settings_for(&phone);
        if self.has_duplicate(existing, &cleaned) {
            return Err(NotifyError::validation("Phone number already exists"));
        }
        Ok(cleaned)
    }

    fn get_label(&self, destination: &Destination) -> Option<String> {
        destination.setting(PHONE_KEY).map(ToString::to_string)
    }

    fn get_relevant_addresses(&self, destinations: &[Destination]) -> BTreeSet<String> {
        destinations
            .iter()
            .filter(|d| d.media == SMS_SLUG)
            .filter_map(|d| d.setting(PHONE_KEY))
            .map(ToString::to_string)
            .collect()
    }

    fn send(&self, event: &Event, incident: &Incident, destinations: &[Destination]) -> bool {
        let phones = self.get_relevant_addresses(destinations);
        if phones.is_empty() {
            return false;
        }
        let Some(gateway) = self.config.sms.gateway_address.as_deref() else {
            error!("SMS gateway address is not configured, cannot send");
            return false;
        };

        let text = render_subject(&self.config.subject_prefix, event);
        debug!(incident_id = incident.id, recipients = phones.len(), "sending SMS");

        deliver_each(SMS_SLUG, self.transport.as_ref(), &phones, |phone| OutgoingMail {
            to: gateway.to_string(),
            subject: phone.to_string(),
            body: text.clone(),
        })
    }

    fn has_duplicate(&self, existing: &[Destination], settings: &Value) -> bool {
        let Some(phone) = settings.get(PHONE_KEY).and_then(Value::as_str) else {
            return false;
        };
        existing
            .iter()
            .any(|d| d.media == SMS_SLUG && d.setting(PHONE_KEY) == Some(phone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::RecordingTransport;
    use chrono::Utc;
    use test_case::test_case;
    use vigil_incident::EventType;

    fn medium(config: &NotifyConfig, transport: Arc<RecordingTransport>) -> SmsMedium {
        SmsMedium::new(config, transport)
    }

    fn sms_dest(id: u64, phone: &str) -> Destination {
        Destination::new(id, 1, SMS_SLUG, SmsMedium::settings_for(phone))
    }

    #[test_case("+4712345678", "+4712345678" ; "plain")]
    #[test_case("+47 123 45 678", "+4712345678" ; "spaces")]
    #[test_case("+1-555-010-9999", "+15550109999" ; "dashes")]
    fn accepts_phone(raw: &str, cleaned: &str) {
        let m = medium(&NotifyConfig::default(), Arc::default());
        let value = m
            .validate(&json!({"phone_number": raw}), &User::new(1, "ola"), &[])
            .unwrap();
        assert_eq!(value, json!({"phone_number": cleaned}));
    }

    #[test_case("12345678" ; "missing plus")]
    #[test_case("+0123456789" ; "leading zero")]
    #[test_case("+47abc" ; "letters")]
    #[test_case("+1234567890123456" ; "too long")]
    fn rejects_phone(raw: &str) {
        let m = medium(&NotifyConfig::default(), Arc::default());
        assert!(m
            .validate(&json!({"phone_number": raw}), &User::new(1, "ola"), &[])
            .is_err());
    }

    #[test]
    fn rejects_duplicate_phone() {
        let m = medium(&NotifyConfig::default(), Arc::default());
        let existing = [sms_dest(2, "+4712345678")];
        assert!(m
            .validate(&json!({"phone_number": "+47 12345678"}), &User::new(1, "ola"), &existing)
            .is_err());
    }

    #[test]
    fn sends_through_gateway() {
        let transport = Arc::new(RecordingTransport::default());
        let config = NotifyConfig::default().with_sms_gateway("sms@gateway.example.com");
        let incident = Incident::builder(1, Utc::now()).build(3).unwrap();
        let event = Event::new(3, EventType::Acknowledge, Utc::now());

        assert!(medium(&config, Arc::clone(&transport)).send(&event, &incident, &[sms_dest(1, "+4712345678")]));
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sms@gateway.example.com");
        assert_eq!(sent[0].subject, "+4712345678");
        assert_eq!(sent[0].body, "[Vigil] Incident #3: Acknowledge");
    }

    #[test]
    fn missing_gateway_fails() {
        let transport = Arc::new(RecordingTransport::default());
        let incident = Incident::builder(1, Utc::now()).build(3).unwrap();
        let event = Event::new(3, EventType::Acknowledge, Utc::now());

        assert!(!medium(&NotifyConfig::default(), Arc::clone(&transport)).send(
            &event,
            &incident,
            &[sms_dest(1, "+4712345678")]
        ));
        assert!(transport.recipients().is_empty());
    }

    #[test]
    fn default_deletability() {
        let m = medium(&NotifyConfig::default(), Arc::default());
        assert!(m.raise_if_not_deletable(&sms_dest(1, "+4712345678").synced(), false).is_ok());
        assert!(m.raise_if_not_deletable(&sms_dest(1, "+4712345678"), true).is_err());
        assert!(m.update(&sms_dest(1, "+4712345678"), &json!({})).is_none());
    }
}
