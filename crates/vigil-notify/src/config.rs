//! Notification configuration.
//!
//! [`NotifyConfig`] is built once at startup and handed to the media
//! registry and the dispatcher. Every field has a default so a partial JSON
//! document is enough.

use serde::{Deserialize, Serialize};
use vigil_schedule::ScheduleEngine;

use crate::error::Result;

/// Default prefix for notification subjects.
pub const DEFAULT_SUBJECT_PREFIX: &str = "[Vigil] ";

/// How outgoing mail leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// Deliver through an SMTP server.
    #[default]
    Smtp,
    /// Write messages to the log instead of sending them.
    Log,
}

/// Transport security for SMTP connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection.
    #[default]
    None,
    /// Upgrade with STARTTLS.
    StartTls,
    /// Implicit TLS.
    Tls,
}

/// SMTP settings shared by the email and SMS media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Which backend delivers mail.
    pub backend: MailBackend,
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Transport security.
    pub security: SmtpSecurity,
    /// Optional SMTP user name.
    pub username: Option<String>,
    /// Optional SMTP password.
    pub password: Option<String>,
    /// Sender address.
    pub from: String,
    /// Seconds to wait for the server before giving up.
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::Smtp,
            host: "localhost".to_string(),
            port: 25,
            security: SmtpSecurity::None,
            username: None,
            password: None,
            from: "vigil@localhost".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmailConfig {
    /// Sets the backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: MailBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets host and port.
    #[must_use]
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the transport security.
    #[must_use]
    pub const fn with_security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    /// Sets SMTP credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the sender address.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }
}

/// SMS delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Email-to-SMS gateway address. SMS delivery is disabled without it.
    pub gateway_address: Option<String>,
}

/// Configuration for notification delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Master switch. When off, dispatch is a no-op.
    pub send_notifications: bool,
    /// IANA timezone recurrence windows are written in.
    pub timezone: String,
    /// Prefix for notification subjects.
    pub subject_prefix: String,
    /// Base URL for incident links in messages.
    pub frontend_url: Option<String>,
    /// Mail settings.
    pub email: EmailConfig,
    /// SMS settings.
    pub sms: SmsConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            send_notifications: false,
            timezone: "UTC".to_string(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            frontend_url: None,
            email: EmailConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

impl NotifyConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Serialization` for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Enables or disables sending.
    #[must_use]
    pub const fn with_send_notifications(mut self, enabled: bool) -> Self {
        self.send_notifications = enabled;
        self
    }

    /// Sets the timezone.
    #[must_use]
    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = tz.into();
        self
    }

    /// Sets the subject prefix.
    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    /// Sets the frontend URL.
    #[must_use]
    pub fn with_frontend_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_url = Some(url.into());
        self
    }

    /// Replaces the email settings.
    #[must_use]
    pub fn with_email(mut self, email: EmailConfig) -> Self {
        self.email = email;
        self
    }

    /// Sets the SMS gateway address.
    #[must_use]
    pub fn with_sms_gateway(mut self, address: impl Into<String>) -> Self {
        self.sms.gateway_address = Some(address.into());
        self
    }

    /// Returns a schedule engine for the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Schedule` for an unknown timezone.
    pub fn schedule_engine(&self) -> Result<ScheduleEngine> {
        Ok(ScheduleEngine::from_name(&self.timezone)?)
    }

    /// Returns the details link for an incident, if a frontend is configured.
    #[must_use]
    pub fn incident_url(&self, incident_id: u64) -> Option<String> {
        self.frontend_url
            .as_ref()
            .map(|base| format!("{}/incidents/{incident_id}", base.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = NotifyConfig::default();
        assert!(!config.send_notifications);
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.subject_prefix, "[Vigil] ");
        assert_eq!(config.email.host, "localhost");
        assert_eq!(config.email.port, 25);
        assert!(config.sms.gateway_address.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = NotifyConfig::from_json(
            r#"{"send_notifications": true, "email": {"host": "smtp.example.com", "security": "starttls"}}"#,
        )
        .unwrap();
        assert!(config.send_notifications);
        assert_eq!(config.email.host, "smtp.example.com");
        assert_eq!(config.email.port, 25);
        assert_eq!(config.email.security, SmtpSecurity::StartTls);
        assert_eq!(config.email.backend, MailBackend::Smtp);
    }

    #[test]
    fn builders() {
        let config = NotifyConfig::default()
            .with_send_notifications(true)
            .with_timezone("Europe/Oslo")
            .with_subject_prefix("[Test] ")
            .with_sms_gateway("sms@gateway.example.com")
            .with_email(
                EmailConfig::default()
                    .with_backend(MailBackend::Log)
                    .with_server("mail", 2525)
                    .with_credentials("u", "p")
                    .with_from("alerts@example.com"),
            );
        assert!(config.send_notifications);
        assert_eq!(config.email.port, 2525);
        assert_eq!(config.email.username.as_deref(), Some("u"));
        assert_eq!(config.sms.gateway_address.as_deref(), Some("sms@gateway.example.com"));
        assert!(config.schedule_engine().is_ok());
    }

    #[test]
    fn invalid_timezone() {
        let config = NotifyConfig::default().with_timezone("Atlantis/Capital");
        assert!(config.schedule_engine().is_err());
    }

    #[test]
    fn incident_url() {
        let config = NotifyConfig::default().with_frontend_url("https://vigil.example.com/");
        assert_eq!(
            config.incident_url(12).as_deref(),
            Some("https://vigil.example.com/incidents/12")
        );
        assert!(NotifyConfig::default().incident_url(12).is_none());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(NotifyConfig::from_json(r#"{"email": {"backend": "pigeon"}}"#).is_err());
    }
}
