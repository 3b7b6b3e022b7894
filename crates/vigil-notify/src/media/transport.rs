//! Outgoing mail transports.
//!
//! Both built-in media deliver by mail: email directly, SMS through an
//! email-to-SMS gateway. [`MailTransport`] is the seam between message
//! rendering and the wire so media can be exercised without a mail server.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, error, info};

use crate::config::{EmailConfig, SmtpSecurity};
use crate::error::{NotifyError, Result};

/// A rendered plain-text message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Delivers rendered mail.
pub trait MailTransport: Send + Sync + fmt::Debug {
    /// Sends a single message.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Configuration` when delivery cannot work at all,
    /// and `NotifyError::TransientDelivery` when this message failed.
    fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// SMTP delivery through `lettre`.
#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    host: String,
    port: u16,
    from: Option<Mailbox>,
    transport: Option<SmtpTransport>,
    problem: Option<String>,
}

impl SmtpMailTransport {
    /// Builds the transport.
    ///
    /// Invalid settings do not fail construction: they are reported as a
    /// configuration error on every send instead.
    #[must_use]
    pub fn new(config: &EmailConfig) -> Self {
        let from = config.from.parse::<Mailbox>().ok();
        let (transport, problem) = match Self::build(config) {
            Ok(transport) => (Some(transport), None),
            Err(reason) => (None, Some(reason)),
        };
        let problem = problem.or_else(|| {
            from.is_none()
                .then(|| format!("sender address '{}' is invalid", config.from))
        });
        if let Some(reason) = &problem {
            error!(host = %config.host, port = config.port, %reason, "email transport is not usable");
        }

        Self {
            host: config.host.clone(),
            port: config.port,
            from,
            transport,
            problem,
        }
    }

    fn build(config: &EmailConfig) -> std::result::Result<SmtpTransport, String> {
        if config.host.trim().is_empty() {
            return Err("email host is not set".to_string());
        }
        if config.port == 0 {
            return Err("email port is not set".to_string());
        }

        let builder = match config.security {
            SmtpSecurity::None => SmtpTransport::builder_dangerous(&config.host),
            SmtpSecurity::StartTls => SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| format!("failed to create SMTP transport: {e}"))?,
            SmtpSecurity::Tls => SmtpTransport::relay(&config.host)
                .map_err(|e| format!("failed to create SMTP transport: {e}"))?,
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }
        Ok(builder.build())
    }

    fn message(&self, from: &Mailbox, mail: &OutgoingMail) -> Result<Message> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::TransientDelivery {
                reason: format!("invalid recipient '{}': {e}", mail.to),
            })?;
        Message::builder()
            .from(from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| NotifyError::TransientDelivery {
                reason: format!("failed to build message: {e}"),
            })
    }
}

impl MailTransport for SmtpMailTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            let reason = self
                .problem
                .clone()
                .unwrap_or_else(|| "email transport is not configured".to_string());
            return Err(NotifyError::configuration(reason));
        };

        let message = self.message(from, mail)?;
        match transport.send(&message) {
            Ok(_) => {
                debug!(to = %mail.to, "email sent");
                Ok(())
            }
            Err(e) => {
                if is_connection_refused(&e) {
                    error!(host = %self.host, port = self.port, "connection refused by mail server");
                } else {
                    error!(to = %mail.to, error = %e, "failed to send email");
                }
                Err(NotifyError::TransientDelivery {
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Returns true if an I/O "connection refused" is anywhere in the error chain.
fn is_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "MAIL");
        debug!(body = %mail.body, "mail body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: "ops@example.com".to_string(),
            subject: "[Vigil] Incident #1: Incident start".to_string(),
            body: "body".to_string(),
        }
    }

    #[test]
    fn log_transport_always_succeeds() {
        assert!(LogTransport.send(&mail()).is_ok());
    }

    #[test]
    fn missing_host_is_a_configuration_error() {
        let config = EmailConfig::default().with_server("", 25);
        let transport = SmtpMailTransport::new(&config);
        assert!(matches!(
            transport.send(&mail()),
            Err(NotifyError::Configuration { .. })
        ));
    }

    #[test]
    fn invalid_sender_is_a_configuration_error() {
        let config = EmailConfig::default().with_from("not an address");
        let transport = SmtpMailTransport::new(&config);
        assert!(matches!(
            transport.send(&mail()),
            Err(NotifyError::Configuration { .. })
        ));
    }

    #[test]
    fn connection_refused_is_found_in_chain() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(is_connection_refused(&err));

        let other = io::Error::other("boom");
        assert!(!is_connection_refused(&other));
    }
}
