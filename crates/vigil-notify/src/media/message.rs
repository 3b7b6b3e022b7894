//! Plain-text notification content.

use std::fmt::Write as _;

use vigil_incident::{EndTime, Event, Incident};

/// Shown instead of an end time for incidents that are still open.
pub const STILL_OPEN: &str = "Still open";

/// The subject line: the configured prefix followed by the event.
#[must_use]
pub fn render_subject(prefix: &str, event: &Event) -> String {
    format!("{prefix}{event}")
}

/// The message body listing the incident's fields.
#[must_use]
pub fn render_body(event: &Event, incident: &Incident, details_url: Option<&str>) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "{event}");
    let _ = writeln!(body);

    if !event.description.is_empty() {
        let _ = writeln!(body, "{}", event.description);
        let _ = writeln!(body);
    }

    let _ = writeln!(body, "description: {}", incident.description);
    let _ = writeln!(body, "source_incident_id: {}", incident.source_incident_id);
    let _ = writeln!(body, "level: {}", incident.level);
    let _ = writeln!(body, "start_time: {}", incident.start_time.to_rfc3339());
    match &incident.end_time {
        Some(EndTime::Infinity) => {
            let _ = writeln!(body, "end_time: {STILL_OPEN}");
        }
        Some(EndTime::At(at)) => {
            let _ = writeln!(body, "end_time: {}", at.to_rfc3339());
        }
        None => {}
    }

    if !incident.tags.is_empty() {
        let tags: Vec<String> = incident.tags.iter().map(ToString::to_string).collect();
        let _ = writeln!(body, "tags: {}", tags.join(", "));
    }
    if let Some(ticket) = &incident.ticket_url {
        let _ = writeln!(body, "ticket_url: {ticket}");
    }
    if let Some(url) = details_url {
        let _ = writeln!(body, "details_url: {url}");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use vigil_incident::{EventType, Tag};

    #[test]
    fn subject_has_prefix_and_event() {
        let event = Event::new(3, EventType::IncidentStart, Utc::now());
        assert_eq!(render_subject("[Vigil] ", &event), "[Vigil] Incident #3: Incident start");
    }

    #[test]
    fn open_incident_is_still_open() {
        let incident = Incident::builder(1, Utc::now())
            .description("disk full")
            .tag(Arc::new(Tag::parse("host=db1").unwrap()))
            .build(3)
            .unwrap();
        let event = Event::new(3, EventType::IncidentStart, Utc::now());
        let body = render_body(&event, &incident, Some("https://vigil/incidents/3"));

        assert!(body.contains("end_time: Still open"));
        assert!(body.contains("description: disk full"));
        assert!(body.contains("tags: host=db1"));
        assert!(body.contains("details_url: https://vigil/incidents/3"));
    }

    #[test]
    fn closed_and_stateless_end_times() {
        let now = Utc::now();
        let closed = Incident::builder(1, now - Duration::hours(1))
            .ended_at(now)
            .build(4)
            .unwrap();
        let event = Event::new(4, EventType::IncidentEnd, now);
        let body = render_body(&event, &closed, None);
        assert!(body.contains(&format!("end_time: {}", now.to_rfc3339())));
        assert!(!body.contains(STILL_OPEN));

        let stateless = Incident::builder(1, now).stateless().build(5).unwrap();
        let body = render_body(&Event::new(5, EventType::Stateless, now), &stateless, None);
        assert!(!body.contains("end_time"));
    }
}
