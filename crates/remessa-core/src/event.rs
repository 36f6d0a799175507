use serde::{Deserialize, Serialize};

use crate::job::DeliveryStatus;

/// Known delivery event taxonomy. Wire values are `email.<kind>`.
///
/// Unknown wire values are accepted at the webhook boundary but not
/// processed, so new provider event types never break ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Sent,
    Delivered,
    DeliveryDelayed,
    Complained,
    Bounced,
    Opened,
    Clicked,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Sent,
        EventType::Delivered,
        EventType::DeliveryDelayed,
        EventType::Complained,
        EventType::Bounced,
        EventType::Opened,
        EventType::Clicked,
    ];

    /// Parse a wire event type. Returns `None` for unrecognized values.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "email.sent" => Some(EventType::Sent),
            "email.delivered" => Some(EventType::Delivered),
            "email.delivery_delayed" => Some(EventType::DeliveryDelayed),
            "email.complained" => Some(EventType::Complained),
            "email.bounced" => Some(EventType::Bounced),
            "email.opened" => Some(EventType::Opened),
            "email.clicked" => Some(EventType::Clicked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Sent => "email.sent",
            EventType::Delivered => "email.delivered",
            EventType::DeliveryDelayed => "email.delivery_delayed",
            EventType::Complained => "email.complained",
            EventType::Bounced => "email.bounced",
            EventType::Opened => "email.opened",
            EventType::Clicked => "email.clicked",
        }
    }

    /// The delivery-status projection this event writes onto a sent job.
    /// `email.sent` carries no new information beyond the send state itself.
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        match self {
            EventType::Sent => None,
            EventType::Delivered => Some(DeliveryStatus::Delivered),
            EventType::DeliveryDelayed => Some(DeliveryStatus::DeliveryDelayed),
            EventType::Complained => Some(DeliveryStatus::Complained),
            EventType::Bounced => Some(DeliveryStatus::Bounced),
            EventType::Opened => Some(DeliveryStatus::Opened),
            EventType::Clicked => Some(DeliveryStatus::Clicked),
        }
    }
}

/// Event-specific payload fields. Everything beyond the correlation fields is
/// carried opaquely in `extra` (bounce reason, click URL, open IP, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventData {
    pub email_id: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An asynchronous provider callback describing one delivery-lifecycle event.
///
/// Providers do not guarantee delivery order and may replay events; recording
/// uses a deterministic key so replays overwrite their own record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub data: EventData,
}

/// Suppression list entry: an address a tenant must never email again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuppressionEntry {
    pub email: String,
    pub reason: String,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_all_known_types() {
        for ty in EventType::ALL {
            assert_eq!(EventType::parse(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn parse_rejects_unknown_types() {
        assert_eq!(EventType::parse("email.snoozed"), None);
        assert_eq!(EventType::parse("contact.created"), None);
        assert_eq!(EventType::parse(""), None);
    }

    #[test]
    fn sent_event_has_no_delivery_projection() {
        assert_eq!(EventType::Sent.delivery_status(), None);
        assert_eq!(
            EventType::Bounced.delivery_status(),
            Some(DeliveryStatus::Bounced)
        );
    }

    #[test]
    fn event_deserializes_with_event_specific_extras() {
        let json = r#"{
            "type": "email.bounced",
            "created_at": "2025-01-02T03:04:05.000Z",
            "data": {
                "email_id": "msg_123",
                "to": ["user@example.com"],
                "bounce_type": "hard",
                "bounce_reason": "mailbox does not exist"
            }
        }"#;
        let event: DeliveryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "email.bounced");
        assert_eq!(event.data.email_id.as_deref(), Some("msg_123"));
        assert_eq!(event.data.to, vec!["user@example.com"]);
        assert_eq!(
            event.data.extra.get("bounce_type").and_then(|v| v.as_str()),
            Some("hard")
        );
    }
}
