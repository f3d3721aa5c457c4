use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::processor_events::EventParseError;

/// The outer shape shared by every processor notification. The object is left untyped until the event type is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    /// The connected account the event belongs to. Absent for events on the platform account itself.
    #[serde(default)]
    pub account: Option<String>,
    /// Unix timestamp (seconds) at which the processor created the event
    #[serde(default)]
    pub created: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEnvelope {
    pub fn parse(payload: &str) -> Result<Self, EventParseError> {
        let envelope: Self =
            serde_json::from_str(payload).map_err(|e| EventParseError::MalformedEnvelope(e.to_string()))?;
        if envelope.id.trim().is_empty() {
            return Err(EventParseError::MalformedEnvelope("The event id is empty".into()));
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_connect_envelope() {
        let json = r#"{"id":"evt_1","type":"payout.paid","account":"acct_1","created":1710000000,
            "data":{"object":{"id":"po_1"}},"livemode":false}"#;
        let env = WebhookEnvelope::parse(json).unwrap();
        assert_eq!(env.id, "evt_1");
        assert_eq!(env.event_type, "payout.paid");
        assert_eq!(env.account.as_deref(), Some("acct_1"));
        assert_eq!(env.data.object["id"], "po_1");
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(WebhookEnvelope::parse(r#"{"type":"charge.succeeded","data":{"object":{}}}"#).is_err());
        assert!(WebhookEnvelope::parse(r#"{"id":"","type":"x","data":{"object":{}}}"#).is_err());
        assert!(WebhookEnvelope::parse("not json").is_err());
    }
}
