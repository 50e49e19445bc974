// Event envelope: server -> client notification, no `id`.

use super::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventParams {
    pub topic: Topic,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,
    pub method: String,
    pub params: EventParams,
}
impl Envelope {
    pub fn new(
        topic: Topic,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            method: format!("event.{topic}"),
            params: EventParams {
                topic,
                timestamp: Utc::now(),
                payload,
            },
        }
    }
}

#[cfg(test)]
mod test_envelope {
    use super::*;

    #[test]
    fn method_is_event_dot_topic() {
        let envelope = Envelope::new(Topic::CameraConnected, serde_json::json!({}));
        assert_eq!(envelope.method, "event.camera.connected");
    }

    #[test]
    fn has_no_id_field_when_serialized() {
        let envelope = Envelope::new(Topic::SnapshotTaken, serde_json::json!({"ok": true}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("id").is_none());
    }
}
