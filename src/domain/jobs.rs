use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A transcode task as published on the queue.
///
/// Wire format is the producer's: `{"ID": .., "FilePath": .., "Timestamp": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "FilePath")]
    pub file_path: String,
    #[serde(rename = "Timestamp", deserialize_with = "timestamp")]
    pub enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn request(&self) -> TranscodeRequest {
        TranscodeRequest {
            path: self.file_path.clone(),
            video_id: self.id.clone(),
        }
    }
}

/// Accepts RFC3339 strings or epoch seconds, whole or fractional.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Epoch(i64),
        FractionalEpoch(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        Raw::Epoch(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("epoch out of range: {}", secs))),
        Raw::FractionalEpoch(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            if !secs.is_finite() || whole < i64::MIN as f64 || whole > i64::MAX as f64 {
                return Err(serde::de::Error::custom(format!("epoch out of range: {}", secs)));
            }
            Utc.timestamp_opt(whole as i64, nanos)
                .single()
                .ok_or_else(|| serde::de::Error::custom(format!("epoch out of range: {}", secs)))
        }
    }
}

/// Body of the orchestration trigger (`POST /api/v1/video-transcode`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub path: String,
    pub video_id: String,
}

impl TranscodeRequest {
    pub fn source(&self) -> &Path {
        Path::new(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// The orchestrator ran the job past probing.
    Accepted,
    /// The orchestrator answered but refused the job (probe failure).
    Rejected,
}

/// What the orchestrator answered. Receiving one at all means the transport worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub video_id: String,
    pub status: TriggerStatus,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_rfc3339_timestamp() {
        let payload = json!({
            "ID": "42",
            "FilePath": "/media/42/in.mp4",
            "Timestamp": "2024-03-01T10:15:00Z"
        });
        let task = Task::from_payload(payload.to_string().as_bytes()).unwrap();
        assert_eq!(task.id, "42");
        assert_eq!(task.file_path, "/media/42/in.mp4");
        assert_eq!(task.enqueued_at.to_rfc3339(), "2024-03-01T10:15:00+00:00");
    }

    #[test]
    fn decodes_epoch_timestamp() {
        let payload = json!({"ID": "7", "FilePath": "a.mp4", "Timestamp": 1_700_000_000});
        let task = Task::from_payload(payload.to_string().as_bytes()).unwrap();
        assert_eq!(task.enqueued_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn decodes_fractional_epoch_timestamp() {
        let payload = json!({"ID": "7", "FilePath": "a.mp4", "Timestamp": 1_700_000_000.25});
        let task = Task::from_payload(payload.to_string().as_bytes()).unwrap();
        assert_eq!(task.enqueued_at.timestamp(), 1_700_000_000);
        assert_eq!(task.enqueued_at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_missing_fields_and_garbage() {
        assert!(Task::from_payload(br#"{"ID": "1"}"#).is_err());
        assert!(Task::from_payload(b"not json").is_err());
        assert!(Task::from_payload(br#"{"ID": "1", "FilePath": "x", "Timestamp": "yesterday"}"#).is_err());
    }

    #[test]
    fn payload_uses_producer_field_names() {
        let task = Task::new("42", "/media/42/in.mp4");
        let value: serde_json::Value = serde_json::from_slice(&task.to_payload().unwrap()).unwrap();
        assert_eq!(value["ID"], "42");
        assert_eq!(value["FilePath"], "/media/42/in.mp4");
        assert!(value["Timestamp"].is_string());
        assert_eq!(Task::from_payload(&task.to_payload().unwrap()).unwrap(), task);
    }

    #[test]
    fn request_maps_task_fields() {
        let request = Task::new("9", "/srv/in.mov").request();
        assert_eq!(request.video_id, "9");
        assert_eq!(request.source(), Path::new("/srv/in.mov"));
    }
}
