use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InFlight,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InFlight => "in_flight",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_flight" => Some(TaskStatus::InFlight),
            "done" => Some(TaskStatus::Done),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

/// A captured scan waiting for classification and archival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTask {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub payload_name: String,
    /// Captured image as a self-describing data URI, replayable to the
    /// classifier without any live file handle.
    pub payload_data: String,
    pub status: TaskStatus,
    pub retry_count: i32,
}

/// Outcome of one sync pass. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub succeeded: bool,
    pub message: String,
    pub synced_count: u32,
}

impl SyncResult {
    pub fn skipped(message: &str) -> Self {
        Self {
            succeeded: false,
            message: message.to_string(),
            synced_count: 0,
        }
    }
}

/// Classifier verdict for one captured image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub crop_type: String,
    pub is_healthy: bool,
    pub disease_name: Option<String>,
    pub disease_type: Option<String>,
    pub confidence: f64,
    pub observations: Option<String>,
}

/// Row appended to the scan history archive after a successful
/// classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub captured_at: DateTime<Utc>,
    pub payload_name: String,
    pub payload_preview: String,
    pub disease_label: String,
    pub disease_type: String,
    pub confidence: String,
    pub crop_type: String,
}

impl ScanRecord {
    pub fn from_classification(task: &PendingTask, classification: &Classification) -> Self {
        let disease_label = if classification.is_healthy {
            "Healthy".to_string()
        } else {
            classification
                .disease_name
                .clone()
                .unwrap_or_else(|| "Unknown disease".to_string())
        };
        let disease_type = classification
            .disease_type
            .clone()
            .unwrap_or_else(|| "healthy".to_string());
        Self {
            captured_at: task.created_at,
            payload_name: task.payload_name.clone(),
            payload_preview: task.payload_data.clone(),
            disease_label,
            disease_type,
            confidence: format!("{:.1}%", classification.confidence * 100.0),
            crop_type: classification.crop_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> PendingTask {
        PendingTask {
            id: "1-abc".into(),
            created_at: Utc::now(),
            payload_name: "leaf.jpg".into(),
            payload_data: "data:image/jpeg;base64,QUJD".into(),
            status: TaskStatus::Pending,
            retry_count: 0,
        }
    }

    #[test]
    fn status_round_trip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::InFlight,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse_status(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse_status("bogus"), None);
    }

    #[test]
    fn record_labels_unhealthy_scan() {
        let c = Classification {
            crop_type: "Tomato".into(),
            is_healthy: false,
            disease_name: Some("Late blight".into()),
            disease_type: Some("fungal".into()),
            confidence: 0.973,
            observations: None,
        };
        let r = ScanRecord::from_classification(&task(), &c);
        assert_eq!(r.disease_label, "Late blight");
        assert_eq!(r.disease_type, "fungal");
        assert_eq!(r.confidence, "97.3%");
        assert_eq!(r.crop_type, "Tomato");
    }

    #[test]
    fn record_labels_healthy_scan() {
        let c = Classification {
            crop_type: "Maize".into(),
            is_healthy: true,
            disease_name: None,
            disease_type: None,
            confidence: 0.88,
            observations: Some("no visible lesions".into()),
        };
        let r = ScanRecord::from_classification(&task(), &c);
        assert_eq!(r.disease_label, "Healthy");
        assert_eq!(r.disease_type, "healthy");
        assert_eq!(r.confidence, "88.0%");
    }

    #[test]
    fn record_falls_back_on_missing_disease_name() {
        let c = Classification {
            crop_type: "Potato".into(),
            is_healthy: false,
            disease_name: None,
            disease_type: None,
            confidence: 0.5,
            observations: None,
        };
        let r = ScanRecord::from_classification(&task(), &c);
        assert_eq!(r.disease_label, "Unknown disease");
        assert_eq!(r.disease_type, "healthy");
    }
}
