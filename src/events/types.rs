use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sequence number for ordering events
pub type EventSequence = u64;

/// Notification emitted by the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub payload: MonitorEventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEventPayload {
    /// A file appeared that was not in the fingerprint table
    NewFile { name: String, fingerprint: String },

    /// A known file's fingerprint changed
    FileModified {
        name: String,
        previous: String,
        current: String,
        change_count: u64,
    },

    /// The change counter went past the threshold
    AnomalyDetected { change_count: u64, threshold: u32 },

    /// The self artifact was overwritten from the backup payload
    CodeRestored { payload: PathBuf, target: PathBuf },

    /// The system archive was extracted over the restore root
    SystemRecovered { archive: PathBuf, root: PathBuf },

    /// A file could not be fingerprinted and was skipped
    ScanError { name: String, reason: String },
}

impl MonitorEvent {
    pub fn payload_type(&self) -> &str {
        match &self.payload {
            MonitorEventPayload::NewFile { .. } => "new_file",
            MonitorEventPayload::FileModified { .. } => "file_modified",
            MonitorEventPayload::AnomalyDetected { .. } => "anomaly_detected",
            MonitorEventPayload::CodeRestored { .. } => "code_restored",
            MonitorEventPayload::SystemRecovered { .. } => "system_recovered",
            MonitorEventPayload::ScanError { .. } => "scan_error",
        }
    }

    /// File name the event refers to, if any
    pub fn file_name(&self) -> Option<&str> {
        match &self.payload {
            MonitorEventPayload::NewFile { name, .. }
            | MonitorEventPayload::FileModified { name, .. }
            | MonitorEventPayload::ScanError { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let payload = MonitorEventPayload::AnomalyDetected {
            change_count: 6,
            threshold: 5,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "anomaly_detected");
        assert_eq!(json["change_count"], 6);
    }

    #[test]
    fn test_file_name_accessor() {
        let event = MonitorEvent {
            sequence: 1,
            timestamp: Utc::now(),
            payload: MonitorEventPayload::NewFile {
                name: "a.txt".to_string(),
                fingerprint: "00".to_string(),
            },
        };
        assert_eq!(event.file_name(), Some("a.txt"));
        assert_eq!(event.payload_type(), "new_file");
    }
}
