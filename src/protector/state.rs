use crate::hashing::Fingerprint;
use crate::recovery::RecoveryReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last observed fingerprint of every file seen in the watched directory.
///
/// Entries are only ever added or overwritten. Files that disappear keep
/// their stale entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintTable(BTreeMap<String, Fingerprint>);

impl FingerprintTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Fingerprint> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Store `fingerprint` for `name`, returning the previous value
    pub fn insert(&mut self, name: String, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.0.insert(name, fingerprint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Fingerprint)> {
        self.0.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// Modifications seen since the last anomaly trip. New files do not count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounter(u64);

impl ChangeCounter {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn increment(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Strictly greater than: a count equal to the threshold does not trip
    pub fn exceeds(&self, threshold: u32) -> bool {
        self.0 > u64::from(threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Initializing,
    Polling,
    /// Terminal for this process instance
    Recovering,
}

/// Result of one pass over the watched directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub new_files: Vec<String>,
    pub modified: Vec<String>,
    pub skipped: Vec<String>,
    /// Set when a modification tripped the threshold; the pass stops there
    pub anomaly: bool,
}

impl PollOutcome {
    pub fn is_quiet(&self) -> bool {
        self.new_files.is_empty() && self.modified.is_empty() && !self.anomaly
    }
}

/// Process exit status asking the supervisor for a fresh restart
pub const EXIT_RESTART_REQUESTED: u8 = 75;
/// Process exit status when recovery was attempted and failed
pub const EXIT_RECOVERY_FAILED: u8 = 74;

/// Why the monitor loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorExit {
    /// Recovery completed; the process should exit and be restarted
    RestartRequested(RecoveryReport),
}

impl MonitorExit {
    pub fn exit_code(&self) -> u8 {
        match self {
            MonitorExit::RestartRequested(_) => EXIT_RESTART_REQUESTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_threshold_is_strict() {
        let mut counter = ChangeCounter::default();
        for _ in 0..5 {
            counter.increment();
        }
        assert!(!counter.exceeds(5));
        counter.increment();
        assert!(counter.exceeds(5));
        counter.reset();
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_table_insert_returns_previous() {
        let mut table = FingerprintTable::new();
        assert_eq!(table.insert("a".into(), "1".into()), None);
        assert_eq!(table.insert("a".into(), "2".into()), Some("1".to_string()));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_restart_exit_code() {
        let exit = MonitorExit::RestartRequested(RecoveryReport::default());
        assert_eq!(exit.exit_code(), 75);
    }

    #[test]
    fn test_table_serializes_as_map() {
        let mut table = FingerprintTable::new();
        table.insert("b.txt".into(), "bb".into());
        table.insert("a.txt".into(), "aa".into());
        assert_eq!(
            serde_json::to_string(&table).unwrap(),
            r#"{"a.txt":"aa","b.txt":"bb"}"#
        );
    }
}
