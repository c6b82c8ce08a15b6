//! The polling monitor: baseline, change detection, anomaly threshold and
//! the hand-off to recovery.

mod state;

pub use state::{
    ChangeCounter, FingerprintTable, MonitorExit, MonitorState, PollOutcome,
    EXIT_RECOVERY_FAILED, EXIT_RESTART_REQUESTED,
};

use crate::config::{ProtectorConfig, ScanErrorPolicy};
use crate::error::ProtectorError;
use crate::events::{EventBus, MonitorEventPayload};
use crate::hashing::{compute_fingerprint, Fingerprint};
use crate::recovery::{Archiver, RecoveryManager, RecoveryReport, TarArchiver};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct DirectoryProtector<A: Archiver = TarArchiver> {
    config: ProtectorConfig,
    fingerprints: FingerprintTable,
    change_counter: ChangeCounter,
    state: MonitorState,
    events: EventBus,
    recovery: RecoveryManager<A>,
}

impl DirectoryProtector<TarArchiver> {
    /// Monitor that extracts system archives with the `tar` utility
    pub fn new(config: ProtectorConfig, events: EventBus) -> Result<Self, ProtectorError> {
        Self::with_archiver(config, TarArchiver::new(), events)
    }
}

impl<A: Archiver> DirectoryProtector<A> {
    pub fn with_archiver(
        config: ProtectorConfig,
        archiver: A,
        events: EventBus,
    ) -> Result<Self, ProtectorError> {
        config.validate()?;
        let recovery = RecoveryManager::new(&config, archiver, events.clone());

        Ok(Self {
            config,
            fingerprints: FingerprintTable::new(),
            change_counter: ChangeCounter::default(),
            state: MonitorState::Initializing,
            events,
            recovery,
        })
    }

    pub fn config(&self) -> &ProtectorConfig {
        &self.config
    }

    pub fn fingerprints(&self) -> &FingerprintTable {
        &self.fingerprints
    }

    pub fn change_count(&self) -> u64 {
        self.change_counter.value()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn recovery(&self) -> &RecoveryManager<A> {
        &self.recovery
    }

    /// Fingerprint every current entry of the watched directory.
    ///
    /// Returns the number of files recorded.
    pub fn initialize_baseline(&mut self) -> Result<usize, ProtectorError> {
        self.state = MonitorState::Initializing;
        self.fingerprints.clear();

        for (name, path) in list_entries(&self.config.watch_dir)? {
            if let Some(fingerprint) = self.fingerprint_entry(&name, &path)? {
                self.fingerprints.insert(name, fingerprint);
            }
        }

        info!(
            dir = %self.config.watch_dir.display(),
            files = self.fingerprints.len(),
            "Baseline recorded"
        );
        self.state = MonitorState::Polling;
        Ok(self.fingerprints.len())
    }

    /// One pass over the watched directory.
    ///
    /// Deleted files are not reported and keep their entry. The pass stops
    /// at the modification that trips the anomaly threshold.
    pub fn poll_once(&mut self) -> Result<PollOutcome, ProtectorError> {
        let mut outcome = PollOutcome::default();

        for (name, path) in list_entries(&self.config.watch_dir)? {
            let Some(current) = self.fingerprint_entry(&name, &path)? else {
                outcome.skipped.push(name);
                continue;
            };

            match self.fingerprints.get(&name) {
                None => {
                    info!("New file detected: {}", name);
                    self.events.publish(MonitorEventPayload::NewFile {
                        name: name.clone(),
                        fingerprint: current.clone(),
                    });
                    self.fingerprints.insert(name.clone(), current);
                    outcome.new_files.push(name);
                }
                Some(previous) if *previous != current => {
                    info!("File modified: {}", name);
                    let previous = previous.clone();
                    self.fingerprints.insert(name.clone(), current.clone());
                    let change_count = self.change_counter.increment();
                    self.events.publish(MonitorEventPayload::FileModified {
                        name: name.clone(),
                        previous,
                        current,
                        change_count,
                    });
                    outcome.modified.push(name);

                    if self.evaluate_anomaly() {
                        self.state = MonitorState::Recovering;
                        outcome.anomaly = true;
                        break;
                    }
                }
                Some(_) => {}
            }
        }

        if outcome.is_quiet() {
            debug!("No changes detected");
        }

        Ok(outcome)
    }

    /// True (and the counter is reset) when the change count is strictly
    /// above the threshold.
    pub fn evaluate_anomaly(&mut self) -> bool {
        if !self.change_counter.exceeds(self.config.threshold) {
            return false;
        }

        let change_count = self.change_counter.value();
        warn!(change_count, threshold = self.config.threshold, "Anomaly detected!");
        self.events.publish(MonitorEventPayload::AnomalyDetected {
            change_count,
            threshold: self.config.threshold,
        });
        self.change_counter.reset();
        true
    }

    /// Run the configured recovery steps.
    pub fn recover(&mut self) -> Result<RecoveryReport, ProtectorError> {
        self.state = MonitorState::Recovering;
        self.recovery.recover()
    }

    /// Record the baseline, then poll until an anomaly triggers recovery.
    ///
    /// Returns only when recovery finished or an error stopped the loop.
    pub async fn run(&mut self) -> Result<MonitorExit, ProtectorError> {
        self.initialize_baseline()?;
        self.watch().await
    }

    /// Poll loop over an already recorded baseline.
    pub async fn watch(&mut self) -> Result<MonitorExit, ProtectorError> {
        self.state = MonitorState::Polling;
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            threshold = self.config.threshold,
            "Monitoring {}",
            self.config.watch_dir.display()
        );

        loop {
            tokio::time::sleep(self.config.check_interval).await;

            let outcome = self.poll_once()?;
            if outcome.anomaly {
                let report = self.recover()?;
                info!("Recovery complete, requesting restart");
                return Ok(MonitorExit::RestartRequested(report));
            }
        }
    }

    /// Hash one entry, applying the scan error policy.
    ///
    /// `Ok(None)` means the file was skipped.
    fn fingerprint_entry(
        &self,
        name: &str,
        path: &Path,
    ) -> Result<Option<Fingerprint>, ProtectorError> {
        match compute_fingerprint(path) {
            Ok(fingerprint) => Ok(Some(fingerprint)),
            Err(e) => match self.config.scan_error_policy {
                ScanErrorPolicy::Abort => Err(e),
                ScanErrorPolicy::Skip => {
                    warn!("Skipping {}: {}", name, e);
                    self.events.publish(MonitorEventPayload::ScanError {
                        name: name.to_string(),
                        reason: e.to_string(),
                    });
                    Ok(None)
                }
            },
        }
    }
}

/// Regular files directly inside `dir`, sorted by name.
///
/// Entries the walker cannot stat (dangling symlinks, permission errors)
/// are still returned so hashing them reports the failure. Names that are
/// not valid UTF-8 are skipped.
pub fn list_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>, ProtectorError> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let path = match entry {
            Ok(entry) if entry.file_type().is_file() => entry.into_path(),
            Ok(entry) => {
                debug!(path = %entry.path().display(), "Skipping non-file entry");
                continue;
            }
            Err(e) if e.depth() == 0 => {
                return Err(ProtectorError::Io(e.into()));
            }
            Err(e) => match e.path() {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            },
        };

        let name = path.file_name().and_then(|name| name.to_str()).map(str::to_owned);
        match name {
            Some(name) => entries.push((name, path)),
            None => warn!(path = %path.display(), "Skipping entry with non UTF-8 name"),
        }
    }

    Ok(entries)
}

/// Fingerprint table for `dir` without starting a monitor.
pub fn snapshot_directory(dir: &Path) -> Result<FingerprintTable, ProtectorError> {
    let mut table = FingerprintTable::new();
    for (name, path) in list_entries(dir)? {
        table.insert(name, compute_fingerprint(&path)?);
    }
    Ok(table)
}
