//! Recovery from backup artifacts once an anomaly trips.
//!
//! Recovery never re-executes the running process. It restores files and
//! reports back; the caller exits with a restart code and leaves the
//! relaunch to whatever supervises it.

mod archiver;

pub use archiver::{Archiver, TarArchiver};

use crate::config::{ProtectorConfig, RecoveryActions};
use crate::error::{ErrorContext, ProtectorError};
use crate::events::{EventBus, MonitorEventPayload};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// What a completed recovery restored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub code_restored: Option<PathBuf>,
    pub system_restored: Option<PathBuf>,
}

pub struct RecoveryManager<A: Archiver> {
    payload_path: PathBuf,
    self_artifact_path: PathBuf,
    archive_path: PathBuf,
    staged_archive_path: PathBuf,
    restore_root: PathBuf,
    actions: RecoveryActions,
    archiver: A,
    events: EventBus,
}

impl<A: Archiver> RecoveryManager<A> {
    pub fn new(config: &ProtectorConfig, archiver: A, events: EventBus) -> Self {
        Self {
            payload_path: config.payload_path(),
            self_artifact_path: config.self_artifact_path.clone(),
            archive_path: config.archive_path(),
            staged_archive_path: config.staged_archive_path(),
            restore_root: config.restore_root.clone(),
            actions: config.recovery_actions,
            archiver,
            events,
        }
    }

    pub fn archiver(&self) -> &A {
        &self.archiver
    }

    /// Fail with `MissingArtifact` if any artifact the configured actions need is absent.
    pub fn preflight(&self) -> Result<(), ProtectorError> {
        if self.actions.restores_code() {
            require_artifact(&self.payload_path)?;
        }
        if self.actions.restores_system() {
            require_artifact(&self.archive_path)?;
        }
        Ok(())
    }

    /// Run the configured recovery steps: code first, then system.
    pub fn recover(&self) -> Result<RecoveryReport, ProtectorError> {
        if let Err(e) = self.preflight() {
            error!("Recovery aborted before any change: {}", e);
            return Err(e);
        }

        let mut report = RecoveryReport::default();

        if self.actions.restores_code() {
            report.code_restored = Some(self.restore_code()?);
        }
        if self.actions.restores_system() {
            report.system_restored = Some(self.recover_system()?);
        }

        Ok(report)
    }

    /// Copy the backup payload over the self artifact path.
    pub fn restore_code(&self) -> Result<PathBuf, ProtectorError> {
        info!("Rewriting code to maintain protection...");

        copy_artifact(&self.payload_path, &self.self_artifact_path)
            .context("Failed to restore self artifact")?;

        self.events.publish(MonitorEventPayload::CodeRestored {
            payload: self.payload_path.clone(),
            target: self.self_artifact_path.clone(),
        });

        Ok(self.self_artifact_path.clone())
    }

    /// Stage the system archive and extract it over the restore root.
    pub fn recover_system(&self) -> Result<PathBuf, ProtectorError> {
        info!("Recovering system to a known good state...");

        if let Some(staging_dir) = self.staged_archive_path.parent() {
            fs::create_dir_all(staging_dir)
                .map_err(|e| ProtectorError::RecoveryFailed(format!("staging directory: {}", e)))?;
        }

        copy_artifact(&self.archive_path, &self.staged_archive_path)
            .context("Failed to stage system archive")?;

        self.archiver
            .extract(&self.staged_archive_path, &self.restore_root)
            .context("System archive extraction")?;

        self.events.publish(MonitorEventPayload::SystemRecovered {
            archive: self.staged_archive_path.clone(),
            root: self.restore_root.clone(),
        });

        Ok(self.restore_root.clone())
    }
}

fn require_artifact(path: &Path) -> Result<(), ProtectorError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ProtectorError::MissingArtifact(path.to_path_buf()))
    }
}

fn copy_artifact(from: &Path, to: &Path) -> Result<(), ProtectorError> {
    match fs::copy(from, to) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound && !from.exists() => {
            Err(ProtectorError::MissingArtifact(from.to_path_buf()))
        }
        Err(e) => Err(ProtectorError::RecoveryFailed(format!(
            "copy {} -> {}: {}",
            from.display(),
            to.display(),
            e
        ))),
    }
}
