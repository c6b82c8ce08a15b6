use crate::error::ProtectorError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_THRESHOLD: u32 = 5;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 10;

/// Well-known artifact names inside the backup directory
pub const DEFAULT_PAYLOAD_NAME: &str = "self_payload";
pub const DEFAULT_ARCHIVE_NAME: &str = "system_backup.tar.gz";

/// Which recovery steps run when an anomaly trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryActions {
    /// Restore the self artifact, then the system archive
    #[default]
    Both,
    CodeOnly,
    SystemOnly,
}

impl RecoveryActions {
    pub fn restores_code(self) -> bool {
        matches!(self, RecoveryActions::Both | RecoveryActions::CodeOnly)
    }

    pub fn restores_system(self) -> bool {
        matches!(self, RecoveryActions::Both | RecoveryActions::SystemOnly)
    }
}

/// What a poll pass does when a file cannot be hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanErrorPolicy {
    /// Log the failure, skip the file and continue the pass
    #[default]
    Skip,
    /// Propagate the failure and stop monitoring
    Abort,
}

/// Immutable settings for one monitor instance.
#[derive(Debug, Clone)]
pub struct ProtectorConfig {
    pub watch_dir: PathBuf,
    pub backup_dir: PathBuf,
    /// Location the self-replacement payload is copied over
    pub self_artifact_path: PathBuf,
    pub threshold: u32,
    pub check_interval: Duration,
    pub payload_name: String,
    pub archive_name: String,
    pub staging_dir: PathBuf,
    pub restore_root: PathBuf,
    pub recovery_actions: RecoveryActions,
    pub scan_error_policy: ScanErrorPolicy,
}

impl ProtectorConfig {
    pub fn new(
        watch_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        self_artifact_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            backup_dir: backup_dir.into(),
            self_artifact_path: self_artifact_path.into(),
            threshold: DEFAULT_THRESHOLD,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            payload_name: DEFAULT_PAYLOAD_NAME.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            staging_dir: std::env::temp_dir(),
            restore_root: PathBuf::from("/"),
            recovery_actions: RecoveryActions::default(),
            scan_error_policy: ScanErrorPolicy::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval = Duration::from_secs(secs);
        self
    }

    pub fn payload_path(&self) -> PathBuf {
        self.backup_dir.join(&self.payload_name)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.backup_dir.join(&self.archive_name)
    }

    pub fn staged_archive_path(&self) -> PathBuf {
        self.staging_dir.join(&self.archive_name)
    }

    /// Check the settings before a monitor is built from them.
    ///
    /// Backup artifacts are not checked here: they only have to exist at
    /// the moment recovery triggers.
    pub fn validate(&self) -> Result<(), ProtectorError> {
        if self.threshold < 1 {
            return Err(ProtectorError::Config(
                "threshold must be at least 1".to_string(),
            ));
        }

        if self.check_interval < Duration::from_secs(1) {
            return Err(ProtectorError::Config(
                "check interval must be at least 1 second".to_string(),
            ));
        }

        require_dir(&self.watch_dir, "watched directory")?;
        require_dir(&self.backup_dir, "backup directory")?;

        if self.payload_name.is_empty() || self.archive_name.is_empty() {
            return Err(ProtectorError::Config(
                "artifact names must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn require_dir(path: &Path, label: &str) -> Result<(), ProtectorError> {
    if !path.is_dir() {
        return Err(ProtectorError::Config(format!(
            "{} does not exist or is not a directory: {}",
            label,
            path.display()
        )));
    }
    Ok(())
}

pub fn get_app_dir() -> Result<PathBuf, ProtectorError> {
    dirs::home_dir()
        .map(|home_dir| home_dir.join(".dirguard"))
        .ok_or_else(|| ProtectorError::Config("Could not find home directory".to_string()))
}

pub fn get_logs_dir() -> Result<PathBuf, ProtectorError> {
    Ok(get_app_dir()?.join("logs"))
}

/// Create the logs directory (owner-only on Unix) if it does not exist yet.
pub fn ensure_logs_dir(logs_dir: &Path) -> Result<(), ProtectorError> {
    if !logs_dir.exists() {
        fs::create_dir_all(logs_dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(logs_dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(logs_dir, permissions)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid_config() -> (tempfile::TempDir, ProtectorConfig) {
        let temp_dir = tempdir().unwrap();
        let watch = temp_dir.path().join("watch");
        let backup = temp_dir.path().join("backup");
        fs::create_dir_all(&watch).unwrap();
        fs::create_dir_all(&backup).unwrap();
        let config = ProtectorConfig::new(watch, backup, temp_dir.path().join("self.bin"));
        (temp_dir, config)
    }

    #[test]
    fn test_defaults() {
        let config = ProtectorConfig::new("/w", "/b", "/s");
        assert_eq!(config.threshold, 5);
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert_eq!(config.recovery_actions, RecoveryActions::Both);
        assert_eq!(config.scan_error_policy, ScanErrorPolicy::Skip);
        assert_eq!(config.restore_root, PathBuf::from("/"));
        assert_eq!(
            config.archive_path(),
            PathBuf::from("/b/system_backup.tar.gz")
        );
    }

    #[test]
    fn test_validate_accepts_existing_dirs() {
        let (_temp_dir, config) = valid_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let (_temp_dir, config) = valid_config();
        let err = config.with_threshold(0).validate().unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let (_temp_dir, config) = valid_config();
        let err = config.with_check_interval_secs(0).validate().unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_validate_rejects_missing_watch_dir() {
        let (temp_dir, mut config) = valid_config();
        config.watch_dir = temp_dir.path().join("nope");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watched directory"));
    }

    #[test]
    fn test_recovery_actions() {
        assert!(RecoveryActions::Both.restores_code());
        assert!(RecoveryActions::Both.restores_system());
        assert!(!RecoveryActions::CodeOnly.restores_system());
        assert!(!RecoveryActions::SystemOnly.restores_code());
    }

    #[test]
    fn test_ensure_logs_dir_creates_directory() {
        let temp_dir = tempdir().unwrap();
        let logs = temp_dir.path().join("a").join("logs");
        ensure_logs_dir(&logs).unwrap();
        assert!(logs.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&logs).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
