use std::path::PathBuf;
use thiserror::Error;

/// DirGuard monitor errors
#[derive(Debug, Error)]
pub enum ProtectorError {
    /// Configuration errors (bad threshold, missing directories, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file in the watched directory could not be fingerprinted
    #[error("Failed to fingerprint '{}': {source}", .path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A backup artifact required for recovery is not present
    #[error("Missing backup artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// A recovery step ran but did not complete
    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtectorError {
    /// Whether this error was raised while carrying out recovery.
    pub fn is_recovery_error(&self) -> bool {
        matches!(
            self,
            ProtectorError::MissingArtifact(_) | ProtectorError::RecoveryFailed(_)
        )
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, ProtectorError>;
}

impl<T, E: Into<ProtectorError>> ErrorContext<T> for Result<T, E> {
    fn context(self, msg: &str) -> Result<T, ProtectorError> {
        self.map_err(|e| {
            let err: ProtectorError = e.into();
            match err {
                ProtectorError::Config(s) => ProtectorError::Config(format!("{}: {}", msg, s)),
                ProtectorError::RecoveryFailed(s) => {
                    ProtectorError::RecoveryFailed(format!("{}: {}", msg, s))
                }
                ProtectorError::Io(e) => {
                    ProtectorError::Io(std::io::Error::new(e.kind(), format!("{}: {}", msg, e)))
                }
                other => other,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtectorError::Config("threshold must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: threshold must be at least 1"
        );
    }

    #[test]
    fn test_missing_artifact_display() {
        let err = ProtectorError::MissingArtifact(PathBuf::from("/backup/system_backup.tar.gz"));
        assert_eq!(
            err.to_string(),
            "Missing backup artifact: /backup/system_backup.tar.gz"
        );
        assert!(err.is_recovery_error());
    }

    #[test]
    fn test_error_context() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        let result = result.context("Failed to copy payload");

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("I/O error"));
        assert!(err_msg.contains("Failed to copy payload"));
    }

    #[test]
    fn test_recovery_context_prefixes_message() {
        let result: Result<(), ProtectorError> =
            Err(ProtectorError::RecoveryFailed("tar exited with 2".to_string()));
        let err = result.context("System restore").unwrap_err();
        assert_eq!(err.to_string(), "Recovery failed: System restore: tar exited with 2");
        assert!(!ProtectorError::Config("x".into()).is_recovery_error());
    }
}
