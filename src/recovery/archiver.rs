use crate::error::ProtectorError;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Capability for unpacking a system archive over a target root.
///
/// The monitor only talks to this trait so recovery can be exercised
/// without touching real system utilities.
pub trait Archiver {
    fn extract(&self, archive: &Path, target_root: &Path) -> Result<(), ProtectorError>;
}

/// Extracts gzip tarballs by running the external `tar` utility.
#[derive(Debug, Clone)]
pub struct TarArchiver {
    program: String,
}

impl TarArchiver {
    pub fn new() -> Self {
        Self::with_program("tar")
    }

    /// Use a different executable with tar-compatible arguments
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for TarArchiver {
    fn extract(&self, archive: &Path, target_root: &Path) -> Result<(), ProtectorError> {
        info!(
            archive = %archive.display(),
            root = %target_root.display(),
            "Extracting system archive"
        );

        let output = Command::new(&self.program)
            .arg("xzf")
            .arg(archive)
            .arg("-C")
            .arg(target_root)
            .output()
            .map_err(|e| {
                ProtectorError::RecoveryFailed(format!(
                    "could not run '{}': {}",
                    self.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProtectorError::RecoveryFailed(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        debug!("Archive extraction finished");
        Ok(())
    }
}
