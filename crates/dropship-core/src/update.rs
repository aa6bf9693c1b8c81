use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use dropship_platform::{InstallPaths, Platform, is_process_running};

use crate::archive::{self, ArchiveError};
use crate::discovery::{FetchError, VersionSource};
use crate::version::ReleaseVersion;

/// How one `check_and_update` run ended. Only `Updated` mutated the
/// installation; everything else is a no-op from the filesystem's point of
/// view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated,
    Declined,
    BlockedByRunningProcess,
    NoRemoteVersion,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to check for a running process: {0}")]
    ProcessCheck(#[source] std::io::Error),
    /// Failure after the backup move started. The live installation may be
    /// incomplete; the backup directory (and, past the download step, the
    /// archive) are left on disk for manual recovery.
    #[error("update failed during {stage}; backup kept at {backup}: {details}")]
    PartialApply {
        stage: &'static str,
        backup: String,
        details: String,
    },
}

impl UpdateError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Self-update for one installed copy of the application.
pub struct UpdateClient {
    source: Box<dyn VersionSource>,
    paths: InstallPaths,
    platform: Platform,
    /// Executable file name to look for before touching the install
    /// directory, on platforms where a running process locks its image.
    guarded_binary: Option<String>,
}

impl UpdateClient {
    #[must_use]
    pub fn new(
        source: Box<dyn VersionSource>,
        paths: InstallPaths,
        platform: Platform,
        guarded_binary: Option<String>,
    ) -> Self {
        Self {
            source,
            paths,
            platform,
            guarded_binary,
        }
    }

    /// Compare the installed version against the remote latest and, with
    /// the operator's approval, replace the installation in place.
    ///
    /// Apply ordering contract: extraction never starts before the backup
    /// move succeeded, and the downloaded archive is only deleted after
    /// extraction succeeded. A failure in between always leaves a
    /// recoverable backup-plus-archive pair on disk.
    ///
    /// # Errors
    /// Returns an error when the apply sequence fails; consult
    /// [`UpdateError::PartialApply`] for the on-disk recovery state.
    pub async fn check_and_update(
        &self,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<UpdateOutcome, UpdateError> {
        let Some(remote) = self.source.latest(self.platform).await else {
            return Ok(UpdateOutcome::NoRemoteVersion);
        };

        let installed = read_installed_version(&self.paths.marker_file());
        if installed == Some(remote) {
            info!("already up to date ({remote})");
            return Ok(UpdateOutcome::UpToDate);
        }

        if self.platform.locks_running_executable()
            && let Some(binary) = &self.guarded_binary
        {
            if is_process_running(binary).map_err(UpdateError::ProcessCheck)? {
                warn!("{binary} is running; close the application and retry the update");
                return Ok(UpdateOutcome::BlockedByRunningProcess);
            }
        }

        let prompt = match installed {
            Some(current) => format!("Update from {current} to {remote}?"),
            None => format!("No installed version found. Install {remote}?"),
        };
        if !confirm(&prompt) {
            info!("update to {remote} declined");
            return Ok(UpdateOutcome::Declined);
        }

        self.apply(remote).await?;
        info!("updated to {remote}");
        Ok(UpdateOutcome::Updated)
    }

    async fn apply(&self, version: ReleaseVersion) -> Result<(), UpdateError> {
        let root = self.paths.root();
        let backup = self.paths.backup_dir();
        info!("applying {version} over {}", root.display());

        // Only one backup generation is ever retained.
        if backup.exists() {
            std::fs::remove_dir_all(&backup)
                .map_err(|e| UpdateError::io("failed to remove previous backup", e))?;
        }
        std::fs::create_dir_all(&backup)
            .map_err(|e| UpdateError::io("failed to create backup directory", e))?;

        self.move_installation_into_backup(&backup)?;

        let partial = |stage: &'static str, details: String| UpdateError::PartialApply {
            stage,
            backup: backup.display().to_string(),
            details,
        };

        let archive_path = root.join(format!("update-download.{}", self.platform.archive_ext()));
        self.source
            .fetch_archive(self.platform, &archive_path)
            .await
            .map_err(|e: FetchError| partial("download", e.to_string()))?;

        archive::unpack(self.platform.archive_format(), &archive_path, root)
            .map_err(|e: ArchiveError| partial("extraction", e.to_string()))?;

        // The extracted tree carries its own version marker; nothing to
        // write here.
        std::fs::remove_file(&archive_path)
            .map_err(|e| partial("archive cleanup", e.to_string()))?;

        Ok(())
    }

    /// Move every install-root entry into the backup directory. Moves, not
    /// copies: after this the root holds only the backup (and nothing else)
    /// until extraction repopulates it. A failure mid-move is fatal and
    /// surfaced as-is; no automatic recovery is attempted.
    fn move_installation_into_backup(&self, backup: &Path) -> Result<(), UpdateError> {
        let root = self.paths.root();
        let entries = std::fs::read_dir(root)
            .map_err(|e| UpdateError::io("failed to read install directory", e))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| UpdateError::io("failed to read install entry", e))?;
            let name = entry.file_name();
            if self
                .paths
                .is_reserved_entry(&name.to_string_lossy())
            {
                continue;
            }
            std::fs::rename(entry.path(), backup.join(&name)).map_err(|e| {
                UpdateError::PartialApply {
                    stage: "backup move",
                    backup: backup.display().to_string(),
                    details: format!("{}: {e}", entry.path().display()),
                }
            })?;
        }
        Ok(())
    }
}

/// Read the single-line version marker beside an installation. Absent or
/// unparseable markers read as `None`, which forces an update offer.
#[must_use]
pub fn read_installed_version(marker: &Path) -> Option<ReleaseVersion> {
    let contents = match std::fs::read_to_string(marker) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => {
            warn!("failed to read version marker {}: {error}", marker.display());
            return None;
        }
    };
    match contents.trim().parse() {
        Ok(version) => Some(version),
        Err(error) => {
            warn!("ignoring malformed version marker {}: {error}", marker.display());
            None
        }
    }
}

/// Write the version marker: the canonical version string plus a newline.
///
/// # Errors
/// Returns an error when the marker file cannot be written.
pub fn write_installed_version(marker: &Path, version: ReleaseVersion) -> std::io::Result<()> {
    std::fs::write(marker, format!("{version}\n"))
}
