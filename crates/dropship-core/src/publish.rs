use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use dropship_platform::Platform;

use crate::archive::{self, ArchiveError};
use crate::store::{ArtifactStore, StoreError};
use crate::update::write_installed_version;
use crate::version::ReleaseVersion;

/// Inputs for one platform's publish: already-built binaries, shared static
/// assets (files or whole directories), and that platform's self-update
/// script. Producing the binaries is the caller's concern.
#[derive(Debug, Clone)]
pub struct ReleaseBundle {
    pub binaries: Vec<PathBuf>,
    pub assets: Vec<PathBuf>,
    pub update_script: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PublishedArtifact {
    pub version: ReleaseVersion,
    pub platform: Platform,
    pub artifact_name: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("stale staging directory {path} could not be cleared: {source}")]
    StagingConflict {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("missing release input: {path}")]
    MissingInput { path: String },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PublishError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Builds, names, uploads, and republishes one platform archive at a time.
/// All platforms of a release share one version value computed before the
/// first `publish` call; a failing platform aborts only itself.
pub struct Publisher<'a> {
    store: &'a dyn ArtifactStore,
    work_dir: PathBuf,
}

impl<'a> Publisher<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ArtifactStore, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            work_dir: work_dir.into(),
        }
    }

    /// Stage, archive, upload, and repoint `latest` for one platform.
    ///
    /// The staging directory is removed on every exit path, success or
    /// failure, so repeated attempts never accumulate garbage.
    ///
    /// # Errors
    /// Returns an error when staging, archiving, or the store interaction
    /// fails; nothing is published in that case.
    pub async fn publish(
        &self,
        platform: Platform,
        version: ReleaseVersion,
        bundle: &ReleaseBundle,
    ) -> Result<PublishedArtifact, PublishError> {
        let staging = self.work_dir.join(format!("stage-{platform}"));
        if staging.exists() {
            // A previous run left state behind; a fresh directory is
            // required, so clearing it must succeed.
            std::fs::remove_dir_all(&staging).map_err(|source| PublishError::StagingConflict {
                path: staging.display().to_string(),
                source,
            })?;
        }
        std::fs::create_dir_all(&staging)
            .map_err(|e| PublishError::io("failed to create staging directory", e))?;

        let result = self.stage_and_upload(platform, version, bundle, &staging).await;

        if let Err(error) = std::fs::remove_dir_all(&staging) {
            warn!("failed to clean staging directory {}: {error}", staging.display());
        }

        result
    }

    async fn stage_and_upload(
        &self,
        platform: Platform,
        version: ReleaseVersion,
        bundle: &ReleaseBundle,
        staging: &Path,
    ) -> Result<PublishedArtifact, PublishError> {
        for source in bundle.binaries.iter().chain(&bundle.assets) {
            stage_entry(source, staging)?;
        }
        stage_entry(&bundle.update_script, staging)?;

        // The installed copy self-reports its version through this marker.
        write_installed_version(&staging.join("version.txt"), version)
            .map_err(|e| PublishError::io("failed to write version marker", e))?;

        let artifact_name = version.artifact_file_name(platform);
        let archive_path = self.work_dir.join(&artifact_name);
        archive::pack(platform.archive_format(), staging, &archive_path)?;

        let upload = async {
            self.store.upload(&archive_path, &artifact_name).await?;
            self.store.repoint_latest(platform, &artifact_name).await?;
            Ok::<(), PublishError>(())
        }
        .await;

        if let Err(error) = std::fs::remove_file(&archive_path) {
            warn!("failed to remove local archive {}: {error}", archive_path.display());
        }
        upload?;

        info!("published {artifact_name}");
        Ok(PublishedArtifact {
            version,
            platform,
            artifact_name,
        })
    }
}

/// Copy one file or directory tree into the staging directory under its
/// own file name.
fn stage_entry(source: &Path, staging: &Path) -> Result<(), PublishError> {
    let Some(name) = source.file_name() else {
        return Err(PublishError::MissingInput {
            path: source.display().to_string(),
        });
    };
    if !source.exists() {
        return Err(PublishError::MissingInput {
            path: source.display().to_string(),
        });
    }

    let dest = staging.join(name);
    if source.is_dir() {
        copy_dir_recursive(source, &dest)
            .map_err(|e| PublishError::io("failed to stage directory", e))
    } else {
        std::fs::copy(source, &dest)
            .map(|_| ())
            .map_err(|e| PublishError::io("failed to stage file", e))
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            std::fs::copy(&src_path, &dest_path)?;
        }
    }
    Ok(())
}
