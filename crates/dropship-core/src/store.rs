//! Artifact store backends.
//!
//! The store keeps a flat directory of immutable `{version}-{platform}.{ext}`
//! archives plus one mutable `latest-{platform}.{ext}` alias per platform.
//! Repointing the alias is remove-then-link in both backends; between the
//! two steps a concurrent discovery query can transiently see no alias (or,
//! before the remove, the previous one). The window is inherent to the
//! layout and is deliberately left open rather than papered over with a
//! rename swap that would change observable behavior.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use thiserror::Error;
use tokio::process::Command;

use dropship_platform::Platform;

use crate::version::ReleaseVersion;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("required tool not found: {tool}")]
    PrerequisiteMissing { tool: &'static str },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("remote command failed: {stderr}")]
    CommandFailed { stderr: String },
}

impl StoreError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// One publish authority. Uploads are atomic from the publisher's point of
/// view: either the whole archive lands under its final name or the call
/// fails and nothing is published.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, local: &Path, name: &str) -> Result<(), StoreError>;

    /// Repoint `latest-{platform}` at an already-uploaded artifact.
    async fn repoint_latest(
        &self,
        platform: Platform,
        artifact_name: &str,
    ) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Store rooted in a local (or mounted) directory.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for DirStore {
    async fn upload(&self, local: &Path, name: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io("failed to create store directory", e))?;
        let dest = self.root.join(name);
        tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| StoreError::io("failed to copy artifact into store", e))?;
        info!("uploaded {name} to {}", self.root.display());
        Ok(())
    }

    async fn repoint_latest(
        &self,
        platform: Platform,
        artifact_name: &str,
    ) -> Result<(), StoreError> {
        let alias = self.root.join(ReleaseVersion::latest_file_name(platform));
        let target = self.root.join(artifact_name);

        match tokio::fs::remove_file(&alias).await {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(StoreError::io("failed to remove latest alias", error)),
        }
        // Race window: the alias is absent until the link below lands.
        std::fs::hard_link(&target, &alias)
            .map_err(|e| StoreError::io("failed to link latest alias", e))?;

        debug!("latest-{platform} -> {artifact_name}");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(error) => return Err(StoreError::io("failed to list store directory", error)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("failed to read store entry", e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// Store on a remote host, reached through `scp`/`ssh` child processes.
/// The transport is opaque: each call's only observable result is
/// success or failure.
pub struct SshStore {
    host: String,
    remote_dir: String,
}

impl SshStore {
    /// Build an ssh-backed store after checking the transport tools exist.
    ///
    /// # Errors
    /// Returns `PrerequisiteMissing` when `ssh` or `scp` is not on PATH.
    pub fn new(host: impl Into<String>, remote_dir: impl Into<String>) -> Result<Self, StoreError> {
        for tool in ["ssh", "scp"] {
            if which::which(tool).is_err() {
                return Err(StoreError::PrerequisiteMissing { tool });
            }
        }
        Ok(Self {
            host: host.into(),
            remote_dir: remote_dir.into().trim_end_matches('/').to_string(),
        })
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<String, StoreError> {
        debug!("running {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| StoreError::io("failed to spawn transport command", e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(StoreError::CommandFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn ssh(&self, remote_command: String) -> Result<String, StoreError> {
        self.run("ssh", &[self.host.clone(), remote_command]).await
    }
}

#[async_trait]
impl ArtifactStore for SshStore {
    async fn upload(&self, local: &Path, name: &str) -> Result<(), StoreError> {
        self.ssh(format!("mkdir -p '{}'", self.remote_dir)).await?;
        self.run(
            "scp",
            &[
                local.display().to_string(),
                format!("{}:{}/{name}", self.host, self.remote_dir),
            ],
        )
        .await?;
        info!("uploaded {name} to {}:{}", self.host, self.remote_dir);
        Ok(())
    }

    async fn repoint_latest(
        &self,
        platform: Platform,
        artifact_name: &str,
    ) -> Result<(), StoreError> {
        let alias = ReleaseVersion::latest_file_name(platform);
        let dir = &self.remote_dir;
        // Same remove-then-link window as DirStore, one hop further away.
        self.ssh(format!("rm -f '{dir}/{alias}'")).await?;
        self.ssh(format!("ln '{dir}/{artifact_name}' '{dir}/{alias}'"))
            .await?;
        debug!("latest-{platform} -> {artifact_name} on {}", self.host);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let listing = self.ssh(format!("ls -1 '{}'", self.remote_dir)).await?;
        Ok(listing.lines().map(str::to_string).collect())
    }
}
