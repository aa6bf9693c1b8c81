//! Core publish/update protocol for the dropship tooling.
//!
//! This crate holds everything that is independent of the CLI surface:
//! - The date-scoped release version model and its ordering rule.
//! - Version allocation at publish time.
//! - Remote latest-version discovery and archive download.
//! - The per-platform publisher (stage, archive, upload, repoint latest).
//! - The in-place update client with its backup/recovery contract.

pub mod allocate;
pub mod archive;
pub mod discovery;
pub mod publish;
pub mod store;
pub mod update;
mod version;

/// Version allocation policy and the persisted last-publish record.
pub use allocate::{LastPublishRecord, next_version};
/// Remote discovery seam and its HTTP implementation.
pub use discovery::{FetchError, HttpVersionSource, VersionSource, newest_in_listing};
/// Publisher types.
pub use publish::{PublishError, PublishedArtifact, Publisher, ReleaseBundle};
/// Artifact store seam with local-directory and ssh backends.
pub use store::{ArtifactStore, DirStore, SshStore, StoreError};
/// Update client, outcomes, and version-marker helpers.
pub use update::{
    UpdateClient, UpdateError, UpdateOutcome, read_installed_version, write_installed_version,
};
/// Release version value type.
pub use version::{ReleaseVersion, VersionParseError};
