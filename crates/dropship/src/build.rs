//! Release builds, at the boundary: the compiler invocation itself is an
//! external collaborator; this module only checks its prerequisite, runs
//! it, and locates its outputs.

use std::path::PathBuf;

use log::info;
use thiserror::Error;
use tokio::process::Command;

use dropship_platform::Platform;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("required tool not found: {tool}")]
    PrerequisiteMissing { tool: &'static str },
    #[error("failed to run cargo: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("cargo build for {triple} failed with {status}")]
    BuildFailed {
        triple: &'static str,
        status: std::process::ExitStatus,
    },
    #[error("expected build output missing: {path}")]
    MissingOutput { path: String },
}

/// Build the release binaries for one target platform and return their
/// paths under `target/{triple}/release/`.
///
/// # Errors
/// Returns `PrerequisiteMissing` before any work when `cargo` is absent,
/// and build/output errors afterwards.
pub async fn build_release(
    platform: Platform,
    binaries: &[String],
) -> Result<Vec<PathBuf>, BuildError> {
    if which::which("cargo").is_err() {
        return Err(BuildError::PrerequisiteMissing { tool: "cargo" });
    }

    let triple = platform.target_triple();
    info!("building release binaries for {triple}");

    let status = Command::new("cargo")
        .args(["build", "--release", "--target", triple])
        .status()
        .await
        .map_err(BuildError::Spawn)?;
    if !status.success() {
        return Err(BuildError::BuildFailed { triple, status });
    }

    locate_release_outputs(platform, binaries)
}

/// Locate already-built release binaries without invoking the compiler.
///
/// # Errors
/// Returns `MissingOutput` for any binary not present in the target dir.
pub fn locate_release_outputs(
    platform: Platform,
    binaries: &[String],
) -> Result<Vec<PathBuf>, BuildError> {
    let release_dir = PathBuf::from("target")
        .join(platform.target_triple())
        .join("release");
    let mut outputs = Vec::with_capacity(binaries.len());
    for name in binaries {
        let path = release_dir.join(format!("{name}{}", platform.binary_suffix()));
        if !path.is_file() {
            return Err(BuildError::MissingOutput {
                path: path.display().to_string(),
            });
        }
        outputs.push(path);
    }

    Ok(outputs)
}
