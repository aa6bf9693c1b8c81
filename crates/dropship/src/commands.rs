//! Subcommand flows. Each returns a process exit code: zero for success
//! and for deliberate no-ops (up to date, declined, no remote version,
//! missing prerequisite tool), nonzero for unrecovered failures.

use std::process::ExitCode;

use log::{error, info, warn};

use dropship_core::{
    ArtifactStore, DirStore, HttpVersionSource, LastPublishRecord, Publisher, ReleaseBundle,
    ReleaseVersion, SshStore, StoreError, UpdateClient, UpdateOutcome, VersionSource,
    newest_in_listing, next_version, read_installed_version,
};
use dropship_platform::{InstallPaths, Platform};

use crate::build::{self, BuildError};
use crate::config::DropshipConfig;
use crate::confirm;
use crate::service::RemoteService;

fn open_store(config: &DropshipConfig) -> Result<Box<dyn ArtifactStore>, StoreError> {
    match &config.remote_host {
        Some(host) => Ok(Box::new(SshStore::new(host.clone(), config.remote_dir.clone())?)),
        None => Ok(Box::new(DirStore::new(&config.remote_dir))),
    }
}

/// The most recent published version across all platforms, from the store
/// listing, with the on-disk last-publish record as the fallback when the
/// store cannot be reached.
async fn last_published(store: &dyn ArtifactStore) -> Option<ReleaseVersion> {
    match store.list().await {
        Ok(names) => Platform::ALL
            .iter()
            .filter_map(|&p| newest_in_listing(names.iter().map(String::as_str), p))
            .max(),
        Err(error) => {
            warn!("store listing unavailable ({error}); falling back to local record");
            DropshipConfig::last_publish_file()
                .and_then(|path| LastPublishRecord::load(&path))
                .map(|record| record.version())
        }
    }
}

pub async fn publish(
    config: &DropshipConfig,
    platforms: &[Platform],
    skip_build: bool,
    assume_yes: bool,
) -> ExitCode {
    let store = match open_store(config) {
        Ok(store) => store,
        Err(StoreError::PrerequisiteMissing { tool }) => {
            // No transport tooling on this machine: a no-op, not a failure.
            warn!("cannot publish: {tool} is not installed");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            error!("cannot open artifact store: {error}");
            return ExitCode::FAILURE;
        }
    };

    let last = last_published(store.as_ref()).await;
    let today = chrono::Utc::now().date_naive();
    let version = next_version(last.as_ref(), today);
    info!("publishing version {version}");

    let publisher = Publisher::new(store.as_ref(), std::env::temp_dir().join("dropship-publish"));
    let mut published_any = false;
    let mut failed_any = false;

    for &platform in platforms {
        let binaries = if skip_build {
            build::locate_release_outputs(platform, &config.binaries)
        } else {
            build::build_release(platform, &config.binaries).await
        };
        let binaries = match binaries {
            Ok(binaries) => binaries,
            Err(BuildError::PrerequisiteMissing { tool }) => {
                warn!("skipping {platform}: {tool} is not installed");
                continue;
            }
            Err(error) => {
                error!("{platform} build failed: {error}");
                failed_any = true;
                continue;
            }
        };

        let bundle = ReleaseBundle {
            binaries,
            assets: vec![config.assets_dir.clone()],
            update_script: config.scripts_dir.join(platform.update_script_name()),
        };

        match publisher.publish(platform, version, &bundle).await {
            Ok(artifact) => {
                println!("published {}", artifact.artifact_name);
                published_any = true;
            }
            Err(error) => {
                // This platform aborts; others still publish under the
                // same version.
                error!("{platform} publish failed: {error}");
                failed_any = true;
            }
        }
    }

    if published_any {
        if let Some(path) = DropshipConfig::last_publish_file()
            && let Err(error) = LastPublishRecord::from(version).store(&path)
        {
            warn!("failed to persist last-publish record: {error}");
        }
        deploy_after_publish(config, assume_yes).await;
    }

    if failed_any {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Post-publish remote rollout: run the shipped update script, then
/// restart the service. Separately confirmed, and failures here are
/// reported without unwinding the publish that already happened.
async fn deploy_after_publish(config: &DropshipConfig, assume_yes: bool) {
    let Some(host) = &config.remote_host else {
        return;
    };
    let service = match RemoteService::new(host.clone(), config.service_name.clone()) {
        Ok(service) => service,
        Err(error) => {
            warn!("skipping remote rollout: {error}");
            return;
        }
    };

    if assume_yes || confirm::ask(&format!("Run update script on {host}?")) {
        if let Err(error) = service.run_update_script(&config.remote_update_command).await {
            error!("remote update script failed: {error}");
            return;
        }
    } else {
        return;
    }

    if assume_yes || confirm::ask(&format!("Restart {} on {host}?", config.service_name)) {
        if let Err(error) = service.restart().await {
            error!("service restart failed: {error}");
        }
    }
}

pub async fn update(config: &DropshipConfig, assume_yes: bool) -> ExitCode {
    let Some(platform) = Platform::current() else {
        error!("this host is not a supported update target");
        return ExitCode::FAILURE;
    };

    // First install: the configured root may not exist yet.
    let paths = InstallPaths::new(&config.install_root);
    if let Err(error) = paths.ensure_root() {
        error!(
            "cannot create install root {}: {error}",
            paths.root().display()
        );
        return ExitCode::FAILURE;
    }

    let source = HttpVersionSource::new(config.store_url.clone());
    let client = UpdateClient::new(
        Box::new(source),
        paths,
        platform,
        Some(config.guarded_binary.clone()),
    );

    let mut gate = |prompt: &str| assume_yes || confirm::ask(prompt);
    match client.check_and_update(&mut gate).await {
        Ok(outcome) => {
            report_update_outcome(outcome, &config.guarded_binary);
            ExitCode::from(update_exit_code(outcome))
        }
        Err(error) => {
            error!("update failed: {error}");
            ExitCode::FAILURE
        }
    }
}

fn report_update_outcome(outcome: UpdateOutcome, guarded_binary: &str) {
    match outcome {
        UpdateOutcome::Updated => println!("update applied"),
        UpdateOutcome::UpToDate => println!("already up to date"),
        UpdateOutcome::Declined => println!("update declined"),
        UpdateOutcome::NoRemoteVersion => {
            println!("no published version could be determined; nothing to do");
        }
        UpdateOutcome::BlockedByRunningProcess => {
            println!(
                "{guarded_binary} is still running; close the application and run the update again"
            );
        }
    }
}

/// A blocked update demands operator action before it can proceed, so it
/// fails the invocation; the other non-update outcomes are clean no-ops.
fn update_exit_code(outcome: UpdateOutcome) -> u8 {
    match outcome {
        UpdateOutcome::BlockedByRunningProcess => 1,
        UpdateOutcome::Updated
        | UpdateOutcome::UpToDate
        | UpdateOutcome::Declined
        | UpdateOutcome::NoRemoteVersion => 0,
    }
}

pub async fn status(config: &DropshipConfig) -> ExitCode {
    let Some(platform) = Platform::current() else {
        error!("this host is not a supported update target");
        return ExitCode::FAILURE;
    };

    let paths = InstallPaths::new(&config.install_root);
    let installed = read_installed_version(&paths.marker_file());
    let remote = HttpVersionSource::new(config.store_url.clone())
        .latest(platform)
        .await;

    match installed {
        Some(version) => println!("installed: {version}"),
        None => println!("installed: unknown (no version marker)"),
    }
    match remote {
        Some(version) => println!("latest:    {version}"),
        None => println!("latest:    unknown (remote unavailable)"),
    }
    if let (Some(installed), Some(remote)) = (installed, remote) {
        if installed == remote {
            println!("up to date");
        } else {
            println!("update available");
        }
    }

    ExitCode::SUCCESS
}

pub enum ServiceCommand {
    Status,
    Start,
    Restart,
}

pub async fn service(
    config: &DropshipConfig,
    command: &ServiceCommand,
    assume_yes: bool,
) -> ExitCode {
    let Some(host) = &config.remote_host else {
        error!("no remote_host configured");
        return ExitCode::FAILURE;
    };
    let service = match RemoteService::new(host.clone(), config.service_name.clone()) {
        Ok(service) => service,
        Err(error) => {
            error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        ServiceCommand::Status => match service.is_active().await {
            Ok(active) => {
                println!(
                    "{} on {host}: {}",
                    config.service_name,
                    if active { "active" } else { "inactive" }
                );
                return ExitCode::SUCCESS;
            }
            Err(error) => Err(error),
        },
        ServiceCommand::Start => {
            if assume_yes || confirm::ask(&format!("Start {} on {host}?", config.service_name)) {
                service.start().await
            } else {
                println!("cancelled");
                return ExitCode::SUCCESS;
            }
        }
        ServiceCommand::Restart => {
            if assume_yes || confirm::ask(&format!("Restart {} on {host}?", config.service_name)) {
                service.restart().await
            } else {
                println!("cancelled");
                return ExitCode::SUCCESS;
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_published_takes_the_max_across_platforms() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let store = DirStore::new(temp.path());
        for name in [
            "2024-01-05.1-linux.tar.gz",
            "2024-01-06.1-windows.zip",
            "latest-linux.tar.gz",
        ] {
            std::fs::write(temp.path().join(name), b"x").unwrap();
        }

        let last = last_published(&store).await;
        assert_eq!(last, Some("2024-01-06.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn last_published_is_none_for_an_empty_store() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let store = DirStore::new(temp.path().join("empty"));

        assert_eq!(last_published(&store).await, None);
    }

    fn version(s: &str) -> dropship_core::ReleaseVersion {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn allocation_over_a_real_store_counts_same_day_releases() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let store = DirStore::new(temp.path());
        let today = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let first = next_version(last_published(&store).await.as_ref(), today);
        assert_eq!(first, version("2024-01-05.1"));
        std::fs::write(
            temp.path().join(first.artifact_file_name(Platform::Linux)),
            b"x",
        )
        .unwrap();

        let second = next_version(last_published(&store).await.as_ref(), today);
        assert_eq!(second, version("2024-01-05.2"));
    }

    #[test]
    fn only_a_blocked_update_exits_nonzero() {
        assert_eq!(
            update_exit_code(UpdateOutcome::BlockedByRunningProcess),
            1
        );
        for outcome in [
            UpdateOutcome::Updated,
            UpdateOutcome::UpToDate,
            UpdateOutcome::Declined,
            UpdateOutcome::NoRemoteVersion,
        ] {
            assert_eq!(update_exit_code(outcome), 0);
        }
    }
}
