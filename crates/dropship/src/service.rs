//! Remote service control over ssh. Each call is a single blocking remote
//! command whose only observable result is success or failure; a failed
//! restart never unwinds a publish or update that already succeeded.

use log::{debug, info};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("required tool not found: ssh")]
    SshMissing,
    #[error("failed to run ssh: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("remote command failed: {stderr}")]
    CommandFailed { stderr: String },
}

pub struct RemoteService {
    host: String,
    unit: String,
}

impl RemoteService {
    /// # Errors
    /// Returns `SshMissing` when `ssh` is not on PATH.
    pub fn new(host: impl Into<String>, unit: impl Into<String>) -> Result<Self, ServiceError> {
        if which::which("ssh").is_err() {
            return Err(ServiceError::SshMissing);
        }
        Ok(Self {
            host: host.into(),
            unit: unit.into(),
        })
    }

    async fn ssh(&self, remote_command: String) -> Result<std::process::Output, ServiceError> {
        debug!("ssh {} {remote_command}", self.host);
        Command::new("ssh")
            .args([&self.host, &remote_command])
            .output()
            .await
            .map_err(ServiceError::Spawn)
    }

    async fn ssh_checked(&self, remote_command: String) -> Result<(), ServiceError> {
        let output = self.ssh(remote_command).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ServiceError::CommandFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// # Errors
    /// Returns an error when the status query cannot be executed at all;
    /// an inactive unit is `Ok(false)`.
    pub async fn is_active(&self) -> Result<bool, ServiceError> {
        let output = self
            .ssh(format!("systemctl is-active --quiet {}", self.unit))
            .await?;
        Ok(output.status.success())
    }

    /// # Errors
    /// Returns an error when the remote restart fails.
    pub async fn restart(&self) -> Result<(), ServiceError> {
        info!("restarting {} on {}", self.unit, self.host);
        self.ssh_checked(format!("sudo systemctl restart {}", self.unit))
            .await
    }

    /// # Errors
    /// Returns an error when the remote start fails.
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!("starting {} on {}", self.unit, self.host);
        self.ssh_checked(format!("sudo systemctl start {}", self.unit))
            .await
    }

    /// Run the self-update script shipped with the remote installation.
    ///
    /// # Errors
    /// Returns an error when the remote script fails.
    pub async fn run_update_script(&self, script: &str) -> Result<(), ServiceError> {
        info!("running {script} on {}", self.host);
        self.ssh_checked(script.to_string()).await
    }
}
