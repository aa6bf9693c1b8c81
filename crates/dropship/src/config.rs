use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

/// Tool configuration, read from `{config_dir}/dropship/config.json`.
/// Every field has a default so a missing file means "local defaults",
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropshipConfig {
    /// Base URL of the publish authority's HTTP surface (version listing,
    /// latest endpoints, archive downloads).
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// SSH host holding the artifact store and running the lobby service.
    /// When unset, publishing writes into `remote_dir` as a local path.
    #[serde(default)]
    pub remote_host: Option<String>,

    /// Artifact directory on the remote host (or locally, see above).
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Root of the installation this machine updates in place.
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// Binary names built and shipped in every release.
    #[serde(default = "default_binaries")]
    pub binaries: Vec<String>,

    /// Shared static assets staged into every platform archive.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Directory holding the per-platform self-update scripts.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// systemd unit restarted on the remote host after a publish.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Command that runs the self-update script on the remote host.
    #[serde(default = "default_remote_update_command")]
    pub remote_update_command: String,

    /// Executable checked for before an in-place update on platforms that
    /// lock running images.
    #[serde(default = "default_guarded_binary")]
    pub guarded_binary: String,

    #[serde(default)]
    pub debug_logging: bool,
}

fn default_store_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_remote_dir() -> String {
    "/srv/dropship/releases".to_string()
}

fn default_install_root() -> PathBuf {
    // The updater ships beside the installation it maintains.
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_binaries() -> Vec<String> {
    vec!["lobby-server".to_string(), "game-server".to_string()]
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_service_name() -> String {
    "lobby-server".to_string()
}

fn default_remote_update_command() -> String {
    "/srv/dropship/install/update.sh --yes".to_string()
}

fn default_guarded_binary() -> String {
    "game-server.exe".to_string()
}

impl Default for DropshipConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("all config fields have defaults")
    }
}

impl DropshipConfig {
    #[must_use]
    pub fn config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dropship").join("config.json"))
    }

    /// Where the allocator's last-publish record is persisted.
    #[must_use]
    pub fn last_publish_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dropship").join("last-publish.json"))
    }

    /// Load configuration from an explicit path, or the default location.
    /// A missing file yields defaults; a malformed one is reported and
    /// also falls back to defaults rather than aborting.
    #[must_use]
    pub fn load(explicit: Option<&PathBuf>) -> Self {
        let path = match explicit {
            Some(path) => path.clone(),
            None => match Self::config_file() {
                Some(path) => path,
                None => return Self::default(),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to read config {}: {error}", path.display());
                }
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(error) => {
                warn!("malformed config {}: {error}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_field() {
        let config = DropshipConfig::default();

        assert_eq!(config.store_url, "http://localhost:8080");
        assert_eq!(config.remote_host, None);
        assert_eq!(config.binaries, ["lobby-server", "game-server"]);
        assert_eq!(config.service_name, "lobby-server");
        assert!(!config.debug_logging);
    }

    #[test]
    fn partial_config_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "store_url": "https://releases.example.net", "remote_host": "play01" }"#,
        )
        .unwrap();

        let config = DropshipConfig::load(Some(&path));

        assert_eq!(config.store_url, "https://releases.example.net");
        assert_eq!(config.remote_host.as_deref(), Some("play01"));
        assert_eq!(config.service_name, "lobby-server");
    }

    #[test]
    fn missing_and_malformed_files_fall_back_to_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let missing = temp.path().join("nope.json");
        assert_eq!(
            DropshipConfig::load(Some(&missing)).store_url,
            default_store_url()
        );

        let malformed = temp.path().join("bad.json");
        std::fs::write(&malformed, "{oops").unwrap();
        assert_eq!(
            DropshipConfig::load(Some(&malformed)).store_url,
            default_store_url()
        );
    }
}
