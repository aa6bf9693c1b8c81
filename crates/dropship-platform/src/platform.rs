use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A release target. Every platform carries its own binary suffix, archive
/// strategy, and self-update script, so the publisher and updater never
/// branch on OS names directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Windows, Platform::Linux];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }

    #[must_use]
    pub fn binary_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux => "",
        }
    }

    #[must_use]
    pub fn archive_ext(self) -> &'static str {
        match self {
            Self::Windows => "zip",
            Self::Linux => "tar.gz",
        }
    }

    #[must_use]
    pub fn archive_format(self) -> ArchiveFormat {
        match self {
            Self::Windows => ArchiveFormat::Zip,
            Self::Linux => ArchiveFormat::TarGz,
        }
    }

    #[must_use]
    pub fn target_triple(self) -> &'static str {
        match self {
            Self::Windows => "x86_64-pc-windows-msvc",
            Self::Linux => "x86_64-unknown-linux-gnu",
        }
    }

    #[must_use]
    pub fn update_script_name(self) -> &'static str {
        match self {
            Self::Windows => "update.ps1",
            Self::Linux => "update.sh",
        }
    }

    /// Whether a running process holds its own executable open, making an
    /// in-place replacement fail. Only Windows locks running images.
    #[must_use]
    pub fn locks_running_executable(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// The platform this process is running on, or `None` on hosts no
    /// release targets.
    #[must_use]
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown platform: {input}")]
pub struct UnknownPlatformError {
    pub input: String,
}

impl FromStr for Platform {
    type Err = UnknownPlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            _ => Err(UnknownPlatformError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips_through_from_str() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.name().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn from_str_is_case_insensitive_and_trims() {
        assert_eq!(" Windows ".parse::<Platform>().unwrap(), Platform::Windows);
        assert_eq!("LINUX".parse::<Platform>().unwrap(), Platform::Linux);
    }

    #[test]
    fn from_str_rejects_unknown_names() {
        let err = "darwin".parse::<Platform>().unwrap_err();
        assert_eq!(err.input, "darwin");
    }

    #[test]
    fn archive_strategy_matches_platform_family() {
        assert_eq!(Platform::Windows.archive_ext(), "zip");
        assert_eq!(Platform::Windows.archive_format(), ArchiveFormat::Zip);
        assert_eq!(Platform::Linux.archive_ext(), "tar.gz");
        assert_eq!(Platform::Linux.archive_format(), ArchiveFormat::TarGz);
    }

    #[test]
    fn only_windows_locks_its_executable() {
        assert!(Platform::Windows.locks_running_executable());
        assert!(!Platform::Linux.locks_running_executable());
    }
}
