use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use dropship_platform::Platform;

/// Date-scoped release identifier, for example `2024-01-05.3`: the third
/// release published on 2024-01-05. The sequence restarts at 1 on every
/// date rollover and is never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseVersion {
    pub date: NaiveDate,
    pub sequence: u32,
}

impl ReleaseVersion {
    #[must_use]
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        debug_assert!(sequence >= 1, "release sequence starts at 1");
        Self { date, sequence }
    }

    /// Immutable archive name for this version on one platform, for
    /// example `2024-01-05.3-linux.tar.gz`.
    #[must_use]
    pub fn artifact_file_name(&self, platform: Platform) -> String {
        format!("{self}-{platform}.{}", platform.archive_ext())
    }

    /// The mutable alias that always points at the newest artifact for a
    /// platform, for example `latest-windows.zip`.
    #[must_use]
    pub fn latest_file_name(platform: Platform) -> String {
        format!("latest-{platform}.{}", platform.archive_ext())
    }

    /// Parse an artifact file name back into its version and platform.
    /// Returns `None` for anything that does not match the naming
    /// convention; listings contain unrelated entries and callers skip
    /// them.
    #[must_use]
    pub fn parse_artifact_name(name: &str) -> Option<(Self, Platform)> {
        for platform in Platform::ALL {
            let suffix = format!("-{platform}.{}", platform.archive_ext());
            if let Some(version_part) = name.strip_suffix(&suffix) {
                return version_part.parse().ok().map(|v| (v, platform));
            }
        }
        None
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // NaiveDate displays as ISO-8601 (%Y-%m-%d), which is the canonical
        // on-disk and on-wire date form.
        write!(f, "{}.{}", self.date, self.sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Expected YYYY-MM-DD.N format, got: {input}")]
    InvalidFormat { input: String },
    #[error("Invalid release date: {value}")]
    InvalidDate { value: String },
    #[error("Invalid release sequence: {value}")]
    InvalidSequence { value: String },
    #[error("Release sequence must be at least 1")]
    ZeroSequence,
}

impl FromStr for ReleaseVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (date_str, seq_str) =
            s.rsplit_once('.')
                .ok_or_else(|| VersionParseError::InvalidFormat {
                    input: s.to_string(),
                })?;

        let date: NaiveDate =
            date_str
                .parse()
                .map_err(|_| VersionParseError::InvalidDate {
                    value: date_str.to_string(),
                })?;
        let sequence: u32 =
            seq_str
                .parse()
                .map_err(|_| VersionParseError::InvalidSequence {
                    value: seq_str.to_string(),
                })?;

        if sequence == 0 {
            return Err(VersionParseError::ZeroSequence);
        }

        Ok(Self { date, sequence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn display_uses_canonical_form() {
        let v = ReleaseVersion::new(date(2024, 1, 5), 3);
        assert_eq!(v.to_string(), "2024-01-05.3");
    }

    #[test]
    fn parse_round_trips_display() {
        let v = ReleaseVersion::new(date(2024, 12, 31), 17);
        let parsed: ReleaseVersion = v.to_string().parse().unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn parse_trims_whitespace() {
        let v: ReleaseVersion = " 2024-01-05.1\n".parse().unwrap();
        assert_eq!(v, ReleaseVersion::new(date(2024, 1, 5), 1));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(
            "2024-01-05".parse::<ReleaseVersion>(),
            Err(VersionParseError::InvalidFormat { .. })
        ));
        assert!(matches!(
            "not-a-date.1".parse::<ReleaseVersion>(),
            Err(VersionParseError::InvalidDate { .. })
        ));
        assert!(matches!(
            "20240105".parse::<ReleaseVersion>(),
            Err(VersionParseError::InvalidFormat { .. })
        ));
        assert!(matches!(
            "2024-01-05.x".parse::<ReleaseVersion>(),
            Err(VersionParseError::InvalidSequence { .. })
        ));
    }

    #[test]
    fn parse_rejects_zero_sequence() {
        assert!(matches!(
            "2024-01-05.0".parse::<ReleaseVersion>(),
            Err(VersionParseError::ZeroSequence)
        ));
    }

    #[test]
    fn ordering_is_date_then_sequence() {
        let a = ReleaseVersion::new(date(2024, 1, 5), 2);
        let b = ReleaseVersion::new(date(2024, 1, 5), 10);
        let c = ReleaseVersion::new(date(2024, 1, 6), 1);

        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
        assert_eq!(a, ReleaseVersion::new(date(2024, 1, 5), 2));
    }

    #[test]
    fn artifact_names_follow_the_convention() {
        let v = ReleaseVersion::new(date(2024, 1, 5), 3);

        assert_eq!(
            v.artifact_file_name(Platform::Linux),
            "2024-01-05.3-linux.tar.gz"
        );
        assert_eq!(
            v.artifact_file_name(Platform::Windows),
            "2024-01-05.3-windows.zip"
        );
        assert_eq!(
            ReleaseVersion::latest_file_name(Platform::Linux),
            "latest-linux.tar.gz"
        );
        assert_eq!(
            ReleaseVersion::latest_file_name(Platform::Windows),
            "latest-windows.zip"
        );
    }

    #[test]
    fn parse_artifact_name_round_trips() {
        let v = ReleaseVersion::new(date(2024, 1, 5), 3);
        for platform in Platform::ALL {
            let name = v.artifact_file_name(platform);
            assert_eq!(
                ReleaseVersion::parse_artifact_name(&name),
                Some((v, platform))
            );
        }
    }

    #[test]
    fn parse_artifact_name_skips_foreign_entries() {
        assert_eq!(ReleaseVersion::parse_artifact_name("latest-linux.tar.gz"), None);
        assert_eq!(ReleaseVersion::parse_artifact_name("readme.txt"), None);
        assert_eq!(
            ReleaseVersion::parse_artifact_name("2024-01-05.0-linux.tar.gz"),
            None
        );
        assert_eq!(
            ReleaseVersion::parse_artifact_name("2024-01-05.3-darwin.tar.gz"),
            None
        );
    }
}
