use std::path::Path;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::version::ReleaseVersion;

/// Compute the version for the next publish.
///
/// Deterministic and side-effect free: the only inputs are the most recent
/// published version (if any can be determined) and today's date. Two
/// releases on the same date increment the sequence; a date change resets
/// it to 1. A future-dated `last` (clock skew between publisher and
/// artifact store) falls under the same date-equality rule and is not
/// special-cased.
#[must_use]
pub fn next_version(last: Option<&ReleaseVersion>, today: NaiveDate) -> ReleaseVersion {
    match last {
        Some(prev) if prev.date == today => ReleaseVersion::new(today, prev.sequence + 1),
        _ => ReleaseVersion::new(today, 1),
    }
}

/// Last successful publish, persisted between publisher invocations so
/// same-day sequences keep counting when remote discovery is unavailable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LastPublishRecord {
    pub date: NaiveDate,
    pub sequence: u32,
}

impl LastPublishRecord {
    #[must_use]
    pub fn version(&self) -> ReleaseVersion {
        ReleaseVersion::new(self.date, self.sequence)
    }

    /// Read a previously persisted record. An absent or unreadable record
    /// is `None`; the allocator then starts over at sequence 1.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!("failed to read last-publish record {}: {error}", path.display());
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(
                    "ignoring malformed last-publish record {}: {error}",
                    path.display()
                );
                None
            }
        }
    }

    /// Persist this record, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns an error when the record cannot be serialized or written.
    pub fn store(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, contents)
    }
}

impl From<ReleaseVersion> for LastPublishRecord {
    fn from(version: ReleaseVersion) -> Self {
        Self {
            date: version.date,
            sequence: version.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn first_publish_starts_at_sequence_one() {
        let today = date(2024, 1, 5);
        assert_eq!(next_version(None, today), ReleaseVersion::new(today, 1));
    }

    #[test]
    fn same_day_publish_increments_sequence() {
        let today = date(2024, 1, 5);
        let prev = ReleaseVersion::new(today, 2);
        assert_eq!(
            next_version(Some(&prev), today),
            ReleaseVersion::new(today, 3)
        );
    }

    #[test]
    fn date_rollover_resets_sequence() {
        let prev = ReleaseVersion::new(date(2024, 1, 5), 7);
        let today = date(2024, 1, 6);
        assert_eq!(
            next_version(Some(&prev), today),
            ReleaseVersion::new(today, 1)
        );
    }

    #[test]
    fn future_dated_previous_version_still_resets() {
        // Clock skew: the store has a version dated after the local clock.
        let prev = ReleaseVersion::new(date(2024, 1, 7), 4);
        let today = date(2024, 1, 6);
        assert_eq!(
            next_version(Some(&prev), today),
            ReleaseVersion::new(today, 1)
        );
    }

    #[test]
    fn allocation_truth_table() {
        let today = date(2024, 3, 1);
        for (prev_date, prev_seq) in [
            (date(2024, 2, 29), 5),
            (date(2024, 3, 1), 1),
            (date(2024, 3, 2), 9),
        ] {
            let prev = ReleaseVersion::new(prev_date, prev_seq);
            let next = next_version(Some(&prev), today);
            if prev_date == today {
                assert_eq!(next.sequence, prev_seq + 1);
            } else {
                assert_eq!(next.sequence, 1);
            }
            assert_eq!(next.date, today);
        }
    }

    #[test]
    fn record_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("state/last-publish.json");
        let record = LastPublishRecord::from(ReleaseVersion::new(date(2024, 1, 5), 2));

        record.store(&path).expect("record should be written");

        let loaded = LastPublishRecord::load(&path).expect("record should load");
        assert_eq!(loaded.version(), record.version());
    }

    #[test]
    fn missing_or_malformed_record_loads_as_none() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("last-publish.json");

        assert!(LastPublishRecord::load(&path).is_none());

        std::fs::write(&path, "{not json").expect("file should be written");
        assert!(LastPublishRecord::load(&path).is_none());
    }

    #[test]
    fn same_day_publishes_without_remote_state_count_up() {
        // Two publishes on one date, then a publish the next day.
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("last-publish.json");
        let day_one = date(2024, 1, 5);

        let first = next_version(LastPublishRecord::load(&path).map(|r| r.version()).as_ref(), day_one);
        assert_eq!(first, ReleaseVersion::new(day_one, 1));
        LastPublishRecord::from(first).store(&path).unwrap();

        let second = next_version(LastPublishRecord::load(&path).map(|r| r.version()).as_ref(), day_one);
        assert_eq!(second, ReleaseVersion::new(day_one, 2));
        LastPublishRecord::from(second).store(&path).unwrap();

        let day_two = date(2024, 1, 6);
        let third = next_version(LastPublishRecord::load(&path).map(|r| r.version()).as_ref(), day_two);
        assert_eq!(third, ReleaseVersion::new(day_two, 1));
    }
}
