use std::path::{Path, PathBuf};

/// Filenames that live beside the installed binaries. The backup directory
/// sits inside the install root so an update never needs write access
/// outside of it.
const MARKER_FILE: &str = "version.txt";
const BACKUP_DIR: &str = "backup";

/// Layout of one installed copy of the application.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    root: PathBuf,
}

impl InstallPaths {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Single-line version marker written at publish time and read back by
    /// the update client.
    #[must_use]
    pub fn marker_file(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    /// The one retained pre-update snapshot. Replaced wholesale on every
    /// update, never merged.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// True for install-root entries that must survive the backup move.
    /// Only the backup directory itself qualifies; moving it into itself
    /// would fail.
    #[must_use]
    pub fn is_reserved_entry(&self, name: &str) -> bool {
        name == BACKUP_DIR
    }

    /// Create the install root if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_the_install_root() {
        let paths = InstallPaths::new("/opt/dropship");

        assert_eq!(paths.marker_file(), Path::new("/opt/dropship/version.txt"));
        assert_eq!(paths.backup_dir(), Path::new("/opt/dropship/backup"));
    }

    #[test]
    fn backup_dir_is_reserved() {
        let paths = InstallPaths::new("/opt/dropship");
        assert!(paths.is_reserved_entry("backup"));
        assert!(!paths.is_reserved_entry("version.txt"));
        assert!(!paths.is_reserved_entry("lobby-server"));
    }

    #[test]
    fn ensure_root_creates_missing_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = InstallPaths::new(temp.path().join("nested/install"));

        paths.ensure_root().expect("root should be created");

        assert!(paths.root().is_dir());
    }
}
