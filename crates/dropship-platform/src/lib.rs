//! Platform table and host-side glue for the dropship tooling.
//!
//! Everything that depends on *which* operating system a binary targets or
//! runs on lives here: the release platform table, install-directory path
//! layout, and the running-process check that guards in-place updates.

mod paths;
mod platform;
mod process;

pub use paths::InstallPaths;
pub use platform::{ArchiveFormat, Platform, UnknownPlatformError};
pub use process::is_process_running;
