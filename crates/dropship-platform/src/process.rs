use std::io;

use log::debug;

/// Check whether a process with the given executable name is currently
/// running on this host.
///
/// The update client must not replace files while the application holds its
/// own executable open; which listing mechanism answers the question is an
/// implementation detail hidden behind this function.
///
/// # Errors
/// Returns an error when the process listing itself fails (not when the
/// process is simply absent).
pub fn is_process_running(executable: &str) -> io::Result<bool> {
    let running = query_processes(executable)?;
    debug!("process check for {executable}: running={running}");
    Ok(running)
}

#[cfg(target_os = "windows")]
fn query_processes(executable: &str) -> io::Result<bool> {
    use std::process::Command;

    // tasklist prints "INFO: No tasks are running..." when the filter
    // matches nothing, so a hit is detected by the image name echoing back.
    let output = Command::new("tasklist")
        .args(["/FI", &format!("IMAGENAME eq {executable}"), "/NH"])
        .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .any(|line| line.to_ascii_lowercase().starts_with(&executable.to_ascii_lowercase())))
}

#[cfg(not(target_os = "windows"))]
fn query_processes(executable: &str) -> io::Result<bool> {
    // The kernel truncates /proc/<pid>/comm to 15 bytes.
    let wanted: String = executable.chars().take(15).collect();

    for entry in std::fs::read_dir("/proc")? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let comm_path = entry.path().join("comm");
        // Processes may exit between the listing and the read.
        let Ok(comm) = std::fs::read_to_string(&comm_path) else {
            continue;
        };
        if comm.trim_end() == wanted {
            return Ok(true);
        }
    }

    Ok(false)
}
