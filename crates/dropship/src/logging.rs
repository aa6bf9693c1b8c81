use std::fs::OpenOptions;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// Terminal logging always; a debug-level file log under the user data dir
/// when one can be opened. Failures to set up the file side are silent —
/// logging must never prevent the tool from running.
pub fn init(debug_enabled: bool) {
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("dropship")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(log_path) = dirs::data_dir().map(|dir| dir.join("dropship").join("dropship.log")) {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            loggers.push(WriteLogger::new(LevelFilter::Debug, config, file));
        }
    }

    let _ = CombinedLogger::init(loggers);
}
