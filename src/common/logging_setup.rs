use env_logger::Builder;
use log::LevelFilter;
use crate::app_config::ApplicationConfig;

fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_lowercase().as_str() {
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

// The logger is installed before the config exists (the daemon logs while it
// waits for the file), so the builder accepts everything and the effective
// level is controlled through log::set_max_level.
pub fn initialize_logging(debug: bool) {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Trace);

    builder.try_init().unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {}. Logging might not work as expected.", e);
    });
    log::set_max_level(if debug { LevelFilter::Debug } else { LevelFilter::Info });
}

// Determine log level from CLI, then config, then default
pub fn apply_config_level(app_settings: &ApplicationConfig, debug: bool) -> LevelFilter {
    let level = if debug {
        LevelFilter::Debug
    } else {
        match app_settings.log_level.as_deref() {
            Some(s) => parse_level(s).unwrap_or_else(|| {
                log::warn!("Unrecognized log level '{}', defaulting to info.", s);
                LevelFilter::Info
            }),
            None => LevelFilter::Info,
        }
    };
    log::set_max_level(level);
    level
}
