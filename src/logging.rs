//! Logging (C11): installs a concrete `env_logger` logger for the `log` facade used
//! throughout the connection, fan-out, and pipeline code.

use log::LevelFilter;

/// Parses a `--log-level` flag value, falling back to `info` for anything unrecognized.
fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// Installs the global logger. `level` (typically a `--log-level` flag) sets the
/// default filter; `RUST_LOG` still overrides it when set, since `env_logger` parses
/// `RUST_LOG` on top of whatever filter we configure.
pub fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(parse_level(level));
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_level_falls_back_to_info() {
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn known_levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("Warn"), LevelFilter::Warn);
    }
}
