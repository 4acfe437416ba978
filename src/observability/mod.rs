use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let filter = EnvFilter::try_new(tracing_directive(&level))
        .unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tracing_directive(level: &str) -> &str {
    match level {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    }
}

/// Log the end of a chat exchange at INFO level.
pub fn log_request_complete(stream: bool, chunks: usize, invoiced: bool, start_time: Instant) {
    tracing::info!(
        stream,
        chunks,
        invoiced,
        duration_seconds = start_time.elapsed().as_secs_f64(),
        "request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_levels_map_to_directives() {
        assert_eq!(tracing_directive("WARNING"), "WARN");
        assert_eq!(tracing_directive("CRITICAL"), "ERROR");
        assert_eq!(tracing_directive("DEBUG"), "DEBUG");
        assert!(EnvFilter::try_new(tracing_directive("WARNING")).is_ok());
    }
}
