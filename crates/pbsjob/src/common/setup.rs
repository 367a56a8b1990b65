use std::io::Write;

use env_logger::DEFAULT_FILTER_ENV;
use log::LevelFilter;

fn rust_log_requests_debug() -> bool {
    std::env::var(DEFAULT_FILTER_ENV)
        .map(|filter| filter.contains("debug") || filter.contains("trace"))
        .unwrap_or(false)
}

/// Initializes logging to stderr. `RUST_LOG` overrides the level chosen by `debug`.
///
/// Debug output carries timestamps and module paths; the default output is
/// `<level> <message>`, so it does not get in the way of rendered scripts on stdout.
pub fn setup_logging(debug: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    if debug || rust_log_requests_debug() {
        builder.format_timestamp_millis().format_module_path(true);
    } else {
        builder.format(|buf, record| {
            let style = buf.default_level_style(record.level()).bold();
            writeln!(buf, "{style}{:<5}{style:#} {}", record.level(), record.args())
        });
    }

    builder.parse_default_env();
    builder.init();
}
