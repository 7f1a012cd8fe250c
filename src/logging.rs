//! Process-wide tracing setup for binaries and demos.
//!
//! The library itself only emits `tracing` records; installing a subscriber is
//! left to the application. [`init_tracing`] is the default choice.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `tracing` subscriber writing to stderr.
///
/// - `RUST_LOG` wins when set (full `EnvFilter` syntax).
/// - Otherwise `TASKLANE_LOG` picks the level for this crate: `debug`, `warn`,
///   `error`, anything else means `info`.
/// - `LOG_FORMAT=json` switches to JSON lines.
///
/// Calling it twice is harmless; the second call is a no-op.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("TASKLANE_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("warn,tasklane={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}
