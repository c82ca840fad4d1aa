//! Scoped console interception.
//!
//! While a session runs, console logging is routed through a scoped stderr
//! subscriber so nothing leaks into the session's stdout stream. Dropping
//! the guard restores the previous dispatcher, on every exit path.

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Holds the session's console redirection; releases it on drop.
pub struct ConsoleGuard {
    _guard: DefaultGuard,
}

/// Redirect console logging to stderr for the duration of the session.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies, raised
/// to `debug` when the debug flag is on.
pub fn intercept_console(level: &str, debug: bool) -> ConsoleGuard {
    let fallback = if debug { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    ConsoleGuard {
        _guard: tracing::subscriber::set_default(subscriber),
    }
}
