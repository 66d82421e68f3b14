//! Log output for the daemon and the one-shot CLI commands
//!
//! Records go to stderr so `variantd generate --json` keeps stdout for the
//! result document. Debug builds print human-readable lines; release builds
//! print one JSON object per line with the active span fields (`request_id`,
//! `directive`, `attempt`) attached.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber; `RUST_LOG` overrides `level` when set
///
/// Calling it a second time is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(filter);

    #[cfg(debug_assertions)]
    let installed = registry
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();

    #[cfg(not(debug_assertions))]
    let installed = registry
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

/// Filter directives applying `level` to our crate and the HTTP trace layer
fn default_directives(level: &str) -> String {
    ["", "variant_engine=", "tower_http="]
        .iter()
        .map(|target| format!("{target}{level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives("debug"),
            "debug,variant_engine=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_directives_parse_for_every_config_level() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok(), "{level}");
        }
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging("warn");
        init_logging("info");
    }
}
