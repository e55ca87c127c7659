use std::sync::Once;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Installs the fmt subscriber once; `RUST_LOG` overrides the default filter.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        if let Err(err) = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .try_init()
        {
            eprintln!("framecam: tracing subscriber already installed: {err}");
        }
    });
}
