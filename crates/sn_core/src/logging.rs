use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global subscriber once. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(json: bool) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        let result = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        if let Err(e) = result {
            eprintln!("Failed to initialize logging: {}", e);
        }
    });
}
