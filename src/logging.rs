// Tracing setup for the todo-atlas binary

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber.
///
/// Level comes from `RUST_LOG`, `warn` otherwise, which is enough to surface
/// the storage failures `persist` swallows. Logs go to stderr so command
/// output on stdout stays clean.
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).without_time().compact())
        .init();
}

fn env_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
