use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "tube_mp3_server=info,tower_http=info";

/// Build the filter from `RUST_LOG`, or from `fallback` when it is unset or
/// unparsable.
pub fn resolve_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init_tracing(fallback: Option<&str>) {
    let filter = resolve_filter(fallback.unwrap_or(DEFAULT_LOG_FILTER));

    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
