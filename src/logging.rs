use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `GLIPSO_LOG=debug`.
pub const LOG_ENV: &str = "GLIPSO_LOG";

/// Installs a stderr subscriber filtered by `GLIPSO_LOG`, defaulting to `warn`.
/// Calling it again once a subscriber is installed does nothing.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
