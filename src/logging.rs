use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Maps the `log_level` config string onto a tracing level. Anything that
/// does not parse ("verbose", an empty string, no value at all) means INFO.
pub fn resolve_level(log_level: Option<&str>) -> Level {
    log_level
        .map(str::trim)
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// Installs the fmt subscriber for both binaries. A subscriber that is
/// already installed wins; the call then does nothing.
pub fn init_logging(log_level: Option<&str>) {
    let subscriber = FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(resolve_level(log_level))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
