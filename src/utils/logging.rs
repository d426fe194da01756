//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Output format for the fmt subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Build the filter from an explicit directive, falling back to `RUST_LOG`
pub fn build_filter(directive: Option<&str>) -> EnvFilter {
    match directive {
        Some(d) if !d.trim().is_empty() => {
            EnvFilter::try_new(d).unwrap_or_else(|_| EnvFilter::new("info"))
        }
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Install the global tracing subscriber.
///
/// Calling this twice is harmless: the second attempt is reported on stderr.
pub fn init_tracing(directive: Option<&str>, format: LogFormat) {
    let filter = build_filter(directive);

    let result = match format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt().with_env_filter(filter).finish(),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt().json().with_env_filter(filter).finish(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}
