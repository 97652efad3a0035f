use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes structured logging for the embedding process.
///
/// `default_filter` is used when `RUST_LOG` is not set, e.g. `"draftsmith=info"`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
