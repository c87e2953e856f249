use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SERVER_FILTER: &str = "info,blog_server=debug";
const CLI_FILTER: &str = "warn,blog_server=info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Verbose subscriber for the HTTP server. `RUST_LOG` overrides the filter.
pub fn init_logging() {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter(SERVER_FILTER))
        .with(fmt_layer)
        .init();

    tracing::info!("Logging initialized");
}

/// Quiet subscriber for the admin console. Logs go to stderr so command
/// output on stdout stays clean.
pub fn init_cli_logging() {
    let fmt_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when commands run in-process.
    let _ = tracing_subscriber::registry()
        .with(env_filter(CLI_FILTER))
        .with(fmt_layer)
        .try_init();
}
