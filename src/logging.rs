use std::io;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber: stdout plus a daily log file under `logs/`.
///
/// `RUST_LOG` overrides the stdout filter when set.
pub fn configure_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,group_analysis=debug,model_selection=debug,model_io=debug"
    } else {
        "warn,model_selection=info,model_io=info"
    };

    // Stdout log configuration
    let stdout_log = fmt::layer().with_writer(io::stdout).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
    );

    // File log configuration
    let file_appender = rolling::daily("logs", "policy-groups.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(EnvFilter::new("info,group_analysis=debug,model_selection=debug"));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
