//! Logging service

use crate::models::LogLevel;
use tracing_subscriber::EnvFilter;

/// Initialize logging with the specified level. `RUST_LOG` takes precedence when set.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match level {
        LogLevel::Error => "smsrelay_core=error,smsrelay=error",
        LogLevel::Warn => "smsrelay_core=warn,smsrelay=warn",
        LogLevel::Info => "smsrelay_core=info,smsrelay=info",
        LogLevel::Debug => "smsrelay_core=debug,smsrelay=debug",
        LogLevel::Trace => "smsrelay_core=trace,smsrelay=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
}

/// Log the outcome of one relayed message
pub fn log_delivery(provider: &str, message_id: &str, error: Option<&str>) {
    match error {
        None => tracing::info!(
            provider = provider,
            message_id = message_id,
            "SMS delivered"
        ),
        Some(error) => tracing::error!(
            provider = provider,
            message_id = message_id,
            error = error,
            "SMS delivery failed"
        ),
    }
}
