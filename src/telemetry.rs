use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the global subscriber: JSON lines or compact text, per config.
pub fn init_tracing(config: &LoggingConfig) {
    let (json, compact) = if config.json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer().compact()))
    };
    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(json)
        .with(compact)
        .init();
}

/// `RUST_LOG` when set, otherwise the configured directives. A malformed
/// configured filter falls back to `info` rather than silencing the daemon.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_config() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "warn,setpoint_optimizer::optimizer=debug".to_string(),
            json: false,
        };
        assert!(build_filter(&config)
            .to_string()
            .contains("setpoint_optimizer::optimizer=debug"));

        let broken = LoggingConfig {
            filter: "setpoint_optimizer=loud".to_string(),
            json: true,
        };
        assert_eq!(build_filter(&broken).to_string(), "info");
    }
}
