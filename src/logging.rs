//! Tracing setup shared by the binaries

use tracing::Subscriber;
use tracing_subscriber::{
    fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::LoggingConfig;

fn env_or(directive: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(env_or(config.filter_directive()));

    if config.is_json() {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

/// Run `f` under a default stderr subscriber.
///
/// Used while the configuration itself is loading, before [`init`] can
/// know the configured level and format.
pub fn with_bootstrap<T>(f: impl FnOnce() -> T) -> T {
    let filter = env_or(LoggingConfig::default().filter_directive());
    tracing::subscriber::with_default(bootstrap_subscriber(filter, std::io::stderr), f)
}

fn bootstrap_subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    #[test]
    fn test_broken_config_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = bootstrap_subscriber(EnvFilter::new("warn"), move || writer.clone());

        tracing::subscriber::with_default(subscriber, || Config::load_first(&[path.clone()]));

        let logs = captured.text();
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("Failed to load config from"), "{}", logs);
    }

    #[test]
    fn test_bootstrap_returns_closure_value() {
        assert_eq!(with_bootstrap(|| 21 * 2), 42);
    }
}
