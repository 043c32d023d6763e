use std::time::Duration;

use clap::Parser;

/// Keeps a Service and a Deployment in sync with every Hello resource.
#[derive(Parser, Debug, Clone)]
#[command(name = "controller", version, about)]
pub struct Config {
    /// Only watch Hello resources in this namespace (all namespaces when unset).
    #[arg(long, env = "HELLO_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds to wait before re-checking a resource after creating or
    /// updating one of its children.
    #[arg(long, env = "HELLO_REQUEUE_AFTER_SECS", default_value_t = 2)]
    pub requeue_after_secs: u64,

    /// Seconds to wait before retrying a failed reconciliation.
    #[arg(long, env = "HELLO_ERROR_BACKOFF_SECS", default_value_t = 3)]
    pub error_backoff_secs: u64,
}

impl Config {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_watch_all_namespaces() {
        let config = Config::try_parse_from(["controller"]).unwrap();
        assert_eq!(config.namespace, None);
        assert_eq!(config.requeue_after(), Duration::from_secs(2));
        assert_eq!(config.error_backoff(), Duration::from_secs(3));
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "controller",
            "--namespace",
            "demo",
            "--requeue-after-secs",
            "10",
            "--error-backoff-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("demo"));
        assert_eq!(config.requeue_after(), Duration::from_secs(10));
        assert_eq!(config.error_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_non_numeric_delay() {
        assert!(Config::try_parse_from(["controller", "--requeue-after-secs", "soon"]).is_err());
    }
}
