use std::str::FromStr;
use std::time::Duration;

/// Worker pool configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent worker tasks (default: `1`).
    pub worker_count: usize,
    /// How long an idle worker waits before polling again (default: 5s).
    pub poll_interval: Duration,
    /// How long shutdown waits for in-flight jobs (default: 30s).
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            poll_interval: Duration::from_millis(5_000),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `WORKER_COUNT`                 | `1`     |
    /// | `WORKER_POLL_INTERVAL_MS`      | `5000`  |
    /// | `WORKER_SHUTDOWN_TIMEOUT_SECS` | `30`    |
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_or("WORKER_COUNT", defaults.worker_count),
            poll_interval: Duration::from_millis(env_or(
                "WORKER_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            shutdown_timeout: Duration::from_secs(env_or(
                "WORKER_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.worker_count, 1);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn unset_or_garbage_values_use_the_default() {
        assert_eq!(env_or("WAVELENGTH_TEST_UNSET_VAR", 7u64), 7);
    }
}
