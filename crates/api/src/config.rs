use std::str::FromStr;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). A process-next run
    /// that outlives it keeps going in the background.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for embedded workers, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Worker tasks to run inside the server process (default: `0`).
    pub embedded_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 300,
            shutdown_timeout_secs: 30,
            embedded_workers: 0,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `300`                   |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `EMBEDDED_WORKERS`      | `0`                     |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST").unwrap_or(defaults.host);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Self {
            host,
            port: env_or("PORT", defaults.port),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs),
            embedded_workers: env_or("EMBEDDED_WORKERS", defaults.embedded_workers),
        }
    }
}
