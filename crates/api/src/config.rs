/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Timeout for the retrain trigger route (default: `600`).
    ///
    /// A timed-out request does not abort the retrain itself.
    pub retrain_timeout_secs: u64,
    /// Time allowed for background tasks to drain at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Period of the automatic retrain check; `None` disables it.
    pub auto_retrain_interval_secs: Option<u64>,
    /// Age after which prediction and request log rows are purged (default: `30`).
    pub prediction_log_retention_days: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `8000`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `RETRAIN_TIMEOUT_SECS`          | `600`                   |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`                    |
    /// | `AUTO_RETRAIN_INTERVAL_SECS`    | unset (disabled)        |
    /// | `PREDICTION_LOG_RETENTION_DAYS` | `30`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let retrain_timeout_secs: u64 = std::env::var("RETRAIN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("RETRAIN_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let auto_retrain_interval_secs: Option<u64> = std::env::var("AUTO_RETRAIN_INTERVAL_SECS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.parse()
                    .expect("AUTO_RETRAIN_INTERVAL_SECS must be a valid u64")
            });

        let prediction_log_retention_days: i64 = std::env::var("PREDICTION_LOG_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("PREDICTION_LOG_RETENTION_DAYS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            retrain_timeout_secs,
            shutdown_timeout_secs,
            auto_retrain_interval_secs,
            prediction_log_retention_days,
        }
    }
}
