/// Route the job runner calls back on, relative to [`ServerConfig::public_base_url`].
pub const CALLBACK_PATH: &str = "/api/v1/callback";

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Which compute provider receives dispatched jobs.
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// Remote serverless endpoint reached over HTTP.
    Http {
        url: String,
        api_key: Option<String>,
        timeout_secs: u64,
    },
    /// Runner binary launched on this machine.
    Process { command: String },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Http { url, api_key, timeout_secs } => f
                .debug_struct("Http")
                .field("url", url)
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .field("timeout_secs", timeout_secs)
                .finish(),
            ProviderConfig::Process { command } => {
                f.debug_struct("Process").field("command", command).finish()
            }
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development,
/// except `PROVIDER_URL` which is required when `PROVIDER=http`.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Externally reachable base URL used to build callback URLs.
    pub public_base_url: String,
    /// Pre-shared callback secret. `None` disables callback authentication.
    pub callback_secret: Option<String>,
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Record limit of the in-memory store.
    pub max_jobs: usize,
    pub provider: ProviderConfig,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("shutdown_timeout_secs", &self.shutdown_timeout_secs)
            .field("public_base_url", &self.public_base_url)
            .field("callback_secret", &self.callback_secret.as_ref().map(|_| "<redacted>"))
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_jobs", &self.max_jobs)
            .field("provider", &self.provider)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `PUBLIC_BASE_URL`       | `http://<host>:<port>`     |
    /// | `CALLBACK_SECRET`       | unset (insecure mode)      |
    /// | `DATABASE_URL`          | unset (in-memory store)    |
    /// | `MAX_JOBS`              | `100000`                   |
    /// | `PROVIDER`              | `http`                     |
    /// | `PROVIDER_URL`          | required for `http`        |
    /// | `PROVIDER_API_KEY`      | unset                      |
    /// | `PROVIDER_TIMEOUT_SECS` | `30`                       |
    /// | `RUNNER_COMMAND`        | `pixeltrace-worker`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(var("PORT"), "PORT", "a valid u16", 3000)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| axum::http::HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                expected: "a comma-separated list of origins",
                value: bad.clone(),
            });
        }

        let request_timeout_secs = parse(var("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", "a valid u64", 30)?;
        let shutdown_timeout_secs = parse(var("SHUTDOWN_TIMEOUT_SECS"), "SHUTDOWN_TIMEOUT_SECS", "a valid u64", 30)?;

        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| {
                let reachable = if host == "0.0.0.0" { "127.0.0.1" } else { host.as_str() };
                format!("http://{reachable}:{port}")
            })
            .trim_end_matches('/')
            .to_string();

        let max_jobs = parse(var("MAX_JOBS"), "MAX_JOBS", "a positive integer", 100_000usize)?;
        if max_jobs == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_JOBS",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let provider = match var("PROVIDER").as_deref().unwrap_or("http") {
            "http" => ProviderConfig::Http {
                url: var("PROVIDER_URL").ok_or(ConfigError::Missing("PROVIDER_URL"))?,
                api_key: var("PROVIDER_API_KEY"),
                timeout_secs: parse(var("PROVIDER_TIMEOUT_SECS"), "PROVIDER_TIMEOUT_SECS", "a valid u64", 30)?,
            },
            "process" => ProviderConfig::Process {
                command: var("RUNNER_COMMAND").unwrap_or_else(|| "pixeltrace-worker".into()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "PROVIDER",
                    expected: "one of 'http', 'process'",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            public_base_url,
            callback_secret: var("CALLBACK_SECRET"),
            database_url: var("DATABASE_URL"),
            max_jobs,
            provider,
        })
    }

    /// Absolute URL the job runner must POST its result to.
    pub fn callback_url(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.public_base_url)
    }
}

fn parse<T: std::str::FromStr>(
    raw: Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { var, expected, value }),
    }
}
