use std::path::PathBuf;
use std::time::Duration;

use crate::error::RunnerError;

/// Settings for one runner invocation, read from the environment the
/// coordinator (or the remote provider) launched us with.
#[derive(Clone)]
pub struct RunnerConfig {
    pub job_id: String,
    pub event_name: String,
    pub folder_id: String,
    pub owner_id: String,
    pub callback_url: String,
    pub callback_secret: Option<String>,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub manifest_dir: PathBuf,
    pub run_timeout: Duration,
    pub log_tail_lines: usize,
}

impl std::fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("job_id", &self.job_id)
            .field("event_name", &self.event_name)
            .field("folder_id", &self.folder_id)
            .field("owner_id", &self.owner_id)
            .field("callback_url", &self.callback_url)
            .field("callback_secret", &self.callback_secret.as_ref().map(|_| "<redacted>"))
            .field("command", &self.command)
            .field("manifest_dir", &self.manifest_dir)
            .field("run_timeout", &self.run_timeout)
            .field("log_tail_lines", &self.log_tail_lines)
            .finish()
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default                         |
    /// |--------------------|---------------------------------|
    /// | `DRIVE_FOLDER_ID`  | required                        |
    /// | `CALLBACK_URL`     | required                        |
    /// | `EVENT_NAME`       | `event`                         |
    /// | `JOB_ID`           | value of `EVENT_NAME`           |
    /// | `OWNER_ID`         | `public`                        |
    /// | `CALLBACK_SECRET`  | unset                           |
    /// | `INDEXER_COMMAND`  | `/bin/bash /app/entrypoint.sh`  |
    /// | `MANIFEST_DIR`     | `/app`                          |
    /// | `RUN_TIMEOUT_SECS` | `7200`                          |
    /// | `LOG_TAIL_LINES`   | `60`                            |
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RunnerError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| var(key).ok_or(RunnerError::MissingVar(key));

        let folder_id = required("DRIVE_FOLDER_ID")?;
        let callback_url = required("CALLBACK_URL")?;
        let event_name = var("EVENT_NAME").unwrap_or_else(|| "event".into());
        let job_id = var("JOB_ID").unwrap_or_else(|| event_name.clone());
        let owner_id = var("OWNER_ID").unwrap_or_else(|| "public".into());

        for (name, value) in [("EVENT_NAME", &event_name), ("OWNER_ID", &owner_id)] {
            if !is_safe_path_component(value) {
                return Err(RunnerError::InvalidVar {
                    var: name,
                    reason: format!("'{value}' is not a safe file name component"),
                });
            }
        }

        let command: Vec<String> = var("INDEXER_COMMAND")
            .unwrap_or_else(|| "/bin/bash /app/entrypoint.sh".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let run_timeout_secs: u64 = match var("RUN_TIMEOUT_SECS") {
            None => 7200,
            Some(v) => v.parse().map_err(|_| RunnerError::InvalidVar {
                var: "RUN_TIMEOUT_SECS",
                reason: format!("'{v}' is not a valid u64"),
            })?,
        };
        let log_tail_lines: usize = match var("LOG_TAIL_LINES") {
            None => 60,
            Some(v) => v.parse().map_err(|_| RunnerError::InvalidVar {
                var: "LOG_TAIL_LINES",
                reason: format!("'{v}' is not a valid count"),
            })?,
        };

        Ok(Self {
            job_id,
            event_name,
            folder_id,
            owner_id,
            callback_url,
            callback_secret: var("CALLBACK_SECRET"),
            command,
            manifest_dir: PathBuf::from(var("MANIFEST_DIR").unwrap_or_else(|| "/app".into())),
            run_timeout: Duration::from_secs(run_timeout_secs),
            log_tail_lines,
        })
    }
}

/// Allowed characters: alphanumeric, hyphen, underscore, dot. No leading
/// dot, so the value cannot name a parent or hidden file.
pub fn is_safe_path_component(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 128
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
