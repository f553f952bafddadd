//! Local runner launcher.
//!
//! Spawns the job runner binary on this machine with the job parameters
//! in its environment. The runner reports back through the callback URL
//! exactly like a remote provider would, so dispatch returns as soon as
//! the process has started.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProviderError;
use crate::request::DispatchRequest;
use crate::ComputeProvider;

/// Launches one runner process per dispatched job.
#[derive(Debug, Clone)]
pub struct ProcessProvider {
    program: String,
    args: Vec<String>,
    callback_secret: Option<String>,
}

impl ProcessProvider {
    /// Build from a whitespace-separated command line, e.g.
    /// `pixeltrace-worker` or `/usr/local/bin/runner --verbose`.
    pub fn from_command_line(command: &str) -> Result<Self, ProviderError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ProviderError::Config("runner command is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            callback_secret: None,
        })
    }

    /// Forward the shared secret to the runner as `CALLBACK_SECRET`.
    pub fn with_callback_secret(mut self, secret: Option<String>) -> Self {
        self.callback_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ComputeProvider for ProcessProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<serde_json::Value, ProviderError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(false);
        for (key, value) in request.env_vars() {
            command.env(key, value);
        }
        if let Some(secret) = &self.callback_secret {
            command.env("CALLBACK_SECRET", secret);
        }

        let mut child = command.spawn().map_err(|source| ProviderError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let pid = child.id();

        tracing::info!(
            job_id = %request.job_id,
            pid = ?pid,
            command = %self.command_line(),
            "Runner process started",
        );

        // Reap the child so it does not linger as a zombie.
        let job_id = request.job_id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!(job_id = %job_id, "Runner process exited");
                }
                Ok(status) => {
                    tracing::warn!(job_id = %job_id, code = ?status.code(), "Runner process exited with failure");
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to wait for runner process");
                }
            }
        });

        Ok(serde_json::json!({
            "runner": "process",
            "pid": pid,
            "command": self.command_line(),
        }))
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
