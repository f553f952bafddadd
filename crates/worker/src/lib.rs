//! Pixeltrace job runner.
//!
//! Executes the external indexing command for one job, picks up the
//! manifest it writes and reports the outcome to the coordinator with a
//! single logical callback.

pub mod callback;
pub mod config;
pub mod error;
pub mod manifest;
pub mod runner;

use pixeltrace_core::callback::CallbackPayload;

use crate::callback::CallbackClient;
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::manifest::Manifest;
use crate::runner::RunReport;

/// What happened to the indexing command, before it is turned into a
/// callback.
#[derive(Debug)]
pub enum JobOutcome {
    Ran { report: RunReport, manifest: Manifest },
    /// The command never started.
    NotStarted { error: String },
}

impl JobOutcome {
    /// Success means exit code 0 and a manifest on disk.
    pub fn succeeded(&self) -> bool {
        match self {
            JobOutcome::Ran { report, manifest } => report.succeeded() && manifest.is_found(),
            JobOutcome::NotStarted { .. } => false,
        }
    }

    /// Human-readable failure reason with the retained log tail.
    fn failure_message(&self) -> Option<String> {
        if self.succeeded() {
            return None;
        }
        let (headline, tail) = match self {
            JobOutcome::NotStarted { error } => (format!("Indexer failed to start: {error}"), &[] as &[String]),
            JobOutcome::Ran { report, manifest } => {
                let headline = if report.timed_out {
                    "Indexer timed out".to_string()
                } else if let Some(code) = report.exit_code.filter(|c| *c != 0) {
                    format!("Indexer exited with code {code}")
                } else if report.exit_code.is_none() {
                    "Indexer was terminated by a signal".to_string()
                } else if matches!(manifest, Manifest::Unreadable(_)) {
                    "Indexer manifest is unreadable".to_string()
                } else {
                    "Indexer finished without writing a manifest".to_string()
                };
                (headline, report.log_tail.as_slice())
            }
        };

        if tail.is_empty() {
            return Some(headline);
        }
        Some(format!(
            "{headline}\n--- last {} log lines ---\n{}",
            tail.len(),
            tail.join("\n")
        ))
    }

    /// Build the callback body for `config`'s job.
    pub fn into_payload(self, config: &RunnerConfig) -> CallbackPayload {
        let error_message = self.failure_message();
        let manifest = match self {
            JobOutcome::Ran { manifest, .. } => manifest.into_value(),
            JobOutcome::NotStarted { .. } => Manifest::Missing.into_value(),
        };
        CallbackPayload {
            event_id: Some(config.job_id.clone()),
            owner_id: Some(config.owner_id.clone()),
            error: error_message.is_some(),
            error_message,
            manifest: Some(manifest),
        }
    }
}

/// Run the indexing command described by `config`.
pub async fn execute(config: &RunnerConfig) -> Result<JobOutcome, RunnerError> {
    let env = [
        ("DRIVE_FOLDER_ID", config.folder_id.as_str()),
        ("OWNER_ID", config.owner_id.as_str()),
        ("EVENT_NAME", config.event_name.as_str()),
        ("JOB_ID", config.job_id.as_str()),
    ];

    let report = match runner::run_command(&config.command, &env, config.run_timeout, config.log_tail_lines).await {
        Ok(report) => report,
        Err(e @ (RunnerError::Spawn { .. } | RunnerError::InvalidVar { .. })) => {
            tracing::error!(error = %e, "Indexer could not be started");
            return Ok(JobOutcome::NotStarted { error: e.to_string() });
        }
        Err(e) => return Err(e),
    };

    let path = manifest::manifest_path(&config.manifest_dir, &config.owner_id, &config.event_name);
    let manifest = manifest::read_manifest(&path).await;

    Ok(JobOutcome::Ran { report, manifest })
}

/// Execute the job and deliver exactly one callback for it.
///
/// Returns whether the job succeeded. Errors mean the callback could not
/// be delivered.
pub async fn run_job(config: &RunnerConfig, client: &CallbackClient) -> Result<bool, RunnerError> {
    tracing::info!(
        job_id = %config.job_id,
        folder_id = %config.folder_id,
        owner_id = %config.owner_id,
        "Starting indexing job",
    );

    let outcome = match execute(config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Indexer run failed");
            JobOutcome::NotStarted { error: e.to_string() }
        }
    };
    let succeeded = outcome.succeeded();
    let payload = outcome.into_payload(config);

    client.deliver(&payload).await?;
    tracing::info!(job_id = %config.job_id, succeeded, "Job result reported");
    Ok(succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> RunnerConfig {
        RunnerConfig {
            job_id: "job-7".into(),
            event_name: "E1".into(),
            folder_id: "F1".into(),
            owner_id: "public".into(),
            callback_url: "http://coord/api/v1/callback".into(),
            callback_secret: None,
            command: vec!["true".into()],
            manifest_dir: PathBuf::from("/nonexistent"),
            run_timeout: Duration::from_secs(5),
            log_tail_lines: 60,
        }
    }

    fn ran(exit_code: Option<i32>, manifest: Manifest, tail: &[&str]) -> JobOutcome {
        JobOutcome::Ran {
            report: RunReport {
                exit_code,
                timed_out: false,
                log_tail: tail.iter().map(|s| s.to_string()).collect(),
            },
            manifest,
        }
    }

    #[test]
    fn clean_exit_with_manifest_is_success() {
        let payload = ran(Some(0), Manifest::Found(serde_json::json!({"n": 1})), &["ok"]).into_payload(&config());
        assert!(!payload.error);
        assert!(payload.error_message.is_none());
        assert_eq!(payload.event_id.as_deref(), Some("job-7"));
        assert_eq!(payload.manifest, Some(serde_json::json!({"n": 1})));
    }

    #[test]
    fn clean_exit_without_manifest_is_failure() {
        let payload = ran(Some(0), Manifest::Missing, &[]).into_payload(&config());
        assert!(payload.error);
        assert_eq!(
            payload.error_message.as_deref(),
            Some("Indexer finished without writing a manifest")
        );
        assert_eq!(payload.manifest, Some(serde_json::json!({"status": "manifest not found"})));
    }

    #[test]
    fn nonzero_exit_reports_code_and_tail() {
        let payload = ran(Some(3), Manifest::Missing, &["step 1", "boom"]).into_payload(&config());
        let message = payload.error_message.unwrap();
        assert!(message.starts_with("Indexer exited with code 3"));
        assert!(message.ends_with("step 1\nboom"));
    }

    #[test]
    fn not_started_is_failure() {
        let outcome = JobOutcome::NotStarted {
            error: "No such file".into(),
        };
        assert!(!outcome.succeeded());
        let payload = outcome.into_payload(&config());
        assert!(payload.error);
        assert!(payload.error_message.unwrap().contains("No such file"));
    }
}
