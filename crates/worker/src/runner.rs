//! Indexing subprocess execution.
//!
//! Runs the external indexing command, interleaving its stdout and stderr
//! line by line into a bounded tail, and kills it if it outlives the run
//! timeout.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::RunnerError;

/// How long to keep reading output after the child exits. Grandchildren
/// holding the pipes open must not stall the callback.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What the indexing command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Exit code, `None` if killed by a signal or by the timeout.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Last lines of merged stdout/stderr, oldest first, trimmed.
    pub log_tail: Vec<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ---------------------------------------------------------------------------
// Log tail
// ---------------------------------------------------------------------------

/// Ring buffer keeping the newest `capacity` lines.
#[derive(Debug)]
struct LogTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// Send each line of `reader` to `tx` until EOF.
///
/// Bytes that are not UTF-8 are replaced, never treated as an error: the
/// pipe must stay drained or the child dies on its next write.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                // The collector may be gone after the drain timeout; keep reading.
                let _ = tx.send(line);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading indexer output");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run `command` (program then arguments) with `env` added to the
/// inherited environment.
pub async fn run_command(
    command: &[String],
    env: &[(&str, &str)],
    timeout: Duration,
    tail_lines: usize,
) -> Result<RunReport, RunnerError> {
    let (program, args) = command.split_first().ok_or(RunnerError::InvalidVar {
        var: "INDEXER_COMMAND",
        reason: "command is empty".into(),
    })?;

    let mut child = Command::new(program)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

    tracing::info!(program = %program, pid = ?child.id(), "Indexer started");

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    let tail = Arc::new(Mutex::new(LogTail::new(tail_lines)));
    let collector = {
        let tail = Arc::clone(&tail);
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                tracing::debug!(target: "indexer", "{line}");
                if let Ok(mut tail) = tail.lock() {
                    tail.push(line);
                }
            }
        })
    };

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => (status?.code(), false),
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Indexer timed out, killing it");
            if let Err(e) = child.kill().await {
                tracing::error!(error = %e, "Failed to kill indexer");
            }
            (None, true)
        }
    };

    if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, collector).await.is_err() {
        tracing::warn!("Indexer output still open after exit, truncating log tail");
    }

    let log_tail = tail.lock().map(|t| t.snapshot()).unwrap_or_default();

    tracing::info!(exit_code = ?exit_code, timed_out, lines = log_tail.len(), "Indexer finished");

    Ok(RunReport {
        exit_code,
        timed_out,
        log_tail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_newest_lines() {
        let mut tail = LogTail::new(3);
        for i in 0..5 {
            tail.push(format!("line {i}"));
        }
        assert_eq!(tail.snapshot(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn zero_capacity_tail_keeps_nothing() {
        let mut tail = LogTail::new(0);
        tail.push("x".into());
        assert!(tail.snapshot().is_empty());
    }

    #[test]
    fn only_exit_zero_succeeds() {
        let report = |exit_code| RunReport {
            exit_code,
            timed_out: false,
            log_tail: vec![],
        };
        assert!(report(Some(0)).succeeded());
        assert!(!report(Some(1)).succeeded());
        assert!(!report(None).succeeded());
    }

    #[tokio::test]
    async fn invalid_utf8_lines_are_replaced_not_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(&b"first\n\xff\xfe bytes\r\nlast"[..], tx).await;

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        assert_eq!(lines, vec!["first", "\u{FFFD}\u{FFFD} bytes", "last"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_does_not_kill_the_command() {
        let command = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            r"printf '\377\n'; head -c 300000 /dev/zero | tr '\0' a; echo; echo done".to_string(),
        ];

        let report = run_command(&command, &[], Duration::from_secs(20), 3).await.unwrap();

        assert_eq!(report.exit_code, Some(0));
        assert!(!report.timed_out);
        assert_eq!(report.log_tail.len(), 3);
        assert_eq!(report.log_tail[0], "\u{FFFD}");
        assert_eq!(report.log_tail[1].len(), 300_000);
        assert_eq!(report.log_tail[2], "done");
    }
}
