//! Subprocess execution shared by the tool adapters.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::metrics;
use crate::pipeline::{Stage, StageError};

/// Runs `program` with `args` and returns its stdout.
///
/// Fails at `stage` on spawn errors, non-zero exit or timeout. The child is
/// killed if the timeout expires.
pub(crate) async fn run_tool(
    service: &str,
    program: &Path,
    args: &[String],
    stage: Stage,
    timeout_secs: u64,
) -> Result<String, StageError> {
    debug!(program = %program.display(), ?args, "Running tool");
    let start = Instant::now();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StageError::new(stage, format!("{} not found", program.display()))
            } else {
                StageError::new(stage, format!("failed to start {}: {}", program.display(), e))
            }
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let result = timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await;
    let elapsed = start.elapsed().as_secs_f64();

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            metrics::observe_external_call(service, stage.as_str(), elapsed, false);
            return Err(StageError::new(stage, format!("{} failed: {}", service, e)));
        }
        Err(_) => {
            metrics::observe_external_call(service, stage.as_str(), elapsed, false);
            return Err(StageError::timed_out(stage, timeout_secs));
        }
    };

    metrics::observe_external_call(service, stage.as_str(), elapsed, output.status.success());
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(classify_stderr(stage, service, &stderr));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Maps tool stderr to a typed stage error.
pub(crate) fn classify_stderr(stage: Stage, service: &str, stderr: &str) -> StageError {
    let lower = stderr.to_lowercase();
    let detail = last_error_line(stderr)
        .map(|line| format!("{}: {}", service, line))
        .unwrap_or_else(|| format!("{} exited with an error", service));

    if AGE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        StageError::age_restricted(stage, detail)
    } else if BLOCKED_MARKERS.iter().any(|marker| lower.contains(marker)) {
        StageError::source_blocked(stage, detail)
    } else {
        StageError::new(stage, detail)
    }
}

const AGE_MARKERS: &[&str] = &[
    "sign in to confirm your age",
    "age-restricted",
    "inappropriate for some users",
];

const BLOCKED_MARKERS: &[&str] = &[
    "http error 403",
    "403: forbidden",
    "blocked it in your country",
    "not available in your country",
];

const MAX_DETAIL_LEN: usize = 300;

fn last_error_line(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let line = lines
        .iter()
        .rev()
        .find(|line| line.contains("ERROR"))
        .or_else(|| lines.last())?;
    Some(line.chars().take(MAX_DETAIL_LEN).collect())
}
