// Result classifier: turns a raw process outcome into a ToolResult

use crate::types::{ExecutionOutcome, FailureKind, ToolResult};
use std::time::Duration;

/// Longest stderr excerpt carried in a failure detail
const MAX_DETAIL_CHARS: usize = 2000;

/// Classify an outcome. First matching rule wins:
/// timeout, non-zero exit, truncated stdout, undecodable stdout, empty stdout, success.
pub fn classify(outcome: &ExecutionOutcome) -> ToolResult {
    if outcome.timed_out {
        return ToolResult::failure(
            FailureKind::TimedOut,
            format!(
                "{} exceeded {}",
                format_duration(outcome.elapsed),
                format_duration(outcome.timeout)
            ),
        );
    }

    match outcome.exit_code {
        Some(0) => {}
        code => return ToolResult::failure(FailureKind::NonZeroExit, exit_detail(code, outcome)),
    }

    if outcome.stdout_truncated {
        return ToolResult::failure(
            FailureKind::OutputTooLarge,
            format!(
                "output exceeded the capture limit ({} bytes captured)",
                outcome.stdout.len()
            ),
        );
    }

    let Ok(stdout) = std::str::from_utf8(&outcome.stdout) else {
        return ToolResult::failure(FailureKind::MalformedOutput, "output is not valid UTF-8");
    };

    let payload = stdout.trim_end();
    if payload.is_empty() {
        return ToolResult::failure(FailureKind::MalformedOutput, "empty result");
    }

    ToolResult::success(payload)
}

fn exit_detail(code: Option<i32>, outcome: &ExecutionOutcome) -> String {
    let status = match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };

    let stderr = String::from_utf8_lossy(&outcome.stderr);
    let stderr = stderr.trim();
    let mut detail = if stderr.is_empty() {
        status
    } else {
        format!("{}: {}", status, truncate_chars(stderr, MAX_DETAIL_CHARS))
    };

    if outcome.stderr_truncated || stderr.chars().count() > MAX_DETAIL_CHARS {
        detail.push_str(" (stderr truncated)");
    }
    detail
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}
