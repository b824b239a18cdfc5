//! Timeout-bounded execution of external processes.
//!
//! Used for external validators and, on explicit request by a caller, for
//! completion scripts. Every invocation runs in its own child process with
//! null stdio; a child that outlives its timeout is killed and reaped.

use std::ffi::OsStr;
use std::io::{ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::ExecutionError;

/// Default time budget for one external invocation (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Runs `program` with `args` and waits at most `timeout` for it to exit.
///
/// # Errors
///
/// Returns [`ExecutionError`] when the program cannot be spawned, is killed
/// after the timeout, or exits without a status code.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use config_schema_engine::exec::run_with_timeout;
///
/// let status = run_with_timeout("true", &[] as &[&str], Duration::from_secs(1)).unwrap();
/// assert!(status.success());
/// ```
pub fn run_with_timeout<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<ExitStatus, ExecutionError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let status = wait_or_kill(&mut child, program, timeout)?;
    if status.code().is_none() {
        warn!(program, "Validator terminated without exit code");
        return Err(ExecutionError::Crashed(program.to_string()));
    }
    Ok(status)
}

/// Runs `program` and returns its stdout split on whitespace.
///
/// The child's stdout is drained on a background thread so a chatty
/// process cannot block on a full pipe before the timeout fires.
pub fn capture_lines_with_timeout<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<Vec<String>, ExecutionError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let stdout_thread = child.stdout.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let result = pipe.read_to_end(&mut buf);
            (buf, result)
        })
    });

    let status = wait_or_kill(&mut child, program, timeout)?;
    if status.code().is_none() {
        return Err(ExecutionError::Crashed(program.to_string()));
    }

    let stdout = stdout_thread
        .and_then(|t| t.join().ok())
        .map(|(buf, res)| {
            if let Err(e) = res {
                debug!(program, error = %e, "Failed to read stdout");
            }
            buf
        })
        .unwrap_or_default();

    Ok(String::from_utf8_lossy(&stdout)
        .split_whitespace()
        .map(String::from)
        .collect())
}

fn wait_or_kill(
    child: &mut std::process::Child,
    program: &str,
    timeout: Duration,
) -> Result<ExitStatus, ExecutionError> {
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok(status),
        Ok(None) => {
            let timeout_ms = timeout.as_millis() as u64;
            warn!(program, timeout_ms, "External process timed out, killing process");
            let _ = child.kill();
            let _ = child.wait();
            Err(ExecutionError::Timeout {
                program: program.to_string(),
                timeout_ms,
            })
        }
        Err(e) => {
            debug!(program, error = %e, "Failed to wait on external process");
            let _ = child.kill();
            let _ = child.wait();
            Err(ExecutionError::Wait {
                program: program.to_string(),
                message: e.to_string(),
            })
        }
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> ExecutionError {
    debug!(program, error = %e, "Failed to spawn external process");
    match e.kind() {
        ErrorKind::NotFound => ExecutionError::NotFound(program.to_string()),
        ErrorKind::PermissionDenied => ExecutionError::PermissionDenied(program.to_string()),
        _ => ExecutionError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        },
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const NO_ARGS: &[&str] = &[];

    #[test]
    fn test_exit_codes_are_reported() {
        let ok = run_with_timeout("true", NO_ARGS, Duration::from_secs(5)).unwrap();
        assert!(ok.success());
        let fail = run_with_timeout("false", NO_ARGS, Duration::from_secs(5)).unwrap();
        assert!(!fail.success());
    }

    #[test]
    fn test_missing_binary_is_not_found() {
        let err = run_with_timeout(
            "/nonexistent/config-schema-validator",
            NO_ARGS,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound(_)));
    }

    #[test]
    fn test_hung_process_times_out() {
        let err = run_with_timeout("sleep", &["5"], Duration::from_millis(100)).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Timeout {
                program: "sleep".to_string(),
                timeout_ms: 100
            }
        );
    }

    #[test]
    fn test_capture_lines() {
        let lines = capture_lines_with_timeout("echo", &["eth0 eth1"], Duration::from_secs(5))
            .unwrap();
        assert_eq!(lines, vec!["eth0", "eth1"]);
    }
}
