//! External command execution with a hard deadline.
//!
//! stdin is fed and stdout/stderr are drained on helper threads so a chatty
//! child can never block on a full pipe while we poll for exit.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {}s", .timeout.as_secs_f32())]
    TimedOut { program: String, timeout: Duration },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error while talking to `{program}`")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured output of a successful run
#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program args..` in `cwd`, optionally writing `stdin`, and wait at most
/// `timeout`. Non-zero exit is an error.
pub fn run_with_timeout(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let feeder = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(input)) => {
            let input = input.to_owned();
            // Broken pipe just means the child stopped reading
            Some(thread::spawn(move || {
                let _ = pipe.write_all(input.as_bytes());
            }))
        }
        _ => None,
    };

    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::TimedOut {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(ProcessError::Io {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    if let Some(handle) = feeder {
        let _ = handle.join();
    }
    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    if !status.success() {
        return Err(ProcessError::Failed {
            program: program.to_string(),
            status,
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(ProcessOutput { stdout, stderr })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_captures_stdout() {
        let out = run_with_timeout("sh", &sh("echo hello"), None, None, Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_feeds_stdin() {
        let out = run_with_timeout("sh", &sh("cat"), None, Some("ping"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.stdout, "ping");
    }

    #[test]
    fn test_times_out() {
        let err = run_with_timeout("sh", &sh("sleep 5"), None, None, Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[test]
    fn test_non_zero_exit() {
        let err = run_with_timeout("sh", &sh("echo oops >&2; exit 3"), None, None, Duration::from_secs(5))
            .unwrap_err();
        match err {
            ProcessError::Failed { stderr, .. } => assert_eq!(stderr, "oops"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_missing_program() {
        let err = run_with_timeout(
            "definitely-not-a-real-binary-xyz",
            &[],
            None,
            None,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
