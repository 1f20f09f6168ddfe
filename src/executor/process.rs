//! Process supervision
//!
//! Owns one child process from spawn to terminal classification: pipe
//! setup, the timeout/drain/reap poll loop, and graceful-then-forceful
//! termination.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::{ExecutionResult, ExecutionStatus};

/// Borrowed form of the coordinator's streaming callback
pub(crate) type OutputSink<'a> = &'a (dyn Fn(&str, &str) + Send + Sync);

/// Interval between polls of a supervised child
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Grace window after SIGTERM before escalating to SIGKILL
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Window to confirm death after SIGKILL
const KILL_WAIT: Duration = Duration::from_secs(1);

/// Per-read deadline for a non-blocking pipe drain
const DRAIN_READ_WINDOW: Duration = Duration::from_millis(1);

/// Failure to create a child process
#[derive(Debug, Error)]
pub(crate) enum SpawnError {
    #[error("Failed to spawn test process: {0}")]
    Spawn(std::io::Error),
    #[error("Failed to open stdout pipe")]
    StdoutPipe,
    #[error("Failed to open stderr pipe")]
    StderrPipe,
}

/// Supervisor-owned record of one live child process
pub(crate) struct ProcessHandle {
    pub test_name: String,
    pub pid: i32,
    pub started: Instant,
    pub timeout: Duration,
    /// Read ends of the capture pipes; cleared once `wait_for_process` closes them
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
    /// Shared with the registry entry; false once termination observed
    pub running: Arc<AtomicBool>,
    child: Child,
}

/// Spawn a test binary under supervision.
///
/// The child inherits the parent environment overlaid with `env_overrides`
/// (override wins, new variables appended) and runs with no arguments
/// beyond the program name. With capture enabled both output streams are
/// piped; otherwise they pass through to the parent's.
pub(crate) fn spawn_process(
    executable: &Path,
    test_name: &str,
    timeout: Duration,
    working_dir: Option<&Path>,
    env_overrides: &HashMap<String, String>,
    capture_output: bool,
) -> Result<ProcessHandle, SpawnError> {
    let mut command = Command::new(executable);
    command.envs(env_overrides).kill_on_drop(true);

    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    if capture_output {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    let mut child = command.spawn().map_err(SpawnError::Spawn)?;
    let pid = child.id().map(|id| id as i32).unwrap_or(-1);

    let (stdout, stderr) = if capture_output {
        let stdout = child.stdout.take().ok_or(SpawnError::StdoutPipe)?;
        let stderr = child.stderr.take().ok_or(SpawnError::StderrPipe)?;
        (Some(stdout), Some(stderr))
    } else {
        (None, None)
    };

    debug!("spawned {} (pid {})", test_name, pid);

    Ok(ProcessHandle {
        test_name: test_name.to_string(),
        pid,
        started: Instant::now(),
        timeout,
        stdout,
        stderr,
        running: Arc::new(AtomicBool::new(true)),
        child,
    })
}

/// Wait for a supervised child, enforcing its timeout.
///
/// A poll loop rather than a blocking wait: each iteration checks the
/// deadline, drains both pipes without blocking (so the child never
/// deadlocks on a full pipe buffer), and reaps without blocking. The
/// short sleep between polls is the only suspension point.
pub(crate) async fn wait_for_process(
    handle: &mut ProcessHandle,
    callback: Option<OutputSink<'_>>,
) -> ExecutionResult {
    let mut result = ExecutionResult::new(&handle.test_name);
    result.status = ExecutionStatus::Success;

    let mut stdout_buf = String::new();
    let mut stderr_buf = String::new();

    while handle.running.load(Ordering::SeqCst) {
        if handle.started.elapsed() >= handle.timeout {
            result.timed_out = true;
            result.status = ExecutionStatus::Timeout;
            result.error_message = format!(
                "Test exceeded timeout of {}ms",
                handle.timeout.as_millis()
            );
            warn!(
                "{} timed out after {}ms",
                handle.test_name,
                handle.timeout.as_millis()
            );
            terminate_process(handle, false).await;
            break;
        }

        drain_output(handle, &mut stdout_buf, &mut stderr_buf, callback).await;

        match handle.child.try_wait() {
            Ok(Some(status)) => {
                handle.running.store(false, Ordering::SeqCst);

                if let Some(code) = status.code() {
                    result.exit_code = code;
                    if code != 0 {
                        result.status = ExecutionStatus::Failure;
                        result.error_message = format!("Test failed with exit code {code}");
                    }
                } else if let Some(signal_number) = status.signal() {
                    result.signal_number = signal_number;
                    result.status = ExecutionStatus::Crash;
                    result.error_message = format!(
                        "Test crashed with signal {}",
                        signal_to_string(signal_number)
                    );
                }
                break;
            }
            Ok(None) => {}
            Err(e) => {
                result.status = ExecutionStatus::SystemError;
                result.error_message = format!("Error waiting for process: {e}");
                break;
            }
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    // Catch anything flushed between the last poll and process death
    drain_output(handle, &mut stdout_buf, &mut stderr_buf, callback).await;
    result.stdout = stdout_buf;
    result.stderr = stderr_buf;
    result.duration_ms = handle.started.elapsed().as_millis() as u64;

    // Close both pipe read ends on every return path
    handle.stdout.take();
    handle.stderr.take();

    result
}

/// Terminate a supervised child.
///
/// With `force` false a SIGTERM is sent first and the child is given a
/// grace window before SIGKILL; with `force` true SIGKILL is immediate.
/// Returns whether termination was confirmed. Terminating a process that
/// is already gone is a no-op.
pub(crate) async fn terminate_process(handle: &mut ProcessHandle, force: bool) -> bool {
    if !handle.running.load(Ordering::SeqCst) {
        return true;
    }

    let pid = Pid::from_raw(handle.pid);

    if !force && signal::kill(pid, Signal::SIGTERM).is_ok() {
        debug!("sent SIGTERM to {} (pid {})", handle.test_name, handle.pid);
        if wait_for_exit(handle, TERM_GRACE).await {
            return true;
        }
        warn!("{} ignored SIGTERM, escalating to SIGKILL", handle.test_name);
    }

    // ESRCH here means the process is already gone; the reap below confirms
    let _ = signal::kill(pid, Signal::SIGKILL);
    wait_for_exit(handle, KILL_WAIT).await
}

/// Poll for process exit within a bounded window
async fn wait_for_exit(handle: &mut ProcessHandle, window: Duration) -> bool {
    let deadline = Instant::now() + window;
    loop {
        if matches!(handle.child.try_wait(), Ok(Some(_))) {
            handle.running.store(false, Ordering::SeqCst);
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Best-effort forceful kill used by engine-wide shutdown.
///
/// The owning supervisor's own reap observes the death and clears the
/// liveness flag; a pid that is already gone is a no-op.
pub(crate) fn kill_pid(pid: i32) {
    if pid <= 0 {
        return;
    }
    let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
}

/// Drain both pipes without blocking, forwarding fresh bytes to the
/// streaming callback as one combined chunk per call.
async fn drain_output(
    handle: &mut ProcessHandle,
    stdout_buf: &mut String,
    stderr_buf: &mut String,
    callback: Option<OutputSink<'_>>,
) {
    let mut fresh_out = String::new();
    let mut fresh_err = String::new();

    if let Some(stdout) = handle.stdout.as_mut() {
        read_available(stdout, &mut fresh_out).await;
    }
    if let Some(stderr) = handle.stderr.as_mut() {
        read_available(stderr, &mut fresh_err).await;
    }

    if fresh_out.is_empty() && fresh_err.is_empty() {
        return;
    }

    if let Some(callback) = callback {
        let combined = match (fresh_out.is_empty(), fresh_err.is_empty()) {
            (false, false) => format!("{fresh_out}\n{fresh_err}"),
            (false, true) => fresh_out.clone(),
            _ => fresh_err.clone(),
        };
        callback(&handle.test_name, &combined);
    }

    stdout_buf.push_str(&fresh_out);
    stderr_buf.push_str(&fresh_err);
}

/// Read all currently-available bytes from a pipe without blocking on more
async fn read_available<R>(reader: &mut R, out: &mut String) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut total = 0;
    let mut chunk = [0u8; 4096];

    loop {
        match timeout(DRAIN_READ_WINDOW, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => break, // EOF
            Ok(Ok(n)) => {
                out.push_str(&String::from_utf8_lossy(&chunk[..n]));
                total += n;
            }
            // read error, or nothing buffered right now
            Ok(Err(_)) | Err(_) => break,
        }
    }

    total
}

/// Human-readable label for a terminating signal.
///
/// The table is additive; unmapped values render as "Signal N".
pub(crate) fn signal_to_string(signal_number: i32) -> String {
    match signal_number {
        libc::SIGTERM => "SIGTERM (Terminated)".to_string(),
        libc::SIGKILL => "SIGKILL (Killed)".to_string(),
        libc::SIGSEGV => "SIGSEGV (Segmentation fault)".to_string(),
        libc::SIGABRT => "SIGABRT (Aborted)".to_string(),
        libc::SIGFPE => "SIGFPE (Floating point exception)".to_string(),
        libc::SIGILL => "SIGILL (Illegal instruction)".to_string(),
        libc::SIGBUS => "SIGBUS (Bus error)".to_string(),
        libc::SIGPIPE => "SIGPIPE (Broken pipe)".to_string(),
        n => format!("Signal {n}"),
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_signal_labels() {
        assert_eq!(signal_to_string(libc::SIGSEGV), "SIGSEGV (Segmentation fault)");
        assert_eq!(signal_to_string(libc::SIGABRT), "SIGABRT (Aborted)");
        assert_eq!(signal_to_string(libc::SIGKILL), "SIGKILL (Killed)");
        assert_eq!(signal_to_string(250), "Signal 250");
    }

    #[tokio::test]
    async fn test_spawn_wait_captures_output() {
        let env = HashMap::new();
        let mut handle = spawn_process(
            Path::new("/bin/echo"),
            "echo",
            Duration::from_secs(5),
            None,
            &env,
            true,
        )
        .expect("spawn /bin/echo");

        let result = wait_for_process(&mut handle, None).await;

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "\n");
        assert!(!result.timed_out);

        // Pipes are closed and cleared on return
        assert!(handle.stdout.is_none());
        assert!(handle.stderr.is_none());
    }

    #[tokio::test]
    async fn test_terminate_dead_process_is_noop() {
        let env = HashMap::new();
        let mut handle = spawn_process(
            Path::new("/bin/echo"),
            "echo",
            Duration::from_secs(5),
            None,
            &env,
            true,
        )
        .expect("spawn /bin/echo");

        let _ = wait_for_process(&mut handle, None).await;
        assert!(!handle.running.load(Ordering::SeqCst));

        // Both orders are no-ops once the process is gone
        assert!(terminate_process(&mut handle, false).await);
        assert!(terminate_process(&mut handle, true).await);
    }
}
