//! Child process handles.
//!
//! Output of each child goes to `<name>.log` in a directory the caller
//! owns. On drop the process is asked to stop, killed if it does not
//! within [`SHUTDOWN_GRACE`], and reaped.

use crate::error::HarnessError;
use log::{debug, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time a child gets to exit after SIGTERM before it is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct ChildProcess {
    name: String,
    child: Child,
    log_path: PathBuf,
}

impl ChildProcess {
    /// Spawn `binary args..` with stdout and stderr appended to
    /// `<log_dir>/<name>.log`.
    pub fn spawn(
        name: &str,
        binary: &Path,
        args: &[String],
        log_dir: &Path,
    ) -> Result<Self, HarnessError> {
        let spawn_err = |source| HarnessError::Spawn {
            name: name.to_string(),
            binary: binary.to_path_buf(),
            source,
        };

        let log_path = log_dir.join(format!("{}.log", name));
        let stdout = File::create(&log_path).map_err(spawn_err)?;
        let stderr = stdout.try_clone().map_err(spawn_err)?;

        debug!("spawning {}: {} {}", name, binary.display(), args.join(" "));
        let child = Command::new(binary)
            .args(args)
            .current_dir(log_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(spawn_err)?;

        Ok(Self {
            name: name.to_string(),
            child,
            log_path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Error if the process has already exited.
    pub fn ensure_running(&mut self) -> Result<(), HarnessError> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(HarnessError::Exited {
                name: self.name.clone(),
                status: status.to_string(),
            }),
            Err(e) => Err(HarnessError::Exited {
                name: self.name.clone(),
                status: e.to_string(),
            }),
        }
    }

    /// Wait up to `timeout` for the process to exit. Blocks the thread.
    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
        true
    }

    /// Send SIGTERM, then SIGKILL if the process is still up after `grace`.
    /// Reaps the process. Safe to call more than once.
    pub fn stop(&mut self, grace: Duration) {
        if !self.is_running() {
            return;
        }
        debug!("stopping {} (pid {})", self.name, self.child.id());
        match terminate(&self.child) {
            Ok(()) if self.wait_for_exit(grace) => return,
            Ok(()) => warn!("{} still running after {:?}, killing", self.name, grace),
            Err(e) => warn!("failed to signal {}: {}", self.name, e),
        }
        if let Err(e) = self.child.kill() {
            warn!("failed to kill {}: {}", self.name, e);
        }
        let _ = self.child.wait();
    }

    /// [`stop`](Self::stop) with the default grace period.
    pub fn kill(&mut self) {
        self.stop(SHUTDOWN_GRACE);
    }
}

#[cfg(unix)]
fn terminate(child: &Child) -> std::io::Result<()> {
    let result = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(_: &Child) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no graceful stop on this platform",
    ))
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sleep_args(secs: &str) -> Vec<String> {
        vec![secs.to_string()]
    }

    #[test]
    fn test_kill_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut child =
            ChildProcess::spawn("sleeper", Path::new("sleep"), &sleep_args("30"), dir.path())
                .unwrap();
        assert!(child.is_running());
        assert!(child.ensure_running().is_ok());
        let pid = child.id();
        drop(child);
        // /proc entry disappears once the child is reaped.
        assert!(!Path::new(&format!("/proc/{}", pid)).exists());
    }

    #[test]
    fn test_kill_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut child =
            ChildProcess::spawn("sleeper", Path::new("sleep"), &sleep_args("30"), dir.path())
                .unwrap();
        child.kill();
        child.kill();
        assert!(!child.is_running());
    }

    #[test]
    fn test_exited_process_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut child =
            ChildProcess::spawn("quick", Path::new("true"), &[], dir.path()).unwrap();
        assert!(child.wait_for_exit(Duration::from_secs(5)));
        assert!(matches!(
            child.ensure_running(),
            Err(HarnessError::Exited { .. })
        ));
    }

    #[test]
    fn test_stop_terminates_gracefully() {
        use std::os::unix::process::ExitStatusExt;

        let dir = tempfile::tempdir().unwrap();
        let mut child =
            ChildProcess::spawn("sleeper", Path::new("sleep"), &sleep_args("30"), dir.path())
                .unwrap();
        let started = Instant::now();
        child.stop(Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(5));
        let status = child.child.try_wait().unwrap().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn test_stop_kills_after_grace() {
        use std::os::unix::process::ExitStatusExt;

        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), "trap '' TERM; exec sleep 30".to_string()];
        let mut child =
            ChildProcess::spawn("stubborn", Path::new("sh"), &args, dir.path()).unwrap();
        // Let the shell install the trap first.
        std::thread::sleep(Duration::from_millis(300));

        let grace = Duration::from_millis(300);
        let started = Instant::now();
        child.stop(grace);
        assert!(started.elapsed() >= grace);
        assert!(!child.is_running());
        let status = child.child.try_wait().unwrap().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChildProcess::spawn(
            "ghost",
            Path::new("/nonexistent/salviumd"),
            &[],
            dir.path(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn test_output_goes_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = ChildProcess::spawn(
            "echo",
            Path::new("echo"),
            &["hello".to_string()],
            dir.path(),
        )
        .unwrap();
        let _ = child.child.wait();
        let log = std::fs::read_to_string(child.log_path()).unwrap();
        assert_eq!(log.trim(), "hello");
    }
}
