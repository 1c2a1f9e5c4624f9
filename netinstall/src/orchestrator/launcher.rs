//! Starting the downloaded installer and watching it exit.

use std::fs;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::info;

/// Exit status of a finished installer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A started installer process.
pub trait RunningProcess: Send {
    /// Exit status if the process has finished, without blocking.
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    /// Terminate the process.
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts installer processes.
pub trait ProcessLauncher: Send + Sync {
    /// Start the executable at `path` with no arguments.
    fn launch(&self, path: &Path) -> io::Result<Box<dyn RunningProcess>>;
}

/// Launcher backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, path: &Path) -> io::Result<Box<dyn RunningProcess>> {
        make_executable(path)?;
        let child = Command::new(path).stdin(Stdio::null()).spawn()?;
        info!(path = %path.display(), pid = child.id(), "Installer started");
        Ok(Box::new(ChildProcess(child)))
    }
}

struct ChildProcess(Child);

impl RunningProcess for ChildProcess {
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self
            .0
            .try_wait()?
            .map(|status| ProcessExit { code: status.code() }))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.0.kill()?;
        // Reap so the child does not linger as a zombie.
        self.0.wait().map(|_| ())
    }
}

/// Add execute permission for owner, group and others.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    if mode & 0o111 == 0o111 {
        return Ok(());
    }
    permissions.set_mode(mode | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> io::Result<()> {
    fs::metadata(path).map(|_| ())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn wait_for(process: &mut Box<dyn RunningProcess>) -> ProcessExit {
        for _ in 0..200 {
            if let Some(exit) = process.try_wait().unwrap() {
                return exit;
            }
            thread::sleep(Duration::from_millis(25));
        }
        panic!("process did not exit");
    }

    fn script(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("setup.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        path
    }

    #[test]
    fn test_launch_true_succeeds() {
        let mut process = SystemLauncher.launch(Path::new("/bin/true")).unwrap();
        assert!(wait_for(&mut process).success());
    }

    #[test]
    fn test_launch_false_reports_code() {
        let mut process = SystemLauncher.launch(Path::new("/bin/false")).unwrap();
        let exit = wait_for(&mut process);
        assert!(!exit.success());
        assert_eq!(exit.code, Some(1));
    }

    #[test]
    fn test_launch_sets_execute_bit() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "exit 3");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut process = SystemLauncher.launch(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        assert_eq!(wait_for(&mut process).code, Some(3));
    }

    #[test]
    fn test_launch_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(SystemLauncher.launch(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_kill_terminates_process() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "sleep 30");

        let mut process = SystemLauncher.launch(&path).unwrap();
        assert!(process.try_wait().unwrap().is_none());
        process.kill().unwrap();

        let exit = wait_for(&mut process);
        assert!(!exit.success());
    }
}
