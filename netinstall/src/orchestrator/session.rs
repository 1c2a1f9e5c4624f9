//! The install session worker.
//!
//! One session runs on its own thread and owns everything it touches: the
//! chosen source, the download destination and the child process. It talks
//! to the outside world only through the [`EventPublisher`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::{EventPublisher, InstallOutcome};
use super::guard::ActiveSession;
use super::launcher::{ProcessExit, ProcessLauncher, RunningProcess};
use super::state::SessionState;
use crate::auth::AuthHeaderGenerator;
use crate::error::{InstallError, InstallResult};
use crate::resolver::{ResolvedSource, SourceResolver};
use crate::transport::{DownloadRequest, ProgressEvent, Transport};

pub const STATUS_STARTING: &str = "Starting installation...";
pub const STATUS_FALLBACK: &str = "Primary download failed. Trying backup source...";
pub const STATUS_LAUNCHING: &str = "Launching installer...";
pub const STATUS_WAITING: &str = "Waiting for the installer to finish...";
pub const STATUS_COMPLETE: &str = "Installation complete!";

/// Collaborators shared by every session of an [`Installer`](super::Installer).
#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub resolver: Arc<dyn SourceResolver>,
    pub transport: Arc<dyn Transport>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub auth: Option<AuthHeaderGenerator>,
    pub destination: PathBuf,
    pub poll_interval: Duration,
}

pub(crate) struct InstallSession {
    deps: SessionDeps,
    state: Arc<Mutex<SessionState>>,
    cancel: CancellationToken,
}

impl InstallSession {
    pub(crate) fn new(
        deps: SessionDeps,
        state: Arc<Mutex<SessionState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            deps,
            state,
            cancel,
        }
    }

    /// Run to completion, then publish exactly one terminal event.
    ///
    /// The guard is released before the terminal event goes out so a
    /// front-end reacting to it can start a new session immediately.
    pub(crate) fn run(self, events: EventPublisher, mut guard: ActiveSession) {
        let outcome = match self.execute(&events) {
            Ok(path) => {
                self.transition(SessionState::Succeeded);
                info!(path = %path.display(), "Installation succeeded");
                events.progress(ProgressEvent::Determinate(1.0));
                events.status(STATUS_COMPLETE);
                InstallOutcome::Success { path }
            }
            Err(err) => {
                self.transition(SessionState::Failed);
                error!(error = %err, kind = %err.kind(), "Installation failed");
                events.status(err.user_message());
                InstallOutcome::Failure(err)
            }
        };

        guard.release();
        events.finish(outcome);
    }

    fn execute(&self, events: &EventPublisher) -> InstallResult<PathBuf> {
        events.status(STATUS_STARTING);
        events.progress(ProgressEvent::Indeterminate);
        self.transition(SessionState::ResolvingPrimary);

        let path = match self.primary(events) {
            Ok(path) => path,
            Err(InstallError::Cancelled) => return Err(InstallError::Cancelled),
            Err(primary) => {
                warn!(error = %primary, "Primary source failed, trying fallback");
                events.status(STATUS_FALLBACK);
                events.progress(ProgressEvent::Indeterminate);
                self.transition(SessionState::ResolvingFallback);

                self.fallback(events).map_err(|fallback| match fallback {
                    InstallError::Cancelled => InstallError::Cancelled,
                    fallback => InstallError::SourcesExhausted {
                        primary: Box::new(primary),
                        fallback: Box::new(fallback),
                    },
                })?
            }
        };

        verify_artifact(&path)?;
        self.check_cancelled()?;

        self.transition(SessionState::Launching);
        events.status(STATUS_LAUNCHING);
        let process = self
            .deps
            .launcher
            .launch(&path)
            .map_err(|source| InstallError::LaunchFailed {
                path: path.clone(),
                source,
            })?;

        self.transition(SessionState::Waiting);
        events.status(STATUS_WAITING);
        let exit = self.wait_for_exit(process, &path)?;
        info!(code = ?exit.code, "Installer exited");

        if exit.success() {
            Ok(path)
        } else {
            Err(InstallError::InstallFailed { code: exit.code })
        }
    }

    fn primary(&self, events: &EventPublisher) -> InstallResult<PathBuf> {
        let source = self.deps.resolver.resolve_primary()?;
        self.download(source, events)
    }

    fn fallback(&self, events: &EventPublisher) -> InstallResult<PathBuf> {
        self.check_cancelled()?;
        let source = self.deps.resolver.resolve_fallback()?;
        self.download(source, events)
    }

    fn download(&self, source: ResolvedSource, events: &EventPublisher) -> InstallResult<PathBuf> {
        self.check_cancelled()?;

        let mut request = DownloadRequest::new(&source.url, &self.deps.destination);
        if source.origin.requires_auth() {
            match &self.deps.auth {
                Some(auth) => request = request.with_headers(auth.headers()),
                None => warn!(url = %source.url, "No mirror credentials configured, request is unsigned"),
            }
        }

        self.transition(SessionState::Downloading);
        info!(url = %source.url, origin = ?source.origin, "Downloading installer");

        let mut forward = |event: ProgressEvent| events.progress(event);
        let (path, bytes) = self
            .deps
            .transport
            .fetch(&request, &mut forward, &self.cancel)
            .into_result()?;

        debug!(path = %path.display(), bytes, "Download finished");
        Ok(path)
    }

    fn wait_for_exit(
        &self,
        mut process: Box<dyn RunningProcess>,
        path: &Path,
    ) -> InstallResult<ProcessExit> {
        loop {
            if self.cancel.is_cancelled() {
                info!("Cancelled while waiting, stopping installer");
                if let Err(e) = process.kill() {
                    warn!(error = %e, "Failed to stop installer");
                }
                return Err(InstallError::Cancelled);
            }

            match process.try_wait() {
                Ok(Some(exit)) => return Ok(exit),
                Ok(None) => thread::sleep(self.deps.poll_interval),
                Err(source) => {
                    return Err(InstallError::Io {
                        action: "wait for",
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }

    fn check_cancelled(&self) -> InstallResult<()> {
        if self.cancel.is_cancelled() {
            Err(InstallError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.state.lock();
        let current = *state;
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {} -> {}",
            current,
            next
        );
        debug!(from = %current, to = %next, "Session state");
        *state = next;
    }
}

/// The artifact must exist and be non-empty. An empty file is removed.
pub(crate) fn verify_artifact(path: &Path) -> InstallResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => {
            if let Err(e) = fs::remove_file(path) {
                debug!(error = %e, "Failed to remove empty download");
            }
            Err(InstallError::VerificationFailed {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            })
        }
        Err(e) => Err(InstallError::VerificationFailed {
            path: path.to_path_buf(),
            reason: format!("file is missing ({})", e),
        }),
    }
}
