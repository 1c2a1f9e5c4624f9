//! Install session orchestration.
//!
//! The [`Installer`] owns the long-lived collaborators and starts sessions.
//! Each session runs on a dedicated worker thread and reports back through an
//! [`InstallHandle`].
//!
//! ```text
//! Installer::start()
//!     │
//!     ├──► TelemetryPinger (fire and forget)
//!     │
//!     └──► worker thread
//!            ResolvingPrimary ──► Downloading ─────────────┐
//!                   │ failure          │ failure            │
//!                   └──────► ResolvingFallback ──► Downloading
//!                                                           │
//!            verify ──► Launching ──► Waiting ──► Succeeded | Failed
//!
//!     InstallHandle ◄── Progress / Status events ... Finished(outcome)
//! ```
//!
//! Only one session may run per [`Installer`]; a second `start` while one
//! is in flight fails with [`InstallError::SessionActive`].

mod events;
mod guard;
mod launcher;
mod session;
mod state;

pub use events::{InstallEvent, InstallHandle, InstallOutcome};
pub use guard::{ActiveSession, SessionGuard};
pub use launcher::{make_executable, ProcessExit, ProcessLauncher, RunningProcess, SystemLauncher};
pub use session::{
    STATUS_COMPLETE, STATUS_FALLBACK, STATUS_LAUNCHING, STATUS_STARTING, STATUS_WAITING,
};
pub use state::SessionState;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::AuthHeaderGenerator;
use crate::config::InstallerConfig;
use crate::error::{InstallError, InstallResult};
use crate::resolver::{ReleaseResolver, SourceResolver};
use crate::telemetry::TelemetryPinger;
use crate::transport::{HttpTransport, Transport};
use session::{InstallSession, SessionDeps};

/// How often a running installer process is polled for exit.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Starts install sessions.
pub struct Installer {
    deps: SessionDeps,
    telemetry: Option<TelemetryPinger>,
    update_mode: bool,
    guard: SessionGuard,
}

impl Installer {
    /// Installer with the given resolver and transport, the system process
    /// launcher, no mirror credentials and no telemetry.
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        transport: Arc<dyn Transport>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            deps: SessionDeps {
                resolver,
                transport,
                launcher: Arc::new(SystemLauncher),
                auth: None,
                destination: destination.into(),
                poll_interval: DEFAULT_POLL_INTERVAL,
            },
            telemetry: None,
            update_mode: false,
            guard: SessionGuard::new(),
        }
    }

    /// Installer wired to the real network components described by `config`.
    pub fn from_config(config: &InstallerConfig) -> InstallResult<Self> {
        let resolver = ReleaseResolver::from_config(config)?;
        let transport = HttpTransport::with_settings(config.timeout, config.retry_policy())?;

        let mut installer =
            Self::new(Arc::new(resolver), Arc::new(transport), config.destination())
                .with_update_mode(config.update_mode);

        if let Some(auth) = &config.auth {
            let generator = AuthHeaderGenerator::new(auth.client_id, auth.secret.clone());
            installer = installer.with_auth(generator);
        }
        if let Some(pinger) = config
            .sources
            .telemetry_url
            .as_deref()
            .and_then(TelemetryPinger::new)
        {
            installer = installer.with_telemetry(pinger);
        }

        Ok(installer)
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.deps.launcher = launcher;
        self
    }

    /// Sign mirror requests with these credentials.
    pub fn with_auth(mut self, auth: AuthHeaderGenerator) -> Self {
        self.deps.auth = Some(auth);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryPinger) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_update_mode(mut self, update_mode: bool) -> Self {
        self.update_mode = update_mode;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.deps.poll_interval = interval;
        self
    }

    /// Where the installer is downloaded to.
    pub fn destination(&self) -> &Path {
        &self.deps.destination
    }

    /// Whether a session is currently running.
    pub fn is_busy(&self) -> bool {
        self.guard.is_active()
    }

    /// Start a session on a new worker thread.
    pub fn start(&self) -> InstallResult<InstallHandle> {
        let active = self.guard.try_acquire().ok_or(InstallError::SessionActive)?;

        info!(
            destination = %self.deps.destination.display(),
            update_mode = self.update_mode,
            "Starting install session"
        );

        if let Some(telemetry) = &self.telemetry {
            // Detached; the session never waits on it.
            let _ = telemetry.ping(self.update_mode);
        }

        let (publisher, events) = events::channel();
        let cancel = CancellationToken::new();
        let state = Arc::new(Mutex::new(SessionState::Idle));
        let session = InstallSession::new(self.deps.clone(), Arc::clone(&state), cancel.clone());

        // If spawning fails the closure is dropped, and the guard with it.
        let worker = thread::Builder::new()
            .name("install-session".to_string())
            .spawn(move || session.run(publisher, active))
            .map_err(|source| InstallError::Io {
                action: "start worker for",
                path: self.deps.destination.clone(),
                source,
            })?;

        Ok(InstallHandle::new(events, cancel, state, worker))
    }
}
