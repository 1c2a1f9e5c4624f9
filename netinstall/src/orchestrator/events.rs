//! Events published by an install session, and the handle that receives them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state::SessionState;
use crate::error::{ErrorKind, InstallError};
use crate::transport::ProgressEvent;

/// Final result of an install session.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The installer ran and exited with code 0.
    Success { path: PathBuf },
    Failure(InstallError),
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error(&self) -> Option<&InstallError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(err) => Some(err),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(InstallError::kind)
    }

    /// Path of the installer that ran, on success.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Success { path } => Some(path),
            Self::Failure(_) => None,
        }
    }
}

/// Something the front-end should render.
#[derive(Debug)]
pub enum InstallEvent {
    Progress(ProgressEvent),
    Status(String),
    /// Always the last event of a session.
    Finished(InstallOutcome),
}

impl InstallEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Sending side of the event channel, owned by the session worker.
///
/// [`finish`](Self::finish) consumes the publisher, so nothing can be sent
/// after the terminal event.
#[derive(Debug)]
pub(crate) struct EventPublisher {
    tx: UnboundedSender<InstallEvent>,
}

impl EventPublisher {
    pub(crate) fn progress(&self, event: ProgressEvent) {
        self.send(InstallEvent::Progress(event));
    }

    pub(crate) fn status(&self, message: impl Into<String>) {
        self.send(InstallEvent::Status(message.into()));
    }

    pub(crate) fn finish(self, outcome: InstallOutcome) {
        self.send(InstallEvent::Finished(outcome));
    }

    fn send(&self, event: InstallEvent) {
        // The front-end may have gone away; the session still runs to completion.
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

pub(crate) fn channel() -> (EventPublisher, UnboundedReceiver<InstallEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventPublisher { tx }, rx)
}

/// Front-end side of a running install session.
pub struct InstallHandle {
    events: UnboundedReceiver<InstallEvent>,
    cancel: CancellationToken,
    state: Arc<Mutex<SessionState>>,
    worker: Option<JoinHandle<()>>,
}

impl InstallHandle {
    pub(crate) fn new(
        events: UnboundedReceiver<InstallEvent>,
        cancel: CancellationToken,
        state: Arc<Mutex<SessionState>>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            cancel,
            state,
            worker: Some(worker),
        }
    }

    /// Block until the next event. `None` once the session has finished and
    /// every event was received.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`events_mut`](Self::events_mut) there.
    pub fn recv(&mut self) -> Option<InstallEvent> {
        self.events.blocking_recv()
    }

    /// Next event if one is queued.
    pub fn try_recv(&mut self) -> Option<InstallEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// The underlying receiver, for async front-ends.
    pub fn events_mut(&mut self) -> &mut UnboundedReceiver<InstallEvent> {
        &mut self.events
    }

    /// Ask the session to stop. In-flight downloads are abandoned and a
    /// running installer process is killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this session, for signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Drain remaining events and return the outcome.
    ///
    /// Returns `None` only if the worker stopped without reporting one.
    pub fn wait(mut self) -> Option<InstallOutcome> {
        let mut outcome = None;
        while let Some(event) = self.events.blocking_recv() {
            if let InstallEvent::Finished(result) = event {
                outcome = Some(result);
            }
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                debug!("Install worker panicked");
            }
        }
        outcome
    }
}
