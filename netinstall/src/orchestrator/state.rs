//! Install session state machine.

use std::fmt;

/// Where an install session currently is.
///
/// ```text
/// Idle ─► ResolvingPrimary ─► Downloading ─► Launching ─► Waiting ─► Succeeded
///                │                 │
///                └──────┬──────────┘ (primary failed)
///                       ▼
///               ResolvingFallback ─► Downloading
///
/// any non-terminal state ─► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    ResolvingPrimary,
    ResolvingFallback,
    Downloading,
    Launching,
    Waiting,
    Succeeded,
    Failed,
}

impl SessionState {
    /// Whether the session has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed)
                | (Idle, ResolvingPrimary)
                | (ResolvingPrimary, Downloading)
                | (ResolvingPrimary, ResolvingFallback)
                | (Downloading, ResolvingFallback)
                | (ResolvingFallback, Downloading)
                | (Downloading, Launching)
                | (Launching, Waiting)
                | (Waiting, Succeeded)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingPrimary => "resolving primary",
            Self::ResolvingFallback => "resolving fallback",
            Self::Downloading => "downloading",
            Self::Launching => "launching",
            Self::Waiting => "waiting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
