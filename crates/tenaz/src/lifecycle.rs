//! State machine of one open-and-verify attempt.
//!
//! ```text
//! Idle -> Triggered -> AwaitingNewDocument ---------+
//!                   -> AwaitingSameDocumentNav -----+-> Verifying -> Reconciling -> Settled
//! (any non-terminal state) -> Failed
//! ```
//!
//! Illegal transitions are rejected with [`TenazError::InvalidState`].

use crate::result::{TenazError, TenazResult};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Phase of an open-and-verify attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing happened yet
    Idle,
    /// The trigger was clicked
    Triggered,
    /// A new document opened
    AwaitingNewDocument,
    /// No new document; watching the current one navigate
    AwaitingSameDocumentNav,
    /// Checking the destination
    Verifying,
    /// Closing or navigating back
    Reconciling,
    /// Done, session restored
    Settled,
    /// Done, with a reason trail
    Failed,
}

impl LifecycleState {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }

    /// Whether `self -> to` is a legal transition
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, to),
            (Self::Idle, Self::Triggered)
                | (
                    Self::Triggered,
                    Self::AwaitingNewDocument | Self::AwaitingSameDocumentNav
                )
                | (
                    Self::AwaitingNewDocument | Self::AwaitingSameDocumentNav,
                    Self::Verifying
                )
                | (Self::Verifying, Self::Reconciling)
                | (Self::Reconciling, Self::Settled)
                | (_, Self::Failed)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Triggered => "triggered",
            Self::AwaitingNewDocument => "awaiting-new-document",
            Self::AwaitingSameDocumentNav => "awaiting-same-document-nav",
            Self::Verifying => "verifying",
            Self::Reconciling => "reconciling",
            Self::Settled => "settled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase, the path taken and the notes collected on the way
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    path: Vec<LifecycleState>,
    notes: Vec<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            path: vec![LifecycleState::Idle],
            notes: Vec::new(),
        }
    }

    /// Current phase
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every phase visited, in order
    #[must_use]
    pub fn path(&self) -> &[LifecycleState] {
        &self.path
    }

    /// Notes and warnings collected so far
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Move to `to`
    pub fn advance(&mut self, to: LifecycleState) -> TenazResult<()> {
        if !self.state.can_transition(to) {
            return Err(TenazError::InvalidState {
                message: format!("illegal transition {} -> {to}", self.state),
            });
        }
        debug!(from = %self.state, to = %to, "lifecycle transition");
        self.state = to;
        self.path.push(to);
        Ok(())
    }

    /// Record a note without changing phase
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Record `reason` and move to `Failed`
    pub fn fail(&mut self, reason: impl Into<String>) -> TenazResult<()> {
        self.note(reason);
        self.advance(LifecycleState::Failed)
    }

    /// Notes joined for a reason trail
    #[must_use]
    pub fn summary(&self) -> String {
        self.notes.join("; ")
    }
}
