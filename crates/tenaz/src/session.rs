//! Session Context: the documents one test case is working with.
//!
//! A session owns the driver handle and tracks three things:
//!
//! - the **primary** document the test case started on,
//! - the **active** document interactions are currently issued against,
//! - transient **secondary** documents (popups, new tabs) opened on the way.
//!
//! Invariant: a secondary must be closed and focus returned to the primary
//! before anything else is issued against the primary. [`SessionContext::reconcile`]
//! restores that state and is the only way back to the primary.

use crate::driver::{DocumentId, Driver};
use crate::result::{TenazError, TenazResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-test-case session state
pub struct SessionContext {
    id: Uuid,
    driver: Arc<dyn Driver>,
    primary: DocumentId,
    active: DocumentId,
    secondaries: Vec<DocumentId>,
    visits: Vec<String>,
    attempt_deadline: Option<Instant>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("id", &self.id)
            .field("primary", &self.primary)
            .field("active", &self.active)
            .field("secondaries", &self.secondaries)
            .field("visits", &self.visits)
            .field("attempt_deadline", &self.attempt_deadline)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Create a session on an explicit primary document
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, primary: DocumentId) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, primary = %primary, "session created");
        Self {
            id,
            driver,
            active: primary.clone(),
            primary,
            secondaries: Vec::new(),
            visits: Vec::new(),
            attempt_deadline: None,
        }
    }

    /// Create a session on the first document the driver reports
    pub async fn attach(driver: Arc<dyn Driver>) -> TenazResult<Self> {
        let primary = driver
            .documents()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TenazError::DocumentError {
                message: "driver has no open document".into(),
            })?;
        Ok(Self::new(driver, primary))
    }

    /// Session identifier used in log events
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The driver
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Shared handle to the driver, for work that also mutates the session
    #[must_use]
    pub fn driver_handle(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// The document the test case started on
    #[must_use]
    pub const fn primary(&self) -> &DocumentId {
        &self.primary
    }

    /// The document interactions currently target
    #[must_use]
    pub const fn active(&self) -> &DocumentId {
        &self.active
    }

    /// Secondary documents still open
    #[must_use]
    pub fn secondaries(&self) -> &[DocumentId] {
        &self.secondaries
    }

    /// No secondary open and the primary is active
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.secondaries.is_empty() && self.active == self.primary
    }

    /// Track a document that opened during an interaction
    pub fn track_secondary(&mut self, doc: DocumentId) {
        if doc != self.primary && !self.secondaries.contains(&doc) {
            debug!(session = %self.id, document = %doc, "tracking secondary document");
            self.secondaries.push(doc);
        }
    }

    /// Make a tracked secondary the active document
    pub fn switch_to(&mut self, doc: &DocumentId) -> TenazResult<()> {
        if !self.secondaries.contains(doc) {
            return Err(TenazError::InvalidState {
                message: format!("{doc} is not a tracked secondary document"),
            });
        }
        self.active = doc.clone();
        Ok(())
    }

    /// Record a destination observed during the current intent
    pub fn record_visit(&mut self, url: impl Into<String>) {
        let url = url.into();
        debug!(session = %self.id, url = %url, "visit recorded");
        self.visits.push(url);
    }

    /// Destinations observed during the current intent
    #[must_use]
    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    /// Forget the visit log; done at the start of every intent
    pub fn clear_visits(&mut self) {
        self.visits.clear();
    }

    /// Bound the strategy attempt about to run to `budget`
    pub fn begin_attempt(&mut self, budget: Duration) {
        self.attempt_deadline = Some(Instant::now() + budget);
    }

    /// Clear the attempt bound
    pub fn end_attempt(&mut self) {
        self.attempt_deadline = None;
    }

    /// Time left in the running attempt, `None` outside of one
    #[must_use]
    pub fn attempt_remaining(&self) -> Option<Duration> {
        self.attempt_deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Close every secondary document and return focus to the primary.
    ///
    /// Documents the driver reports that the session never tracked (a popup
    /// that opened after its grace period) are closed as well. Returns
    /// [`TenazError::Unsettled`] if any secondary could not be closed.
    pub async fn reconcile(&mut self) -> TenazResult<()> {
        if let Ok(open) = self.driver.documents().await {
            for doc in open {
                if doc != self.primary && !self.secondaries.contains(&doc) {
                    info!(session = %self.id, document = %doc, "closing untracked document");
                    self.secondaries.push(doc);
                }
            }
        }

        let mut remaining = Vec::new();
        for doc in std::mem::take(&mut self.secondaries) {
            match self.driver.close_document(&doc).await {
                Ok(()) | Err(TenazError::UnknownDocument { .. }) => {
                    debug!(session = %self.id, document = %doc, "secondary document closed");
                }
                Err(e) => {
                    warn!(session = %self.id, document = %doc, error = %e, "failed to close secondary document");
                    remaining.push(doc);
                }
            }
        }
        self.secondaries = remaining;

        if let Err(e) = self.driver.bring_to_front(&self.primary).await {
            warn!(session = %self.id, error = %e, "failed to focus primary document");
            return Err(e);
        }
        self.active = self.primary.clone();

        if self.secondaries.is_empty() {
            Ok(())
        } else {
            Err(TenazError::Unsettled {
                open: self.secondaries.len(),
            })
        }
    }
}
