//! Scenario harness: a test case as an ordered list of intents under one deadline.
//!
//! The test runner sees one boolean plus a failure message; the message is the
//! reason trail of the intent that broke.

use crate::dispatcher::{Dispatcher, IntentReport};
use crate::intent::Intent;
use crate::result::TenazResult;
use crate::session::SessionContext;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Default per-test-case deadline (120 seconds)
pub const DEFAULT_SCENARIO_DEADLINE_MS: u64 = 120_000;

/// A named sequence of intents
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Intents in execution order
    pub intents: Vec<Intent>,
    /// Deadline for the whole scenario in milliseconds
    pub deadline_ms: u64,
}

impl Scenario {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intents: Vec::new(),
            deadline_ms: DEFAULT_SCENARIO_DEADLINE_MS,
        }
    }

    /// Append an intent
    #[must_use]
    pub fn step(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }

    /// Append an intent in place
    pub fn add_intent(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    /// Set the scenario deadline
    #[must_use]
    pub const fn with_deadline(mut self, ms: u64) -> Self {
        self.deadline_ms = ms;
        self
    }

    /// Number of intents
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// Run every intent in order; stops at the first failing intent.
    ///
    /// Each intent's deadline is clamped to what is left of the scenario's.
    pub async fn run(
        &self,
        dispatcher: &Dispatcher,
        session: &mut SessionContext,
    ) -> TenazResult<ScenarioReport> {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.deadline_ms);
        let mut reports = Vec::with_capacity(self.intents.len());
        info!(scenario = %self.name, intents = self.intents.len(), "running scenario");

        for (i, intent) in self.intents.iter().enumerate() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                warn!(scenario = %self.name, remaining = self.intents.len() - i, "scenario deadline exhausted");
                break;
            }
            let own = intent
                .deadline
                .unwrap_or_else(|| dispatcher.config().intent_deadline());
            let clamped = intent.clone().with_deadline(own.min(left));

            let report = dispatcher.dispatch(session, &clamped).await?;
            let passed = report.passed;
            reports.push(report);
            if !passed {
                break;
            }
        }

        Ok(ScenarioReport {
            name: self.name.clone(),
            planned: self.intents.len(),
            reports,
            duration: start.elapsed(),
        })
    }
}

/// Outcome of a scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Number of intents in the scenario
    pub planned: usize,
    /// Reports of the intents that ran
    pub reports: Vec<IntentReport>,
    /// Total duration
    pub duration: Duration,
}

impl ScenarioReport {
    /// Every planned intent ran and passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.reports.len() == self.planned && self.reports.iter().all(|r| r.passed)
    }

    /// Number of intents that passed
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.passed).count()
    }

    /// Why the scenario failed, if it did
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        if let Some(failed) = self.reports.iter().find(|r| !r.passed) {
            return failed.failure_message();
        }
        (self.reports.len() < self.planned).then(|| {
            format!(
                "{}: deadline exhausted with {} intent(s) not run",
                self.name,
                self.planned - self.reports.len()
            )
        })
    }
}
