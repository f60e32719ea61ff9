//! Strategy Dispatcher: realize one intent by trying its strategies in order.
//!
//! For each strategy the dispatcher checks the remaining budget, runs the
//! strategy under `min(strategy timeout, remaining)`, and verifies the
//! intent's post-condition after a mechanical success. A success whose effect
//! does not show up is demoted to `Inconclusive` and the next strategy runs.
//! Once every strategy is exhausted, the post-condition is checked one last
//! time: effects that arrive late still count.
//!
//! The dispatcher causes no side effects itself; it times, verifies, logs, and
//! reconciles the session after every intent.

use crate::classifier::{AttemptClass, AttemptRecord, ReasonTrail};
use crate::config::EngineConfig;
use crate::intent::{Intent, IntentKind};
use crate::result::TenazResult;
use crate::session::SessionContext;
use crate::strategy::{default_strategies, Outcome, Strategy};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound for [`Strategy::abandon`] after a timed-out attempt
const ABANDON_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of dispatching one intent
#[derive(Debug, Clone, Serialize)]
pub struct IntentReport {
    /// Intent label
    pub label: String,
    /// Intent kind
    pub kind: IntentKind,
    /// Whether the post-condition was observed
    pub passed: bool,
    /// Strategy whose effect was verified
    pub winner: Option<String>,
    /// Every attempt, in order
    pub trail: ReasonTrail,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl IntentReport {
    /// Time spent on the intent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// The full trail when the intent failed
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        (!self.passed).then(|| self.trail.to_string())
    }
}

/// Runs intents against a session
pub struct Dispatcher {
    config: EngineConfig,
    sets: HashMap<IntentKind, Vec<Box<dyn Strategy>>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sets: HashMap<_, Vec<&str>> = self
            .sets
            .iter()
            .map(|(kind, set)| (kind, set.iter().map(|s| s.name()).collect()))
            .collect();
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("sets", &sets)
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Dispatcher {
    /// Dispatcher with the default strategy set for every kind
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let sets = [
            IntentKind::DragAndDrop,
            IntentKind::OpenAndVerify,
            IntentKind::FormFill,
            IntentKind::Check,
            IntentKind::SelectOption,
        ]
        .into_iter()
        .map(|kind| (kind, default_strategies(kind, &config)))
        .collect();
        Self { config, sets }
    }

    /// Replace the strategy set for one kind
    #[must_use]
    pub fn with_strategies(mut self, kind: IntentKind, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.sets.insert(kind, strategies);
        self
    }

    /// Engine configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Strategy names for a kind, in priority order
    #[must_use]
    pub fn strategy_names(&self, kind: IntentKind) -> Vec<&'static str> {
        self.sets
            .get(&kind)
            .map(|set| set.iter().map(|s| s.name()).collect())
            .unwrap_or_default()
    }

    /// Realize `intent`.
    ///
    /// Returns `Err` only when the session cannot be reconciled; every other
    /// failure is reported in the [`IntentReport`].
    pub async fn dispatch(
        &self,
        session: &mut SessionContext,
        intent: &Intent,
    ) -> TenazResult<IntentReport> {
        let start = Instant::now();
        let deadline = start + intent.deadline.unwrap_or_else(|| self.config.intent_deadline());
        let poll = self.config.poll_interval();
        let mut trail = ReasonTrail::new(intent.label.clone());
        info!(
            session = %session.id(),
            intent = %intent.label,
            kind = %intent.kind,
            deadline_ms = deadline.saturating_duration_since(start).as_millis(),
            "dispatching intent"
        );

        if !session.is_settled() {
            info!(open = session.secondaries().len(), "session unsettled, reconciling first");
            session.reconcile().await?;
        }
        session.clear_visits();

        if let Some(precondition) = &intent.precondition {
            let started = Instant::now();
            let timeout = self.config.verification_timeout().min(remaining(deadline));
            let check = precondition.verify(session, timeout, poll).await;
            if !check.success {
                warn!(intent = %intent.label, precondition = %precondition, "precondition not met");
                trail.push(AttemptRecord::new(
                    "precondition",
                    AttemptClass::Fatal,
                    format!("precondition not met: {precondition}"),
                    started.elapsed(),
                ));
                return self.finish(session, intent, trail, None, start).await;
            }
        }

        let mut winner = None;
        for strategy in self.sets.get(&intent.kind).map_or(&[][..], Vec::as_slice) {
            let name = strategy.name();
            let left = remaining(deadline);
            if left < strategy.min_viable() {
                info!(strategy = name, left_ms = left.as_millis(), "skipping strategy, deadline too close");
                trail.push(AttemptRecord::new(
                    name,
                    AttemptClass::SkippedDeadline,
                    format!(
                        "{}ms left, needs {}ms",
                        left.as_millis(),
                        strategy.min_viable().as_millis()
                    ),
                    Duration::ZERO,
                ));
                continue;
            }

            let budget = strategy.timeout().min(left);
            let started = Instant::now();
            debug!(strategy = name, budget_ms = budget.as_millis(), "attempting strategy");
            session.begin_attempt(budget);
            let attempt = tokio::time::timeout(budget, strategy.execute(session, intent)).await;
            session.end_attempt();
            let outcome = match attempt {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(strategy = name, "attempt cancelled, cleaning up");
                    if tokio::time::timeout(ABANDON_TIMEOUT, strategy.abandon(session)).await.is_err() {
                        warn!(strategy = name, "cleanup after timeout did not finish");
                    }
                    Outcome::failure(format!("timed out after {} ms", budget.as_millis()))
                }
            };

            if outcome.is_success() {
                let timeout = self.config.verification_timeout().min(remaining(deadline));
                let check = intent.expected.verify(session, timeout, poll).await;
                if check.success {
                    info!(strategy = name, elapsed_ms = started.elapsed().as_millis(), "intent realized");
                    trail.push(AttemptRecord::from_outcome(name, &outcome, started.elapsed()));
                    winner = Some(name.to_string());
                    break;
                }
                info!(strategy = name, expected = %intent.expected, "effect not observed, demoting to inconclusive");
                trail.push(AttemptRecord::new(
                    name,
                    AttemptClass::Inconclusive,
                    format!("post-condition not observed: {}", intent.expected),
                    started.elapsed(),
                ));
            } else {
                warn!(strategy = name, outcome = %outcome, "strategy did not succeed");
                trail.push(AttemptRecord::from_outcome(name, &outcome, started.elapsed()));
            }
        }

        if winner.is_none() {
            let started = Instant::now();
            let timeout = self
                .config
                .final_verification_timeout()
                .min(remaining(deadline));
            if intent.expected.verify(session, timeout, poll).await.success {
                info!(intent = %intent.label, "effect observed after every strategy was exhausted");
                trail.push(AttemptRecord::new(
                    "final-verification",
                    AttemptClass::Recovered,
                    "effect observed after all strategies",
                    started.elapsed(),
                ));
                winner = trail
                    .records
                    .iter()
                    .rev()
                    .find(|r| r.class == AttemptClass::Inconclusive)
                    .map(|r| r.strategy.clone());
            }
        }

        self.finish(session, intent, trail, winner, start).await
    }

    async fn finish(
        &self,
        session: &mut SessionContext,
        intent: &Intent,
        trail: ReasonTrail,
        winner: Option<String>,
        start: Instant,
    ) -> TenazResult<IntentReport> {
        if let Err(e) = session.reconcile().await {
            warn!(intent = %intent.label, error = %e, "session could not be reconciled");
            return Err(e);
        }
        let passed = trail.succeeded();
        let report = IntentReport {
            label: intent.label.clone(),
            kind: intent.kind,
            passed,
            winner,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            trail,
        };
        if passed {
            debug!(intent = %report.label, "intent passed");
        } else {
            warn!(intent = %report.label, trail = %report.trail, "intent failed");
        }
        Ok(report)
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
