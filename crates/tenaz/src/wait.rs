//! Wait mechanisms: load states, bounded polling, and the load-state fallback chain.
//!
//! Every wait in this crate has a deadline. External destinations may never
//! reach network quiescence (analytics beacons, long-poll connections), so
//! [`settle_load`] walks a chain of progressively weaker load signals and
//! reports which one was reached instead of failing.

use crate::driver::{DocumentId, Driver};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

/// Page load states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// `DOMContentLoaded` fired
    DomContentLoaded,
    /// `load` fired
    #[default]
    Load,
    /// No network activity for [`NETWORK_IDLE_THRESHOLD_MS`]
    NetworkIdle,
}

impl LoadState {
    /// Get the event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }

    /// Whether reaching `self` implies `other` has been reached
    #[must_use]
    pub const fn satisfies(&self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    const fn rank(self) -> u8 {
        match self {
            Self::DomContentLoaded => 0,
            Self::Load => 1,
            Self::NetworkIdle => 2,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// One step of a load-state fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStep {
    /// State to wait for
    pub state: LoadState,
    /// Budget for this step in milliseconds
    pub timeout_ms: u64,
}

impl LoadStep {
    /// Create a step
    #[must_use]
    pub const fn new(state: LoadState, timeout_ms: u64) -> Self {
        Self { state, timeout_ms }
    }

    /// Budget as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Ordered chain of load steps, strongest signal first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFallback {
    /// Steps tried in order until one is reached
    pub steps: Vec<LoadStep>,
}

impl LoadFallback {
    /// Network idle, then basic load
    #[must_use]
    pub fn network_idle_then_load(idle_ms: u64, load_ms: u64) -> Self {
        Self {
            steps: vec![
                LoadStep::new(LoadState::NetworkIdle, idle_ms),
                LoadStep::new(LoadState::Load, load_ms),
            ],
        }
    }

    /// Total worst-case budget of the chain
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.steps.iter().map(LoadStep::timeout).sum()
    }

    /// The chain truncated to fit `budget`.
    ///
    /// Steps keep their order; the step that crosses the budget is shortened
    /// and every later step is dropped.
    #[must_use]
    pub fn within(&self, budget: Duration) -> Self {
        let mut left = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if left == 0 {
                break;
            }
            let timeout_ms = step.timeout_ms.min(left);
            left -= timeout_ms;
            steps.push(LoadStep::new(step.state, timeout_ms));
        }
        Self { steps }
    }
}

impl Default for LoadFallback {
    fn default() -> Self {
        Self::network_idle_then_load(20_000, 10_000)
    }
}

/// What a fallback chain achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettlement {
    /// Strongest state reached, if any
    pub reached: Option<LoadState>,
    /// One warning per step that timed out or errored
    pub warnings: Vec<String>,
}

impl LoadSettlement {
    /// Whether the first (strongest) step was reached
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.warnings.is_empty() && self.reached.is_some()
    }
}

/// Result of a wait operation
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the wait was successful
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub fn success(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            waited_for: waited_for.into(),
        }
    }

    /// Create a timeout wait result
    #[must_use]
    pub fn timeout(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
///
/// `check` always runs at least once, even with a zero timeout.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    interval: Duration,
    waited_for: &str,
    mut check: F,
) -> WaitResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let deadline = start + timeout;
    loop {
        if check().await {
            return WaitResult::success(start.elapsed(), waited_for);
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitResult::timeout(start.elapsed(), waited_for);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Walk `plan` against `doc` until one load state is reached.
///
/// Never fails: each step is bounded by its own timeout and a miss is recorded
/// as a warning before the next, weaker step is tried.
pub async fn settle_load(driver: &dyn Driver, doc: &DocumentId, plan: &LoadFallback) -> LoadSettlement {
    let mut warnings = Vec::new();
    for step in &plan.steps {
        let attempt =
            tokio::time::timeout(step.timeout(), driver.wait_for_load_state(doc, step.state, step.timeout()))
                .await;
        match attempt {
            Ok(Ok(())) => {
                debug!(document = %doc, state = %step.state, "load state reached");
                return LoadSettlement {
                    reached: Some(step.state),
                    warnings,
                };
            }
            Ok(Err(e)) => {
                warn!(document = %doc, state = %step.state, error = %e, "load state wait failed, falling back");
                warnings.push(format!("{} wait failed: {e}", step.state));
            }
            Err(_) => {
                warn!(document = %doc, state = %step.state, timeout_ms = step.timeout_ms, "load state timed out, falling back");
                warnings.push(format!("{} not reached within {}ms", step.state, step.timeout_ms));
            }
        }
    }
    LoadSettlement {
        reached: None,
        warnings,
    }
}
