//! Failure classification: one record per attempted strategy, collected into
//! a reason trail that says which tier broke.
//!
//! The classes keep apart causes that need different fixes:
//!
//! - `SkippedDeadline`: no time left to try; not an application defect.
//! - `Inconclusive`: the mechanism ran but its effect never showed up; the
//!   application's reaction is the suspect, not the interaction.
//! - `Failed`: the mechanism itself errored (no geometry, ambiguous locator,
//!   no navigation).
//! - `Fatal`: a precondition did not hold; nothing was attempted.

use crate::result::TenazResult;
use crate::strategy::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptClass {
    /// Ran and its effect was verified
    Succeeded,
    /// Not tried: remaining time was below the strategy's minimum
    SkippedDeadline,
    /// Ran, effect not confirmed
    Inconclusive,
    /// Ran and errored
    Failed,
    /// Precondition missing; nothing attempted
    Fatal,
    /// Every strategy was exhausted but the effect was observed afterwards
    Recovered,
}

impl AttemptClass {
    /// Whether the intent is satisfied by an attempt of this class
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded | Self::Recovered)
    }
}

impl fmt::Display for AttemptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Succeeded => "succeeded",
            Self::SkippedDeadline => "skipped (deadline)",
            Self::Inconclusive => "inconclusive",
            Self::Failed => "failed",
            Self::Fatal => "fatal",
            Self::Recovered => "recovered",
        };
        f.write_str(name)
    }
}

/// One attempted (or skipped) strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Strategy name, or `precondition` / `final-verification`
    pub strategy: String,
    /// Classification
    pub class: AttemptClass,
    /// Short human reason
    pub reason: String,
    /// Underlying error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent in milliseconds
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    /// Create a record
    #[must_use]
    pub fn new(
        strategy: impl Into<String>,
        class: AttemptClass,
        reason: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            class,
            reason: reason.into(),
            error: None,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Attach an underlying error
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Classify a strategy outcome as reported, before verification
    #[must_use]
    pub fn from_outcome(strategy: &str, outcome: &Outcome, elapsed: Duration) -> Self {
        match outcome {
            Outcome::Success => Self::new(strategy, AttemptClass::Succeeded, "effect verified", elapsed),
            Outcome::Failure { reason, error } => Self {
                error: error.clone(),
                ..Self::new(strategy, AttemptClass::Failed, reason.clone(), elapsed)
            },
            Outcome::Inconclusive { reason } => {
                Self::new(strategy, AttemptClass::Inconclusive, reason.clone(), elapsed)
            }
        }
    }

    /// Time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.strategy, self.class, self.reason)?;
        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// Ordered attempt records of one intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonTrail {
    /// Label of the intent
    pub intent: String,
    /// Records in attempt order
    pub records: Vec<AttemptRecord>,
}

impl ReasonTrail {
    /// Empty trail for an intent
    #[must_use]
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            records: Vec::new(),
        }
    }

    /// Append a record
    pub fn push(&mut self, record: AttemptRecord) {
        self.records.push(record);
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records of `class`
    #[must_use]
    pub fn count(&self, class: AttemptClass) -> usize {
        self.records.iter().filter(|r| r.class == class).count()
    }

    /// Whether the final record satisfies the intent
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.records.last().is_some_and(|r| r.class.is_success())
    }

    /// Whether a precondition stopped the intent
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.count(AttemptClass::Fatal) > 0
    }

    /// A mechanism ran but its effect never showed: suspect the application
    #[must_use]
    pub fn suspects_application(&self) -> bool {
        self.count(AttemptClass::Inconclusive) > 0
    }

    /// Strategy names in attempt order
    #[must_use]
    pub fn strategies(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.strategy.as_str()).collect()
    }

    /// Total time recorded
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.records.iter().map(AttemptRecord::elapsed).sum()
    }

    /// Serialize for machine consumption
    pub fn to_json(&self) -> TenazResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ReasonTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.intent)?;
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}
