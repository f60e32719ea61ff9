//! Strategy trait, attempt outcomes and the default strategy sets.
//!
//! A strategy is one concrete way of realizing an intent. Strategies of one
//! kind are tried in a fixed priority order by the
//! [`Dispatcher`](crate::dispatcher::Dispatcher):
//!
//! | Intent | Order |
//! |---|---|
//! | drag-and-drop | `native-drag`, `pointer-sequence`, `coordinate-interpolation` |
//! | open-and-verify | `open-and-verify` |
//! | form-fill | `direct-fill`, `focus-and-type`, `scripted-assign` |

use crate::config::EngineConfig;
use crate::drag::{CoordinateInterpolation, NativeDrag, PointerSequence};
use crate::form::{
    ClickCheck, DirectFill, FocusAndType, NativeSelect, ScriptedAssign, ScriptedCheck,
};
use crate::intent::{Intent, IntentKind};
use crate::locator::Locator;
use crate::popup::OpenAndVerifyStrategy;
use crate::result::TenazError;
use crate::session::SessionContext;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Reason reported when a locator does not resolve to exactly one element
pub const AMBIGUOUS_OR_MISSING: &str = "ambiguous or missing locator";

/// Result of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The interaction was performed mechanically
    Success,
    /// The interaction could not be performed
    Failure {
        /// Short reason
        reason: String,
        /// Underlying error, if any
        error: Option<String>,
    },
    /// Performed, but its effect could not be confirmed
    Inconclusive {
        /// Short reason
        reason: String,
    },
}

impl Outcome {
    /// Failure without an underlying error
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
            error: None,
        }
    }

    /// Failure caused by a driver error
    #[must_use]
    pub fn failed_with(reason: impl Into<String>, error: &TenazError) -> Self {
        Self::Failure {
            reason: reason.into(),
            error: Some(error.to_string()),
        }
    }

    /// Inconclusive outcome
    #[must_use]
    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Self::Inconclusive {
            reason: reason.into(),
        }
    }

    /// Whether this is `Success`
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure {
                reason,
                error: Some(e),
            } => write!(f, "failure: {reason} ({e})"),
            Self::Failure { reason, error: None } => write!(f, "failure: {reason}"),
            Self::Inconclusive { reason } => write!(f, "inconclusive: {reason}"),
        }
    }
}

/// One concrete way of realizing an intent
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable name used in logs and reason trails
    fn name(&self) -> &'static str;

    /// Upper bound for one attempt
    fn timeout(&self) -> Duration;

    /// The strategy is skipped when less time than this remains
    fn min_viable(&self) -> Duration;

    /// Perform the interaction. Verifying the intent's post-condition is the
    /// dispatcher's job; strategies only report whether they acted.
    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome;

    /// Undo input left half-done when `execute` was cancelled by its timeout,
    /// such as a pressed pointer button. Best effort; the default does nothing.
    async fn abandon(&self, _session: &mut SessionContext) {}
}

/// Check that `locator` resolves to exactly one element in the active document
pub async fn resolve_unique(session: &SessionContext, locator: &Locator) -> Result<(), Outcome> {
    match session.driver().count(session.active(), locator).await {
        Ok(1) => Ok(()),
        Ok(count) => Err(Outcome::Failure {
            reason: AMBIGUOUS_OR_MISSING.into(),
            error: Some(
                TenazError::LocatorMismatch {
                    selector: locator.to_string(),
                    count,
                }
                .to_string(),
            ),
        }),
        Err(e) => Err(Outcome::failed_with(AMBIGUOUS_OR_MISSING, &e)),
    }
}

/// The ordered strategy set for an intent kind
#[must_use]
pub fn default_strategies(kind: IntentKind, config: &EngineConfig) -> Vec<Box<dyn Strategy>> {
    match kind {
        IntentKind::DragAndDrop => vec![
            Box::new(NativeDrag::from_config(config)),
            Box::new(PointerSequence::from_config(config)),
            Box::new(CoordinateInterpolation::from_config(config)),
        ],
        IntentKind::OpenAndVerify => vec![Box::new(OpenAndVerifyStrategy::from_config(config))],
        IntentKind::FormFill => vec![
            Box::new(DirectFill::from_config(config)),
            Box::new(FocusAndType::from_config(config)),
            Box::new(ScriptedAssign::from_config(config)),
        ],
        IntentKind::Check => vec![
            Box::new(ClickCheck::from_config(config)),
            Box::new(ScriptedCheck::from_config(config)),
        ],
        IntentKind::SelectOption => vec![
            Box::new(NativeSelect::from_config(config)),
            Box::new(ScriptedAssign::from_config(config)),
        ],
    }
}
