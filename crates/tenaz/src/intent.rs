//! Interaction intents: what the test wants to happen, not how.

use crate::condition::PostCondition;
use crate::locator::Locator;
use crate::pattern::UrlPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of user-visible interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    /// Drag `source` onto `target`
    DragAndDrop,
    /// Click `source`, expect a destination in a new or the same document
    OpenAndVerify,
    /// Put `value` into the `source` field
    FormFill,
    /// Tick the `source` checkbox or radio button
    Check,
    /// Pick the `value` option of the `source` select
    SelectOption,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DragAndDrop => write!(f, "drag-and-drop"),
            Self::OpenAndVerify => write!(f, "open-and-verify"),
            Self::FormFill => write!(f, "form-fill"),
            Self::Check => write!(f, "check"),
            Self::SelectOption => write!(f, "select-option"),
        }
    }
}

/// A user-visible interaction intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// Kind of interaction
    pub kind: IntentKind,
    /// Human label used in logs and reason trails
    pub label: String,
    /// Drag source, link or button, or form field
    pub source: Locator,
    /// Drop target
    pub target: Option<Locator>,
    /// Expected destination of an open-and-verify
    pub destination: Option<UrlPattern>,
    /// Text for a form fill
    pub value: Option<String>,
    /// Condition that proves the intent happened
    pub expected: PostCondition,
    /// Must hold before anything is attempted
    pub precondition: Option<PostCondition>,
    /// Overall deadline; the engine default applies when unset
    pub deadline: Option<Duration>,
}

impl Intent {
    /// Drag `source` onto `target`; `expected` is the page's reaction to the drop
    #[must_use]
    pub fn drag_and_drop(source: Locator, target: Locator, expected: PostCondition) -> Self {
        Self {
            kind: IntentKind::DragAndDrop,
            label: format!("drag {source} onto {target}"),
            source,
            target: Some(target),
            destination: None,
            value: None,
            expected,
            precondition: None,
            deadline: None,
        }
    }

    /// Click `trigger` and verify the destination it leads to
    #[must_use]
    pub fn open_and_verify(trigger: Locator, destination: UrlPattern) -> Self {
        Self {
            kind: IntentKind::OpenAndVerify,
            label: format!("open {trigger} expecting {destination}"),
            expected: PostCondition::Visited(destination.clone()),
            source: trigger,
            target: None,
            destination: Some(destination),
            value: None,
            precondition: None,
            deadline: None,
        }
    }

    /// Fill `field` with `value`
    #[must_use]
    pub fn form_fill(field: Locator, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: IntentKind::FormFill,
            label: format!("fill {field}"),
            expected: PostCondition::InputValue {
                locator: field.clone(),
                expected: value.clone(),
            },
            source: field,
            target: None,
            destination: None,
            value: Some(value),
            precondition: None,
            deadline: None,
        }
    }

    /// Tick `field`, a checkbox or radio button
    #[must_use]
    pub fn check(field: Locator) -> Self {
        Self {
            kind: IntentKind::Check,
            label: format!("check {field}"),
            expected: PostCondition::Checked(field.clone()),
            source: field,
            target: None,
            destination: None,
            value: None,
            precondition: None,
            deadline: None,
        }
    }

    /// Pick `option` (a value or label) in the `field` select; the field's
    /// value must read `option` afterwards
    #[must_use]
    pub fn select_option(field: Locator, option: impl Into<String>) -> Self {
        let option = option.into();
        Self {
            kind: IntentKind::SelectOption,
            label: format!("select {option:?} in {field}"),
            expected: PostCondition::InputValue {
                locator: field.clone(),
                expected: option.clone(),
            },
            source: field,
            target: None,
            destination: None,
            value: Some(option),
            precondition: None,
            deadline: None,
        }
    }

    /// Set the overall deadline
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replace the expected post-condition
    #[must_use]
    pub fn expecting(mut self, expected: PostCondition) -> Self {
        self.expected = expected;
        self
    }

    /// Require a condition before anything is attempted
    #[must_use]
    pub fn with_precondition(mut self, precondition: PostCondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    /// Set the human label
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
