//! Form strategies.
//!
//! - text fields: direct fill, then keystrokes, then script;
//! - checkboxes and radio buttons: a real click, then script;
//! - selects: the automation layer's option pick, then script.

use crate::config::EngineConfig;
use crate::intent::Intent;
use crate::session::SessionContext;
use crate::strategy::{resolve_unique, Outcome, Strategy};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

fn value_of(intent: &Intent) -> Result<&str, Outcome> {
    intent
        .value
        .as_deref()
        .ok_or_else(|| Outcome::failure("intent has no value"))
}

macro_rules! form_strategy {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            timeout: Duration,
            min_viable: Duration,
        }

        impl $name {
            /// Create with explicit timeouts
            #[must_use]
            pub const fn new(timeout: Duration, min_viable: Duration) -> Self {
                Self {
                    timeout,
                    min_viable,
                }
            }

            /// Create from engine configuration
            #[must_use]
            pub const fn from_config(config: &EngineConfig) -> Self {
                Self::new(
                    Duration::from_millis(config.form_fill_timeout_ms),
                    config.min_viable(),
                )
            }
        }
    };
}

form_strategy!(
    /// Replace the value with [`Driver::fill`](crate::driver::Driver::fill)
    DirectFill
);
form_strategy!(
    /// Click the field, clear it, and type keystroke by keystroke
    FocusAndType
);
form_strategy!(
    /// Assign the value by script and fire `input`/`change`
    ScriptedAssign
);
form_strategy!(
    /// Click the checkbox or radio unless it is already checked
    ClickCheck
);
form_strategy!(
    /// Set `checked` by script and fire `input`/`change`
    ScriptedCheck
);
form_strategy!(
    /// Pick the option with [`Driver::select_option`](crate::driver::Driver::select_option)
    NativeSelect
);

#[async_trait]
impl Strategy for DirectFill {
    fn name(&self) -> &'static str {
        "direct-fill"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let value = match value_of(intent) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        match session.driver().fill(session.active(), &intent.source, value).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("fill failed", &e),
        }
    }
}

#[async_trait]
impl Strategy for FocusAndType {
    fn name(&self) -> &'static str {
        "focus-and-type"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let value = match value_of(intent) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        let driver = session.driver();
        let doc = session.active();
        if let Err(e) = driver.click(doc, &intent.source).await {
            return Outcome::failed_with("could not focus field", &e);
        }
        let current = driver.input_value(doc, &intent.source).await.unwrap_or_default();
        if !current.is_empty() {
            if let Err(e) = driver.fill(doc, &intent.source, "").await {
                debug!(field = %intent.source, error = %e, "clearing field before typing failed");
            }
        }
        match driver.type_text(doc, value).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("typing failed", &e),
        }
    }
}

#[async_trait]
impl Strategy for ScriptedAssign {
    fn name(&self) -> &'static str {
        "scripted-assign"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let value = match value_of(intent) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        match session.driver().set_value(session.active(), &intent.source, value).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("script assignment failed", &e),
        }
    }
}

#[async_trait]
impl Strategy for ClickCheck {
    fn name(&self) -> &'static str {
        "click-check"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        let driver = session.driver();
        let doc = session.active();
        match driver.is_checked(doc, &intent.source).await {
            Ok(true) => {
                debug!(field = %intent.source, "already checked");
                return Outcome::Success;
            }
            Ok(false) => {}
            Err(e) => return Outcome::failed_with("not a checkbox or radio", &e),
        }
        match driver.click(doc, &intent.source).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("click failed", &e),
        }
    }
}

#[async_trait]
impl Strategy for ScriptedCheck {
    fn name(&self) -> &'static str {
        "scripted-check"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        match session.driver().set_checked(session.active(), &intent.source, true).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("script assignment failed", &e),
        }
    }
}

#[async_trait]
impl Strategy for NativeSelect {
    fn name(&self) -> &'static str {
        "select-option"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let option = match value_of(intent) {
            Ok(v) => v,
            Err(outcome) => return outcome,
        };
        if let Err(outcome) = resolve_unique(session, &intent.source).await {
            return outcome;
        }
        match session.driver().select_option(session.active(), &intent.source, option).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("option not selected", &e),
        }
    }
}
