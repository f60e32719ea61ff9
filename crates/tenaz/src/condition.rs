//! Expected post-conditions and their bounded verification.
//!
//! A post-condition is the observable effect an intent should have on the
//! page. Strategies report *mechanical* success; only a post-condition that
//! holds makes an attempt count as successful.

use crate::locator::Locator;
use crate::pattern::UrlPattern;
use crate::session::SessionContext;
use crate::wait::{poll_until, WaitResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::time::Duration;

/// Observable condition checked after an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCondition {
    /// Element resolves uniquely and is visible
    Visible(Locator),
    /// Element is absent or not visible
    Hidden(Locator),
    /// Locator resolves to exactly `expected` elements
    Count {
        /// Locator to count
        locator: Locator,
        /// Expected count
        expected: usize,
    },
    /// The active document's URL matches
    UrlMatches(UrlPattern),
    /// A destination matching the pattern was observed during the intent
    Visited(UrlPattern),
    /// A form field holds exactly `expected`
    InputValue {
        /// Field locator
        locator: Locator,
        /// Expected value
        expected: String,
    },
    /// A checkbox or radio button is checked
    Checked(Locator),
    /// Every condition holds
    All(Vec<PostCondition>),
    /// At least one condition holds
    Any(Vec<PostCondition>),
    /// Always holds
    Always,
}

impl PostCondition {
    /// Evaluate once against the session's active document.
    ///
    /// Driver errors count as "does not hold (yet)".
    pub fn evaluate<'a>(&'a self, session: &'a SessionContext) -> BoxFuture<'a, bool> {
        async move {
            let driver = session.driver();
            let doc = session.active();
            match self {
                Self::Visible(locator) => driver.is_visible(doc, locator).await.unwrap_or(false),
                Self::Hidden(locator) => match driver.count(doc, locator).await {
                    Ok(0) => true,
                    Ok(_) => !driver.is_visible(doc, locator).await.unwrap_or(true),
                    Err(_) => false,
                },
                Self::Count { locator, expected } => driver
                    .count(doc, locator)
                    .await
                    .is_ok_and(|n| n == *expected),
                Self::UrlMatches(pattern) => driver
                    .current_url(doc)
                    .await
                    .is_ok_and(|url| pattern.matches(&url)),
                Self::Visited(pattern) => session.visits().iter().any(|url| pattern.matches(url)),
                Self::InputValue { locator, expected } => driver
                    .input_value(doc, locator)
                    .await
                    .is_ok_and(|value| value == *expected),
                Self::Checked(locator) => driver.is_checked(doc, locator).await.unwrap_or(false),
                Self::All(conditions) => {
                    for condition in conditions {
                        if !condition.evaluate(session).await {
                            return false;
                        }
                    }
                    true
                }
                Self::Any(conditions) => {
                    for condition in conditions {
                        if condition.evaluate(session).await {
                            return true;
                        }
                    }
                    false
                }
                Self::Always => true,
            }
        }
        .boxed()
    }

    /// Poll until the condition holds or `timeout` elapses; evaluates at least once
    pub async fn verify(
        &self,
        session: &SessionContext,
        timeout: Duration,
        interval: Duration,
    ) -> WaitResult {
        let description = self.to_string();
        poll_until(timeout, interval, &description, move || self.evaluate(session)).await
    }
}

impl fmt::Display for PostCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible(l) => write!(f, "visible({l})"),
            Self::Hidden(l) => write!(f, "hidden({l})"),
            Self::Count { locator, expected } => write!(f, "count({locator}) == {expected}"),
            Self::UrlMatches(p) => write!(f, "url matches {p}"),
            Self::Visited(p) => write!(f, "visited {p}"),
            Self::InputValue { locator, expected } => write!(f, "value({locator}) == {expected:?}"),
            Self::Checked(l) => write!(f, "checked({l})"),
            Self::All(cs) => write_joined(f, cs, " and "),
            Self::Any(cs) => write_joined(f, cs, " or "),
            Self::Always => write!(f, "always"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, conditions: &[PostCondition], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{Effect, MockDriver, MockElement, Reaction};
    use crate::driver::Driver;
    use std::sync::Arc;

    fn session(driver: &MockDriver) -> SessionContext {
        SessionContext::new(Arc::new(driver.clone()), driver.primary())
    }

    mod evaluate_tests {
        use super::*;

        #[tokio::test]
        async fn test_visible_and_hidden() {
            let shown = Locator::role("heading", "Dropped!");
            let hidden = Locator::new("#spinner");
            let driver = MockDriver::new("about:blank")
                .with_element(shown.clone(), MockElement::at(0.0, 0.0, 10.0, 10.0))
                .with_element(hidden.clone(), MockElement::hidden());
            let s = session(&driver);

            assert!(PostCondition::Visible(shown.clone()).evaluate(&s).await);
            assert!(!PostCondition::Hidden(shown).evaluate(&s).await);
            assert!(PostCondition::Hidden(hidden.clone()).evaluate(&s).await);
            assert!(!PostCondition::Visible(hidden).evaluate(&s).await);
            assert!(PostCondition::Hidden(Locator::new("#absent")).evaluate(&s).await);
        }

        #[tokio::test]
        async fn test_count_and_url() {
            let item = Locator::text("Drag Me");
            let driver = MockDriver::new("https://practice.qabrains.com/drag-drop")
                .with_element(item.clone(), MockElement::at(0.0, 0.0, 10.0, 10.0))
                .with_element(item.clone(), MockElement::at(0.0, 20.0, 10.0, 10.0));
            let s = session(&driver);
            assert!(PostCondition::Count { locator: item.clone(), expected: 2 }.evaluate(&s).await);
            assert!(!PostCondition::Visible(item).evaluate(&s).await);
            assert!(PostCondition::UrlMatches(UrlPattern::Contains("drag".into())).evaluate(&s).await);
        }

        #[tokio::test]
        async fn test_visited_uses_log() {
            let driver = MockDriver::new("about:blank");
            let mut s = session(&driver);
            let cond = PostCondition::Visited(UrlPattern::Host("www.linkedin.com".into()));
            assert!(!cond.evaluate(&s).await);
            s.record_visit("https://www.linkedin.com/company/qabrains");
            assert!(cond.evaluate(&s).await);
        }

        #[tokio::test]
        async fn test_checked() {
            let pasta = Locator::role("checkbox", "Pasta");
            let name = Locator::role("textbox", "Name");
            let driver = MockDriver::new("about:blank")
                .with_element(pasta.clone(), MockElement::checkbox(0.0, 0.0, 16.0, 16.0))
                .with_element(name.clone(), MockElement::at(0.0, 40.0, 200.0, 30.0));
            let s = session(&driver);
            let cond = PostCondition::Checked(pasta.clone());
            assert!(!cond.evaluate(&s).await);
            driver.click(&driver.primary(), &pasta).await.unwrap();
            assert!(cond.evaluate(&s).await);
            // not checkable counts as not checked
            assert!(!PostCondition::Checked(name).evaluate(&s).await);
            assert_eq!(cond.to_string(), "checked(role=checkbox[name=\"Pasta\"])");
        }

        #[tokio::test]
        async fn test_combinators() {
            let driver = MockDriver::new("about:blank");
            let s = session(&driver);
            let never = PostCondition::Visible(Locator::new("#never"));
            assert!(PostCondition::Any(vec![never.clone(), PostCondition::Always]).evaluate(&s).await);
            assert!(!PostCondition::All(vec![never, PostCondition::Always]).evaluate(&s).await);
            assert!(PostCondition::All(vec![]).evaluate(&s).await);
        }
    }

    mod verify_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_verify_waits_for_late_effect() {
            let status = Locator::role("heading", "Dropped!");
            let trigger = Locator::new("#go");
            let driver = MockDriver::new("about:blank")
                .with_element(trigger.clone(), MockElement::at(0.0, 0.0, 10.0, 10.0))
                .with_element(status.clone(), MockElement::hidden())
                .with_click(
                    trigger.clone(),
                    Reaction::after(Duration::from_millis(350), Effect::Reveal(status.clone())),
                );
            let s = session(&driver);
            driver.click(&driver.primary(), &trigger).await.unwrap();

            let result = PostCondition::Visible(status)
                .verify(&s, Duration::from_secs(5), Duration::from_millis(100))
                .await;
            assert!(result.success);
            assert!(result.elapsed >= Duration::from_millis(350));
            assert!(result.elapsed < Duration::from_millis(500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_verify_times_out() {
            let driver = MockDriver::new("about:blank");
            let s = session(&driver);
            let result = PostCondition::Visible(Locator::new("#never"))
                .verify(&s, Duration::from_millis(300), Duration::from_millis(100))
                .await;
            assert!(!result.success);
            assert_eq!(result.waited_for, "visible(css=#never)");
        }
    }

    #[test]
    fn test_display() {
        let c = PostCondition::All(vec![
            PostCondition::Visible(Locator::text("Dropped!")),
            PostCondition::InputValue {
                locator: Locator::test_id("email"),
                expected: "a@b.c".into(),
            },
        ]);
        assert_eq!(
            c.to_string(),
            r#"(visible(text=Dropped!) and value(testid=email) == "a@b.c")"#
        );
    }
}
