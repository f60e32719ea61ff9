//! Drag-and-drop strategies, most semantic first.
//!
//! 1. [`NativeDrag`]: the automation layer's own drag gesture.
//! 2. [`PointerSequence`]: hover, press, hover, release as discrete steps.
//! 3. [`CoordinateInterpolation`]: press at the source center, move in
//!    interpolated steps, release at the target center.
//!
//! Every strategy refuses to move the pointer unless both locators resolve to
//! exactly one element.

use crate::config::EngineConfig;
use crate::driver::{DocumentId, Driver};
use crate::intent::Intent;
use crate::locator::Locator;
use crate::result::TenazResult;
use crate::session::SessionContext;
use crate::strategy::{resolve_unique, Outcome, Strategy};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

async fn endpoints<'a>(
    session: &SessionContext,
    intent: &'a Intent,
) -> Result<(&'a Locator, &'a Locator), Outcome> {
    let target = intent
        .target
        .as_ref()
        .ok_or_else(|| Outcome::failure("intent has no drop target"))?;
    resolve_unique(session, &intent.source).await?;
    resolve_unique(session, target).await?;
    Ok((&intent.source, target))
}

/// Release the button if a sequence failed midway or was cancelled
async fn release(driver: &dyn Driver, doc: &DocumentId) {
    if let Err(e) = driver.pointer_up(doc).await {
        debug!(error = %e, "pointer release after failed sequence");
    }
}

/// Semantic drag via [`Driver::drag_to`]
#[derive(Debug, Clone)]
pub struct NativeDrag {
    timeout: Duration,
    min_viable: Duration,
}

impl NativeDrag {
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
            Duration::from_millis(config.native_drag_timeout_ms),
            config.min_viable(),
        )
    }
}

#[async_trait]
impl Strategy for NativeDrag {
    fn name(&self) -> &'static str {
        "native-drag"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let (source, target) = match endpoints(session, intent).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };
        debug!(%source, %target, "native drag");
        match session.driver().drag_to(session.active(), source, target).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("native drag failed", &e),
        }
    }

    async fn abandon(&self, session: &mut SessionContext) {
        release(session.driver(), session.active()).await;
    }
}

/// Hover source, press, hover target, release
#[derive(Debug, Clone)]
pub struct PointerSequence {
    timeout: Duration,
    min_viable: Duration,
    settle: Duration,
}

impl PointerSequence {
    /// Create with explicit timeouts and hover settle pause
    #[must_use]
    pub const fn new(timeout: Duration, min_viable: Duration, settle: Duration) -> Self {
        Self {
            timeout,
            min_viable,
            settle,
        }
    }

    /// Create from engine configuration
    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::from_millis(config.pointer_sequence_timeout_ms),
            config.min_viable(),
            Duration::from_millis(config.hover_settle_ms),
        )
    }

    async fn run(&self, driver: &dyn Driver, doc: &DocumentId, source: &Locator, target: &Locator) -> TenazResult<()> {
        driver.hover(doc, source).await?;
        tokio::time::sleep(self.settle).await;
        driver.pointer_down(doc).await?;
        if let Err(e) = driver.hover(doc, target).await {
            release(driver, doc).await;
            return Err(e);
        }
        driver.pointer_up(doc).await
    }
}

#[async_trait]
impl Strategy for PointerSequence {
    fn name(&self) -> &'static str {
        "pointer-sequence"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let (source, target) = match endpoints(session, intent).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };
        debug!(%source, %target, settle_ms = self.settle.as_millis(), "pointer sequence");
        match self.run(session.driver(), session.active(), source, target).await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("pointer sequence failed", &e),
        }
    }

    async fn abandon(&self, session: &mut SessionContext) {
        release(session.driver(), session.active()).await;
    }
}

/// Press at the source center, interpolate, release at the target center
#[derive(Debug, Clone)]
pub struct CoordinateInterpolation {
    timeout: Duration,
    min_viable: Duration,
    steps: u32,
}

impl CoordinateInterpolation {
    /// Create with explicit timeouts and step count
    #[must_use]
    pub const fn new(timeout: Duration, min_viable: Duration, steps: u32) -> Self {
        Self {
            timeout,
            min_viable,
            steps,
        }
    }

    /// Create from engine configuration
    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interpolation_timeout_ms),
            config.min_viable(),
            config.interpolation_steps,
        )
    }
}

#[async_trait]
impl Strategy for CoordinateInterpolation {
    fn name(&self) -> &'static str {
        "coordinate-interpolation"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn min_viable(&self) -> Duration {
        self.min_viable
    }

    async fn execute(&self, session: &mut SessionContext, intent: &Intent) -> Outcome {
        let (source, target) = match endpoints(session, intent).await {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };
        let driver = session.driver();
        let doc = session.active();

        let boxes = match (
            driver.bounding_box(doc, source).await,
            driver.bounding_box(doc, target).await,
        ) {
            (Ok(Some(from)), Ok(Some(to))) => (from, to),
            (Err(e), _) | (_, Err(e)) => return Outcome::failed_with("no geometry", &e),
            _ => return Outcome::failure("no geometry"),
        };
        let from = boxes.0.center();
        let to = boxes.1.center();
        debug!(%source, %target, steps = self.steps, "coordinate interpolation");

        let moved = async {
            driver.pointer_move(doc, from).await?;
            driver.pointer_down(doc).await?;
            for point in from.path_to(&to, self.steps) {
                if let Err(e) = driver.pointer_move(doc, point).await {
                    release(driver, doc).await;
                    return Err(e);
                }
            }
            driver.pointer_up(doc).await
        };
        match moved.await {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::failed_with("coordinate interpolation failed", &e),
        }
    }

    async fn abandon(&self, session: &mut SessionContext) {
        release(session.driver(), session.active()).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::condition::PostCondition;
    use crate::mock::{DragSupport, Effect, Mechanism, MockDriver, MockElement, Reaction};
    use crate::strategy::AMBIGUOUS_OR_MISSING;
    use std::sync::Arc;

    fn page(support: DragSupport) -> (MockDriver, Intent, Locator) {
        let source = Locator::text("Drag Me");
        let target = Locator::new("#droppable");
        let dropped = Locator::role("heading", "Dropped!");
        let driver = MockDriver::new("https://practice.qabrains.com/drag-drop")
            .with_element(source.clone(), MockElement::at(20.0, 20.0, 80.0, 40.0))
            .with_element(target.clone(), MockElement::at(400.0, 20.0, 200.0, 200.0))
            .with_element(dropped.clone(), MockElement::hidden())
            .with_drag_support(support)
            .with_drop(
                source.clone(),
                target.clone(),
                Reaction::now(Effect::Reveal(dropped.clone())),
            );
        let intent = Intent::drag_and_drop(source, target, PostCondition::Visible(dropped.clone()));
        (driver, intent, dropped)
    }

    fn session(driver: &MockDriver) -> SessionContext {
        SessionContext::new(Arc::new(driver.clone()), driver.primary())
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    mod native_tests {
        use super::*;

        #[tokio::test]
        async fn test_native_drag_succeeds() {
            let (driver, intent, dropped) = page(DragSupport::default());
            let outcome = NativeDrag::from_config(&config())
                .execute(&mut session(&driver), &intent)
                .await;
            assert_eq!(outcome, Outcome::Success);
            assert!(driver.element_visible(&driver.primary(), &dropped));
        }

        #[tokio::test]
        async fn test_native_drag_error_is_failure() {
            let (driver, intent, _) = page(DragSupport {
                native: Mechanism::Broken,
                ..DragSupport::default()
            });
            let outcome = NativeDrag::from_config(&config())
                .execute(&mut session(&driver), &intent)
                .await;
            assert!(matches!(outcome, Outcome::Failure { ref reason, .. } if reason == "native drag failed"));
        }

        #[tokio::test]
        async fn test_missing_target_locator() {
            let (driver, mut intent, _) = page(DragSupport::default());
            intent.target = Some(Locator::new("#nowhere"));
            let outcome = NativeDrag::from_config(&config())
                .execute(&mut session(&driver), &intent)
                .await;
            assert!(matches!(outcome, Outcome::Failure { ref reason, .. } if reason == AMBIGUOUS_OR_MISSING));
            assert!(!driver.was_called("drag_to"));
        }
    }

    mod pointer_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_pointer_sequence_order() {
            let (driver, intent, dropped) = page(DragSupport {
                native: Mechanism::Inert,
                ..DragSupport::default()
            });
            let outcome = PointerSequence::from_config(&config())
                .execute(&mut session(&driver), &intent)
                .await;
            assert_eq!(outcome, Outcome::Success);
            assert!(driver.element_visible(&driver.primary(), &dropped));

            let calls: Vec<String> = driver
                .history()
                .into_iter()
                .filter(|c| !c.starts_with("count"))
                .collect();
            assert_eq!(
                calls,
                [
                    "hover:text=Drag Me",
                    "pointer_down:doc-0",
                    "hover:css=#droppable",
                    "pointer_up:doc-0",
                ]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_ambiguous_source_moves_nothing() {
            let (driver, intent, _) = page(DragSupport::default());
            driver.insert_element(
                &driver.primary(),
                &Locator::text("Drag Me"),
                MockElement::at(20.0, 80.0, 80.0, 40.0),
            );
            let outcome = PointerSequence::from_config(&config())
                .execute(&mut session(&driver), &intent)
                .await;
            assert!(matches!(outcome, Outcome::Failure { ref reason, .. } if reason == AMBIGUOUS_OR_MISSING));
            assert!(!driver.was_called("hover"));
            assert!(!driver.was_called("pointer_down"));
        }
    }

    mod interpolation_tests {
        use super::*;

        #[tokio::test]
        async fn test_interpolation_moves_in_steps() {
            let (driver, intent, dropped) = page(DragSupport {
                native: Mechanism::Inert,
                pointer: Mechanism::Inert,
                coordinates: Mechanism::Effective,
            });
            let strategy = CoordinateInterpolation::new(Duration::from_secs(5), Duration::ZERO, 10);
            let outcome = strategy.execute(&mut session(&driver), &intent).await;
            assert_eq!(outcome, Outcome::Success);
            assert!(driver.element_visible(&driver.primary(), &dropped));
            // one move to the source center plus ten interpolated moves
            assert_eq!(driver.call_count("pointer_move"), 11);
            assert!(driver.was_called("pointer_move:500,120"));
        }

        #[tokio::test]
        async fn test_no_geometry() {
            let (driver, intent, _) = page(DragSupport::default());
            let hidden_target = Locator::new("#collapsed");
            driver.insert_element(&driver.primary(), &hidden_target, MockElement::detached());
            let mut intent = intent;
            intent.target = Some(hidden_target);
            let outcome = CoordinateInterpolation::from_config(&config())
                .execute(&mut session(&driver), &intent)
                .await;
            assert_eq!(outcome, Outcome::failure("no geometry"));
            assert!(!driver.was_called("pointer_down"));
        }
    }
}
