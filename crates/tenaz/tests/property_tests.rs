//! Property-based tests for the dispatcher's ordering and timing guarantees.
//!
//! Each case drives the engine on a paused current-thread runtime, so
//! arbitrary deadlines and latencies cost no wall time.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tenaz::mock::{DragSupport, Effect, Mechanism, MockDriver, MockElement, Reaction};
use tenaz::prelude::*;

fn paused<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

fn mechanism(n: u8) -> Mechanism {
    match n % 3 {
        0 => Mechanism::Effective,
        1 => Mechanism::Inert,
        _ => Mechanism::Broken,
    }
}

fn drag_page(source: BoundingBox, target: BoundingBox) -> MockDriver {
    let dropped = Locator::role("heading", "Dropped!");
    MockDriver::new("https://practice.qabrains.com/drag-drop")
        .with_element(
            Locator::text("Drag Me"),
            MockElement::at(source.x, source.y, source.width, source.height),
        )
        .with_element(
            Locator::new("#droppable"),
            MockElement::at(target.x, target.y, target.width, target.height),
        )
        .with_element(dropped.clone(), MockElement::hidden())
        .with_drop(
            Locator::text("Drag Me"),
            Locator::new("#droppable"),
            Reaction::now(Effect::Reveal(dropped)),
        )
}

fn drag_intent() -> Intent {
    Intent::drag_and_drop(
        Locator::text("Drag Me"),
        Locator::new("#droppable"),
        PostCondition::Visible(Locator::role("heading", "Dropped!")),
    )
}

fn session(driver: &MockDriver) -> SessionContext {
    SessionContext::new(Arc::new(driver.clone()), driver.primary())
}

prop_compose! {
    /// Source in the left half, target in the right half of the viewport
    fn disjoint_boxes()(
        sx in 0.0f64..400.0, sy in 0.0f64..600.0, sw in 10.0f64..200.0, sh in 10.0f64..100.0,
        tx in 700.0f64..1000.0, ty in 0.0f64..600.0, tw in 10.0f64..200.0, th in 10.0f64..100.0,
    ) -> (BoundingBox, BoundingBox) {
        (BoundingBox::new(sx, sy, sw, sh), BoundingBox::new(tx, ty, tw, th))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// When the native drag works, no lower tier touches the pointer.
    #[test]
    fn prop_native_success_short_circuits((source, target) in disjoint_boxes()) {
        let driver = drag_page(source, target);
        let report = paused(async {
            Dispatcher::default().dispatch(&mut session(&driver), &drag_intent()).await.unwrap()
        });
        prop_assert!(report.passed);
        prop_assert_eq!(report.winner.as_deref(), Some("native-drag"));
        prop_assert_eq!(report.trail.len(), 1);
        prop_assert!(!driver.was_called("hover"));
        prop_assert!(!driver.was_called("pointer_down"));
        prop_assert!(!driver.was_called("pointer_move"));
    }

    /// Accumulated attempt time never exceeds the deadline by more than one
    /// strategy timeout, whatever the mechanisms and latencies.
    #[test]
    fn prop_bounded_overrun(
        deadline_ms in 0u64..25_000,
        native in 0u8..3,
        pointer in 0u8..3,
        coordinates in 0u8..3,
        drag_latency_ms in 0u64..15_000,
        move_latency_ms in 0u64..500,
    ) {
        let config = EngineConfig::default();
        let driver = drag_page(
            BoundingBox::new(100.0, 100.0, 80.0, 40.0),
            BoundingBox::new(700.0, 100.0, 150.0, 150.0),
        )
        .with_drag_support(DragSupport {
            native: mechanism(native),
            pointer: mechanism(pointer),
            coordinates: mechanism(coordinates),
        })
        .with_latency("drag_to", Duration::from_millis(drag_latency_ms))
        .with_latency("pointer_move", Duration::from_millis(move_latency_ms));
        let intent = drag_intent().with_deadline(Duration::from_millis(deadline_ms));
        let dispatcher = Dispatcher::new(config.clone());

        let report = paused(async { dispatcher.dispatch(&mut session(&driver), &intent).await.unwrap() });

        let slack = Duration::from_millis(config.native_drag_timeout_ms);
        prop_assert!(
            report.elapsed() <= Duration::from_millis(deadline_ms) + slack,
            "elapsed {:?} for deadline {}ms", report.elapsed(), deadline_ms
        );
        prop_assert!(!report.trail.is_empty());
    }

    /// Without a new document, the popup strategy always falls back to the
    /// same-document watch and ends within grace plus that watch.
    #[test]
    fn prop_no_new_document_never_hangs(
        grace_ms in 100u64..5_000,
        same_document_ms in 100u64..5_000,
    ) {
        let link = Locator::text("Careers");
        let driver = MockDriver::new("https://practice.qabrains.com/")
            .with_element(link.clone(), MockElement::at(20.0, 900.0, 60.0, 16.0))
            .with_click(link.clone(), Reaction::now(Effect::Nothing));
        let config = EngineConfig::builder()
            .popup_grace_ms(grace_ms)
            .url_timeouts_ms(5_000, same_document_ms)
            .build();
        let final_ms = config.final_verification_timeout_ms;
        let intent = Intent::open_and_verify(link, UrlPattern::Contains("/careers".into()));

        let report = paused(async {
            Dispatcher::new(config).dispatch(&mut session(&driver), &intent).await.unwrap()
        });

        prop_assert!(!report.passed);
        prop_assert_eq!(report.trail.records[0].reason.as_str(), NO_NAVIGATION);
        prop_assert!(report.elapsed() >= Duration::from_millis(grace_ms + same_document_ms));
        prop_assert!(report.elapsed() <= Duration::from_millis(grace_ms + same_document_ms + final_ms + 100));
    }
}
