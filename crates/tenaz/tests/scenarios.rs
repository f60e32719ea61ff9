//! End-to-end scenarios against the scriptable driver.
//!
//! Every test runs on paused tokio time, so the multi-second waits of the
//! fallback chains complete instantly and deterministically.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;
use tenaz::mock::{DragSupport, Effect, FieldSupport, Mechanism, MockDriver, MockElement, Reaction};
use tenaz::prelude::*;

const DRAG_PAGE: &str = "https://practice.qabrains.com/drag-drop";
const HOME: &str = "https://practice.qabrains.com/";

fn source() -> Locator {
    Locator::text("Drag Me")
}

fn target() -> Locator {
    Locator::new("#droppable")
}

fn dropped() -> Locator {
    Locator::role("heading", "Dropped!")
}

fn drag_intent() -> Intent {
    Intent::drag_and_drop(source(), target(), PostCondition::Visible(dropped()))
}

/// Drag page whose drop zone reveals the confirmation heading
fn drag_page(target_element: MockElement) -> MockDriver {
    MockDriver::new(DRAG_PAGE)
        .with_element(source(), MockElement::at(100.0, 100.0, 80.0, 40.0))
        .with_element(target(), target_element)
        .with_element(dropped(), MockElement::hidden())
        .with_drop(source(), target(), Reaction::now(Effect::Reveal(dropped())))
}

/// Engine events go to the test writer; filter with `RUST_LOG=tenaz=debug`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session(driver: &MockDriver) -> SessionContext {
    init_tracing();
    SessionContext::new(Arc::new(driver.clone()), driver.primary())
}

mod drag_scenarios {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_native_drag_succeeds_first() {
        let driver = drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0));
        let mut s = session(&driver);

        let report = Dispatcher::default().dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(report.passed, "{:?}", report.failure_message());
        assert_eq!(report.winner.as_deref(), Some("native-drag"));
        assert_eq!(report.trail.strategies(), ["native-drag"]);
        assert!(driver.element_visible(&driver.primary(), &dropped()));
        assert!(!driver.was_called("pointer_down"));
        assert!(!driver.was_called("hover"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_without_geometry_fails_every_tier() {
        let driver = drag_page(MockElement::detached());
        let mut s = session(&driver);

        let report = Dispatcher::default().dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(!report.passed);
        assert!(report.winner.is_none());
        let trail = &report.trail;
        assert_eq!(
            trail.strategies(),
            ["native-drag", "pointer-sequence", "coordinate-interpolation"]
        );
        assert_eq!(trail.count(AttemptClass::Failed), 3);
        assert_eq!(trail.records[0].reason, "native drag failed");
        assert_eq!(trail.records[1].reason, "pointer sequence failed");
        assert_eq!(trail.records[2].reason, "no geometry");

        let message = report.failure_message().unwrap();
        assert!(message.contains("native-drag -> failed"));
        assert!(message.contains("pointer-sequence -> failed"));
        assert!(message.contains("coordinate-interpolation -> failed: no geometry"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inert_native_drag_falls_through_to_pointer_sequence() {
        let driver = drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0)).with_drag_support(DragSupport {
            native: Mechanism::Inert,
            ..DragSupport::default()
        });
        let mut s = session(&driver);

        let report = Dispatcher::default().dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(report.passed);
        assert_eq!(report.winner.as_deref(), Some("pointer-sequence"));
        assert_eq!(report.trail.records[0].class, AttemptClass::Inconclusive);
        assert!(report.trail.suspects_application());
        assert!(!driver.was_called("pointer_move"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_coordinates_work() {
        let driver = drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0)).with_drag_support(DragSupport {
            native: Mechanism::Broken,
            pointer: Mechanism::Broken,
            coordinates: Mechanism::Effective,
        });
        let config = EngineConfig::builder().interpolation_steps(5).build();
        let mut s = session(&driver);

        let report = Dispatcher::new(config).dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(report.passed);
        assert_eq!(report.winner.as_deref(), Some("coordinate-interpolation"));
        assert_eq!(report.trail.count(AttemptClass::Failed), 2);
        assert!(driver.call_count("pointer_move") >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_source_never_moves_pointer() {
        let driver = drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0));
        driver.insert_element(&driver.primary(), &source(), MockElement::at(100.0, 300.0, 80.0, 40.0));
        let mut s = session(&driver);

        let report = Dispatcher::default().dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(!report.passed);
        assert!(report
            .trail
            .records
            .iter()
            .all(|r| r.reason == AMBIGUOUS_OR_MISSING));
        assert!(!driver.was_called("drag_to"));
        assert!(!driver.was_called("pointer_down"));

        // narrowing the locator resolves the ambiguity
        let narrowed = Intent::drag_and_drop(source().first(), target(), PostCondition::Visible(dropped()));
        let driver = drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0));
        driver.insert_element(&driver.primary(), &source(), MockElement::at(100.0, 300.0, 80.0, 40.0));
        let report = Dispatcher::default()
            .dispatch(&mut session(&driver), &narrowed)
            .await
            .unwrap();
        assert!(driver.was_called("drag_to"));
        assert!(report.trail.records[0].reason != AMBIGUOUS_OR_MISSING);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_drop_effect_recovered_by_final_verification() {
        let driver = MockDriver::new(DRAG_PAGE)
            .with_element(source(), MockElement::at(100.0, 100.0, 80.0, 40.0))
            .with_element(target(), MockElement::at(400.0, 100.0, 150.0, 150.0))
            .with_element(dropped(), MockElement::hidden())
            .with_drop(
                source(),
                target(),
                Reaction::after(Duration::from_millis(5_500), Effect::Reveal(dropped())),
            )
            .with_drag_support(DragSupport {
                native: Mechanism::Effective,
                pointer: Mechanism::Broken,
                coordinates: Mechanism::Broken,
            });
        let mut s = session(&driver);

        let report = Dispatcher::default().dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(report.passed);
        let last = report.trail.records.last().unwrap();
        assert_eq!(last.class, AttemptClass::Recovered);
        assert_eq!(report.winner.as_deref(), Some("native-drag"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_pointer_sequence_releases_button() {
        let driver = drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0))
            .with_drag_support(DragSupport {
                native: Mechanism::Inert,
                pointer: Mechanism::Effective,
                coordinates: Mechanism::Effective,
            })
            .with_call_latency("hover:css=#droppable", Duration::from_secs(60));
        let mut s = session(&driver);

        let report = Dispatcher::default().dispatch(&mut s, &drag_intent()).await.unwrap();

        assert!(report.passed, "{:?}", report.failure_message());
        assert_eq!(report.winner.as_deref(), Some("coordinate-interpolation"));
        assert_eq!(report.trail.records[1].reason, "timed out after 5000 ms");
        // the cancelled press was released before the next tier pressed again
        assert_eq!(driver.call_count("pointer_down"), 2);
        assert_eq!(driver.call_count("pointer_up"), 2);
        assert!(!driver.pointer_pressed());
    }
}

mod popup_scenarios {
    use super::*;

    fn footer(link: &Locator, reaction: Reaction) -> MockDriver {
        MockDriver::new(HOME)
            .with_element(link.clone(), MockElement::at(20.0, 900.0, 60.0, 16.0))
            .with_click(link.clone(), reaction)
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_destination_verified_and_settled() {
        let link = Locator::role("link", "Topics");
        let driver = footer(
            &link,
            Reaction::after(
                Duration::from_millis(300),
                Effect::OpenDocument("https://example.com/topics".into()),
            ),
        );
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::exact("https://example.com/topics"));

        let report = Dispatcher::default().dispatch(&mut s, &intent).await.unwrap();

        assert!(report.passed, "{:?}", report.failure_message());
        assert_eq!(report.winner.as_deref(), Some("open-and-verify"));
        assert!(s.is_settled());
        assert_eq!(s.active(), &driver.primary());
        assert_eq!(driver.open_documents(), vec![driver.primary()]);
        assert_eq!(driver.front(), Some(driver.primary()));
        assert!(driver.was_called("close_document:doc-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_that_never_goes_idle_still_passes() {
        let link = Locator::role("link", "Facebook");
        let driver = footer(
            &link,
            Reaction::now(Effect::OpenDocument("https://www.facebook.com/qabrains".into())),
        )
        .with_new_document_load(LoadState::Load, Duration::from_millis(800));
        let config = EngineConfig::builder().popup_load_ms(2_000, 2_000).build();
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::Host("www.facebook.com".into()));

        let report = Dispatcher::new(config).dispatch(&mut s, &intent).await.unwrap();

        assert!(report.passed);
        assert!(report.elapsed() >= Duration::from_millis(2_800));
        assert_eq!(driver.open_documents().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_stuck_before_load_passes_with_default_config() {
        let link = Locator::role("link", "LinkedIn");
        let driver = footer(
            &link,
            Reaction::now(Effect::OpenDocument("https://www.linkedin.com/company/qabrains".into())),
        )
        .with_new_document_load(LoadState::DomContentLoaded, Duration::ZERO);
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::Host("www.linkedin.com".into()));

        let report = Dispatcher::default().dispatch(&mut s, &intent).await.unwrap();

        assert!(report.passed, "{:?}", report.failure_message());
        // both load steps ran out before the URL check
        assert!(report.elapsed() >= Duration::from_secs(30));
        assert!(s.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_stuck_before_load_fits_short_intent_deadline() {
        let link = Locator::role("link", "LinkedIn");
        let driver = footer(
            &link,
            Reaction::now(Effect::OpenDocument("https://www.linkedin.com/company/qabrains".into())),
        )
        .with_new_document_load(LoadState::DomContentLoaded, Duration::ZERO);
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::Host("www.linkedin.com".into()))
            .with_deadline(Duration::from_secs(30));

        let report = Dispatcher::default().dispatch(&mut s, &intent).await.unwrap();

        assert!(report.passed, "{:?}", report.failure_message());
        assert_eq!(report.trail.strategies(), ["open-and-verify"]);
        assert!(report.elapsed() < Duration::from_secs(30));
        assert_eq!(driver.open_documents(), vec![driver.primary()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_link_reports_no_navigation() {
        let link = Locator::text("Careers");
        let driver = footer(&link, Reaction::now(Effect::Nothing));
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::Contains("/careers".into()));

        let report = Dispatcher::default().dispatch(&mut s, &intent).await.unwrap();

        assert!(!report.passed);
        assert_eq!(report.trail.records[0].reason, NO_NAVIGATION);
        assert!(report.failure_message().unwrap().contains("no navigation observed"));
        assert!(report.elapsed() >= Duration::from_millis(7_500));
        assert!(s.is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_document_link_is_verified_then_undone() {
        let link = Locator::text("Discussion");
        let driver = footer(
            &link,
            Reaction::after(
                Duration::from_millis(2_800),
                Effect::Navigate("https://practice.qabrains.com/discussion".into()),
            ),
        );
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::Glob("**/discussion*".into()));

        let report = Dispatcher::default().dispatch(&mut s, &intent).await.unwrap();

        assert!(report.passed, "{:?}", report.failure_message());
        assert_eq!(driver.url_of(&driver.primary()).as_deref(), Some(HOME));
        assert_eq!(driver.open_documents().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_new_document_falls_back_within_bound() {
        let link = Locator::text("Blog");
        let driver = footer(&link, Reaction::now(Effect::Nothing));
        let config = EngineConfig::builder()
            .popup_grace_ms(1_000)
            .url_timeouts_ms(5_000, 2_000)
            .build();
        let mut s = session(&driver);
        let intent = Intent::open_and_verify(link, UrlPattern::Contains("/blog".into()));

        let report = Dispatcher::new(config).dispatch(&mut s, &intent).await.unwrap();

        assert!(!report.passed);
        // grace, same-document watch, then one final verification
        assert!(report.elapsed() >= Duration::from_millis(3_000));
        assert!(report.elapsed() <= Duration::from_millis(4_100));
    }
}

mod form_scenarios {
    use super::*;

    fn field() -> Locator {
        Locator::role("textbox", "Email")
    }

    fn form(support: FieldSupport) -> MockDriver {
        MockDriver::new("https://practice.qabrains.com/registration")
            .with_element(Locator::new("form#registration"), MockElement::at(0.0, 0.0, 600.0, 400.0))
            .with_element(field(), MockElement::at(20.0, 40.0, 300.0, 30.0).with_field(support))
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_fill() {
        let driver = form(FieldSupport::default());
        let report = Dispatcher::default()
            .dispatch(&mut session(&driver), &Intent::form_fill(field(), "ada@example.com"))
            .await
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.winner.as_deref(), Some("direct-fill"));
        assert_eq!(
            driver.element_value(&driver.primary(), &field()).as_deref(),
            Some("ada@example.com")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_script_assignment() {
        let driver = form(FieldSupport {
            fill: Mechanism::Inert,
            typing: Mechanism::Broken,
            script: Mechanism::Effective,
            ..FieldSupport::default()
        });
        let report = Dispatcher::default()
            .dispatch(&mut session(&driver), &Intent::form_fill(field(), "ada@example.com"))
            .await
            .unwrap();

        assert!(report.passed);
        assert_eq!(report.winner.as_deref(), Some("scripted-assign"));
        let classes: Vec<_> = report.trail.records.iter().map(|r| r.class).collect();
        assert_eq!(
            classes,
            [AttemptClass::Inconclusive, AttemptClass::Failed, AttemptClass::Succeeded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_precondition_is_fatal() {
        let driver = form(FieldSupport::default());
        let intent = Intent::form_fill(field(), "x")
            .with_precondition(PostCondition::Visible(Locator::new("form#login")));
        let report = Dispatcher::default()
            .dispatch(&mut session(&driver), &intent)
            .await
            .unwrap();

        assert!(!report.passed);
        assert!(report.trail.is_fatal());
        assert_eq!(report.trail.len(), 1);
        assert!(!driver.was_called("fill"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_choices_section_of_submission_form() {
        let red = Locator::role("radio", "Red");
        let pizza = Locator::role("checkbox", "Pizza");
        let country = Locator::role("combobox", "Select Country*");
        let stubborn = FieldSupport {
            click: Mechanism::Inert,
            ..FieldSupport::default()
        };
        let driver = MockDriver::new("https://practice.qabrains.com/form-submission")
            .with_element(red.clone(), MockElement::checkbox(20.0, 200.0, 16.0, 16.0))
            .with_element(pizza.clone(), MockElement::checkbox(20.0, 240.0, 16.0, 16.0).with_field(stubborn))
            .with_element(
                country.clone(),
                MockElement::select(20.0, 280.0, 300.0, 30.0, &[("Bangladesh", "Bangladesh"), ("Japan", "Japan")]),
            );
        let scenario = Scenario::new("form submission choices")
            .step(Intent::check(red.clone()))
            .step(Intent::check(pizza.clone()))
            .step(Intent::select_option(country.clone(), "Bangladesh"));
        let mut s = session(&driver);

        let report = scenario.run(&Dispatcher::default(), &mut s).await.unwrap();

        assert!(report.passed(), "{:?}", report.failure_message());
        let winners: Vec<_> = report.reports.iter().map(|r| r.winner.clone().unwrap()).collect();
        assert_eq!(winners, ["click-check", "scripted-check", "select-option"]);
        // the inert click was demoted before the script fallback won
        assert_eq!(report.reports[1].trail.records[0].class, AttemptClass::Inconclusive);
        let doc = driver.primary();
        assert_eq!(driver.element_checked(&doc, &red), Some(true));
        assert_eq!(driver.element_checked(&doc, &pizza), Some(true));
        assert_eq!(driver.element_value(&doc, &country).as_deref(), Some("Bangladesh"));
    }
}

mod scenario_runs {
    use super::*;

    /// One page with a drag zone, a popup link and a form field
    fn practice_site() -> MockDriver {
        let link = Locator::role("link", "Topics");
        drag_page(MockElement::at(400.0, 100.0, 150.0, 150.0))
            .with_element(link.clone(), MockElement::at(20.0, 900.0, 60.0, 16.0))
            .with_click(link, Reaction::now(Effect::OpenDocument("https://example.com/topics".into())))
            .with_element(Locator::test_id("name"), MockElement::at(20.0, 500.0, 300.0, 30.0))
    }

    fn full_sequence() -> Scenario {
        Scenario::new("practice site")
            .step(drag_intent())
            .step(Intent::open_and_verify(
                Locator::role("link", "Topics"),
                UrlPattern::exact("https://example.com/topics"),
            ))
            .step(Intent::form_fill(Locator::test_id("name"), "Ada Lovelace"))
    }

    fn distribution(report: &ScenarioReport) -> Vec<Vec<AttemptClass>> {
        report
            .reports
            .iter()
            .map(|r| r.trail.records.iter().map(|rec| rec.class).collect())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_is_idempotent_from_settled() {
        let driver = practice_site();
        let mut s = session(&driver);
        let dispatcher = Dispatcher::default();
        let scenario = full_sequence();

        let first = scenario.run(&dispatcher, &mut s).await.unwrap();
        assert!(first.passed(), "{:?}", first.failure_message());
        assert!(s.is_settled());
        assert_eq!(driver.open_documents().len(), 1);

        let second = scenario.run(&dispatcher, &mut s).await.unwrap();
        assert!(second.passed(), "{:?}", second.failure_message());
        assert!(s.is_settled());
        assert_eq!(driver.open_documents().len(), 1);
        assert_eq!(distribution(&first), distribution(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_intent_message_carries_trail() {
        let driver = drag_page(MockElement::detached());
        let scenario = Scenario::new("drop zone hidden")
            .step(drag_intent())
            .step(Intent::form_fill(Locator::test_id("name"), "never reached"));

        let report = scenario
            .run(&Dispatcher::default(), &mut session(&driver))
            .await
            .unwrap();

        assert!(!report.passed());
        assert_eq!(report.reports.len(), 1);
        assert!(report.failure_message().unwrap().contains("no geometry"));
    }
}
