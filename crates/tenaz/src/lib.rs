//! Tenaz: Strategy-Fallback Engine for Flaky Browser Interactions
//!
//! Tenaz (Spanish: "tenacious") realizes a user-level *intent* (drag this onto
//! that, open this link and verify where it lands, fill this field) by trying
//! an ordered list of interaction strategies until the intent's observable
//! post-condition holds, all under one deadline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      TENAZ Architecture                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌─────────┐  │
//! │  │ Scenario │──►│ Dispatcher │──►│  Strategies  │──►│ Driver  │  │
//! │  │ (intents)│   │ (deadline, │   │ drag / popup │   │ (CDP or │  │
//! │  │          │   │  verify)   │   │ / form fill  │   │  mock)  │  │
//! │  └──────────┘   └─────┬──────┘   └──────────────┘   └─────────┘  │
//! │                       ▼                                          │
//! │                 ReasonTrail (one record per attempt)             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenaz::prelude::*;
//!
//! # async fn run() -> TenazResult<()> {
//! let driver = MockDriver::new("https://practice.qabrains.com/drag-drop");
//! let mut session = SessionContext::new(Arc::new(driver.clone()), driver.primary());
//! let intent = Intent::drag_and_drop(
//!     Locator::text("Drag Me"),
//!     Locator::new("#droppable"),
//!     PostCondition::Visible(Locator::role("heading", "Dropped!")),
//! );
//! let report = Dispatcher::default().dispatch(&mut session, &intent).await?;
//! if let Some(message) = report.failure_message() {
//!     eprintln!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod browser;
mod classifier;
mod condition;
mod config;
mod dispatcher;
mod drag;
mod driver;
mod form;
mod harness;
mod intent;
mod lifecycle;
mod locator;
mod pattern;
mod popup;
mod result;
mod session;
mod strategy;
mod wait;

/// Scriptable in-memory driver for tests
///
/// Documents, elements, interaction mechanisms and the page's reactions are
/// all configured up front; every driver call is logged for assertions.
pub mod mock;

pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use classifier::{AttemptClass, AttemptRecord, ReasonTrail};
pub use condition::PostCondition;
pub use config::{EngineConfig, EngineConfigBuilder};
pub use dispatcher::{Dispatcher, IntentReport};
pub use drag::{CoordinateInterpolation, NativeDrag, PointerSequence};
pub use driver::{DocumentId, DocumentStream, Driver};
pub use form::{ClickCheck, DirectFill, FocusAndType, NativeSelect, ScriptedAssign, ScriptedCheck};
pub use harness::{Scenario, ScenarioReport, DEFAULT_SCENARIO_DEADLINE_MS};
pub use intent::{Intent, IntentKind};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use locator::{BoundingBox, Locator, Point, Selector};
pub use pattern::{host_of, UrlPattern};
pub use popup::{OpenAndVerifyStrategy, NO_NAVIGATION};
pub use result::{TenazError, TenazResult};
pub use session::SessionContext;
pub use strategy::{default_strategies, resolve_unique, Outcome, Strategy, AMBIGUOUS_OR_MISSING};
pub use wait::{
    poll_until, settle_load, LoadFallback, LoadSettlement, LoadState, LoadStep, WaitResult,
    NETWORK_IDLE_THRESHOLD_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::browser::*;
    pub use super::classifier::*;
    pub use super::condition::*;
    pub use super::config::*;
    pub use super::dispatcher::*;
    pub use super::drag::*;
    pub use super::driver::*;
    pub use super::form::*;
    pub use super::harness::*;
    pub use super::intent::*;
    pub use super::lifecycle::*;
    pub use super::locator::*;
    pub use super::mock::*;
    pub use super::pattern::*;
    pub use super::popup::*;
    pub use super::result::*;
    pub use super::session::*;
    pub use super::strategy::*;
    pub use super::wait::*;
}
