//! Driver - Abstract Browser Automation Trait
//!
//! The engine never talks to a browser directly. Everything it needs from the
//! automation layer is expressed by [`Driver`]: locator resolution (count,
//! visibility, bounding box), pointer and keyboard primitives, load-state
//! waits, and a stream announcing documents (tabs, popups) as they open.
//!
//! # Implementations
//!
//! - [`MockDriver`](crate::mock::MockDriver) - scriptable, in-memory, for tests
//! - `ChromiumDriver` - CDP via chromiumoxide (feature `browser`)

use crate::locator::{BoundingBox, Locator, Point};
use crate::result::TenazResult;
use crate::wait::LoadState;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque identifier of one document (tab, window, popup) in the session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a driver-specific identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stream of documents opened after the subscription was taken
pub type DocumentStream = BoxStream<'static, DocumentId>;

/// Abstract driver trait for browser automation
///
/// Element-level methods take the document they act on explicitly; the
/// engine decides which document is active, never the driver.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Number of elements `locator` resolves to
    async fn count(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<usize>;

    /// Whether the (single) element is rendered and visible
    async fn is_visible(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<bool>;

    /// Layout box of the element, `None` when it is not laid out
    async fn bounding_box(
        &self,
        doc: &DocumentId,
        locator: &Locator,
    ) -> TenazResult<Option<BoundingBox>>;

    /// High-level drag gesture synthesized by the automation layer
    async fn drag_to(
        &self,
        doc: &DocumentId,
        source: &Locator,
        target: &Locator,
    ) -> TenazResult<()>;

    /// Move the pointer over the element
    async fn hover(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<()>;

    /// Press the primary pointer button at the current position
    async fn pointer_down(&self, doc: &DocumentId) -> TenazResult<()>;

    /// Move the pointer to a viewport coordinate
    async fn pointer_move(&self, doc: &DocumentId, to: Point) -> TenazResult<()>;

    /// Release the primary pointer button at the current position
    async fn pointer_up(&self, doc: &DocumentId) -> TenazResult<()>;

    /// Click the element
    async fn click(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<()>;

    /// Replace the field's value in one operation
    async fn fill(&self, doc: &DocumentId, locator: &Locator, text: &str) -> TenazResult<()>;

    /// Type text into the focused element, one keystroke per character
    async fn type_text(&self, doc: &DocumentId, text: &str) -> TenazResult<()>;

    /// Assign the value by script and dispatch `input` and `change`
    async fn set_value(&self, doc: &DocumentId, locator: &Locator, text: &str) -> TenazResult<()>;

    /// Current value of a form field
    async fn input_value(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<String>;

    /// Whether a checkbox or radio button is checked
    async fn is_checked(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<bool>;

    /// Assign `checked` by script and dispatch `input` and `change`
    async fn set_checked(&self, doc: &DocumentId, locator: &Locator, checked: bool) -> TenazResult<()>;

    /// Pick the `<select>` option whose value or label is `option`
    async fn select_option(&self, doc: &DocumentId, locator: &Locator, option: &str) -> TenazResult<()>;

    /// Current URL of the document
    async fn current_url(&self, doc: &DocumentId) -> TenazResult<String>;

    /// Go back one entry in the document's history
    async fn go_back(&self, doc: &DocumentId) -> TenazResult<()>;

    /// Wait until the document reaches `state`; errors on timeout
    async fn wait_for_load_state(
        &self,
        doc: &DocumentId,
        state: LoadState,
        timeout: Duration,
    ) -> TenazResult<()>;

    /// Subscribe to documents opened from now on
    async fn subscribe_documents(&self) -> TenazResult<DocumentStream>;

    /// Documents currently open
    async fn documents(&self) -> TenazResult<Vec<DocumentId>>;

    /// Close a document
    async fn close_document(&self, doc: &DocumentId) -> TenazResult<()>;

    /// Give a document input focus
    async fn bring_to_front(&self, doc: &DocumentId) -> TenazResult<()>;
}
