//! Scriptable in-memory [`Driver`] for tests.
//!
//! `MockDriver` models just enough of a browser for the engine's strategies to
//! be exercised deterministically: documents with a URL and history, elements
//! with visibility, geometry and a value, a pointer, and scripted reactions to
//! drops and clicks. Each interaction mechanism can be told to work, to do
//! nothing while reporting success, or to fail outright.
//!
//! ```rust,ignore
//! let driver = MockDriver::new("https://practice.qabrains.com/drag-drop")
//!     .with_element(Locator::text("Drag Me"), MockElement::at(10.0, 10.0, 80.0, 30.0))
//!     .with_element(Locator::new("#drop"), MockElement::at(300.0, 10.0, 200.0, 200.0))
//!     .with_drop(Locator::text("Drag Me"), Locator::new("#drop"), Reaction::now(Effect::Reveal(dropped)));
//! ```
//!
//! Clones share state, so a test can keep one handle while the engine owns
//! another. Delayed reactions run on spawned tokio tasks and therefore follow
//! the (possibly paused) tokio clock.

use crate::driver::{DocumentId, DocumentStream, Driver};
use crate::locator::{BoundingBox, Locator, Point, Selector};
use crate::result::{TenazError, TenazResult};
use crate::wait::LoadState;
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How one interaction mechanism behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mechanism {
    /// Performs the interaction and triggers its reactions
    #[default]
    Effective,
    /// Reports success but has no effect on the page
    Inert,
    /// Returns an error
    Broken,
}

/// Per-mechanism behavior of drag-and-drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DragSupport {
    /// `Driver::drag_to`
    pub native: Mechanism,
    /// hover / down / hover / up
    pub pointer: Mechanism,
    /// down / move ... / up at coordinates
    pub coordinates: Mechanism,
}

/// Per-mechanism behavior of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSupport {
    /// `Driver::fill`
    pub fill: Mechanism,
    /// `Driver::type_text` into the focused field
    pub typing: Mechanism,
    /// `Driver::set_value` and `Driver::set_checked`
    pub script: Mechanism,
    /// `Driver::click` toggling a checkbox or radio
    pub click: Mechanism,
    /// `Driver::select_option`
    pub select: Mechanism,
}

/// One element in a mock document
#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    /// Rendered and visible
    pub visible: bool,
    /// Layout box, `None` when not laid out
    pub bbox: Option<BoundingBox>,
    /// Form value
    pub value: String,
    /// Checked state, `None` for elements that cannot be checked
    pub checked: Option<bool>,
    /// `(value, label)` of each `<select>` option
    pub options: Vec<(String, String)>,
    /// Behavior when used as a form field
    pub field: FieldSupport,
}

impl MockElement {
    /// Visible element laid out at the given box
    #[must_use]
    pub fn at(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            visible: true,
            bbox: Some(BoundingBox::new(x, y, width, height)),
            value: String::new(),
            checked: None,
            options: Vec::new(),
            field: FieldSupport::default(),
        }
    }

    /// Unchecked checkbox or radio button laid out at the given box
    #[must_use]
    pub fn checkbox(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            checked: Some(false),
            ..Self::at(x, y, width, height)
        }
    }

    /// `<select>` with `(value, label)` options; nothing selected
    #[must_use]
    pub fn select(x: f64, y: f64, width: f64, height: f64, options: &[(&str, &str)]) -> Self {
        Self {
            options: options
                .iter()
                .map(|(value, label)| ((*value).to_string(), (*label).to_string()))
                .collect(),
            ..Self::at(x, y, width, height)
        }
    }

    /// Element present in the DOM but hidden
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::at(0.0, 0.0, 0.0, 0.0)
        }
    }

    /// Element present in the DOM without layout
    #[must_use]
    pub fn detached() -> Self {
        Self {
            visible: false,
            bbox: None,
            ..Self::at(0.0, 0.0, 0.0, 0.0)
        }
    }

    /// Set the field behavior
    #[must_use]
    pub const fn with_field(mut self, field: FieldSupport) -> Self {
        self.field = field;
        self
    }
}

/// What a reaction does to the document it fires on
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Nothing happens
    Nothing,
    /// Make an element visible, creating it if absent
    Reveal(Locator),
    /// Hide an element
    Hide(Locator),
    /// Navigate the document to a URL
    Navigate(String),
    /// Open a new document at a URL
    OpenDocument(String),
}

/// An effect, optionally delayed
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    /// What happens
    pub effect: Effect,
    /// How long after the trigger
    pub delay: Duration,
}

impl Reaction {
    /// Immediate reaction
    #[must_use]
    pub const fn now(effect: Effect) -> Self {
        Self {
            effect,
            delay: Duration::ZERO,
        }
    }

    /// Delayed reaction
    #[must_use]
    pub const fn after(delay: Duration, effect: Effect) -> Self {
        Self { effect, delay }
    }
}

#[derive(Debug, Clone)]
struct MockDocument {
    url: String,
    history: Vec<String>,
    elements: HashMap<Selector, Vec<MockElement>>,
    load_ceiling: LoadState,
    load_delay: Duration,
}

impl MockDocument {
    fn new(url: String, load_ceiling: LoadState, load_delay: Duration) -> Self {
        Self {
            url,
            history: Vec::new(),
            elements: HashMap::new(),
            load_ceiling,
            load_delay,
        }
    }

    fn resolve(&self, locator: &Locator) -> TenazResult<usize> {
        let raw = self.elements.get(locator.selector()).map_or(0, Vec::len);
        let count = locator.narrow_count(raw);
        if count != 1 {
            return Err(TenazError::LocatorMismatch {
                selector: locator.to_string(),
                count,
            });
        }
        Ok(locator.index().unwrap_or(0))
    }

    fn element(&self, locator: &Locator) -> TenazResult<&MockElement> {
        let i = self.resolve(locator)?;
        self.elements
            .get(locator.selector())
            .and_then(|els| els.get(i))
            .ok_or_else(|| mismatch(locator))
    }

    fn element_mut(&mut self, locator: &Locator) -> TenazResult<&mut MockElement> {
        let i = self.resolve(locator)?;
        self.elements
            .get_mut(locator.selector())
            .and_then(|els| els.get_mut(i))
            .ok_or_else(|| mismatch(locator))
    }

    fn laid_out(&self, locator: &Locator) -> TenazResult<BoundingBox> {
        let el = self.element(locator)?;
        match el.bbox {
            Some(bbox) if el.visible => Ok(bbox),
            _ => Err(TenazError::InputError {
                message: format!("{locator} is not visible"),
            }),
        }
    }
}

fn mismatch(locator: &Locator) -> TenazError {
    TenazError::LocatorMismatch {
        selector: locator.to_string(),
        count: 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Positioning {
    Hover,
    Move,
}

#[derive(Debug, Clone, Copy)]
struct PointerState {
    position: Option<Point>,
    positioned_by: Positioning,
    pressed_at: Option<(Point, Positioning)>,
}

impl Default for PointerState {
    fn default() -> Self {
        Self {
            position: None,
            positioned_by: Positioning::Move,
            pressed_at: None,
        }
    }
}

#[derive(Debug, Clone)]
struct DropRule {
    source: Locator,
    target: Locator,
    reaction: Reaction,
}

#[derive(Debug, Default)]
struct MockState {
    order: Vec<DocumentId>,
    documents: HashMap<DocumentId, MockDocument>,
    next_id: usize,
    front: Option<DocumentId>,
    focus: Option<(DocumentId, Locator)>,
    pointer: PointerState,
    drag: DragSupport,
    drops: Vec<DropRule>,
    clicks: Vec<(Locator, Reaction)>,
    new_document_load: (LoadState, Duration),
    subscribers: Vec<UnboundedSender<DocumentId>>,
    latency: HashMap<&'static str, Duration>,
    call_latency: Vec<(String, Duration)>,
    calls: Vec<String>,
}

impl MockState {
    fn document(&self, doc: &DocumentId) -> TenazResult<&MockDocument> {
        self.documents.get(doc).ok_or_else(|| unknown(doc))
    }

    fn document_mut(&mut self, doc: &DocumentId) -> TenazResult<&mut MockDocument> {
        self.documents.get_mut(doc).ok_or_else(|| unknown(doc))
    }

    fn open(&mut self, url: String) -> DocumentId {
        let id = DocumentId::new(format!("doc-{}", self.next_id));
        self.next_id += 1;
        let (ceiling, delay) = self.new_document_load;
        self.documents
            .insert(id.clone(), MockDocument::new(url, ceiling, delay));
        self.order.push(id.clone());
        self.subscribers
            .retain(|tx| tx.unbounded_send(id.clone()).is_ok());
        id
    }

    fn apply(&mut self, doc: &DocumentId, effect: &Effect) {
        match effect {
            Effect::Nothing => {}
            Effect::Reveal(locator) => {
                if let Ok(document) = self.document_mut(doc) {
                    if document.element(locator).is_ok() {
                        if let Ok(el) = document.element_mut(locator) {
                            el.visible = true;
                        }
                    } else {
                        document
                            .elements
                            .entry(locator.selector().clone())
                            .or_default()
                            .push(MockElement::at(0.0, 0.0, 100.0, 20.0));
                    }
                }
            }
            Effect::Hide(locator) => {
                if let Ok(el) = self
                    .document_mut(doc)
                    .and_then(|d| d.element_mut(locator))
                {
                    el.visible = false;
                }
            }
            Effect::Navigate(url) => {
                if let Ok(document) = self.document_mut(doc) {
                    let previous = std::mem::replace(&mut document.url, url.clone());
                    document.history.push(previous);
                }
            }
            Effect::OpenDocument(url) => {
                self.open(url.clone());
            }
        }
    }

    fn element_at(&self, doc: &DocumentId, locator: &Locator, point: Point) -> bool {
        self.document(doc)
            .and_then(|d| d.laid_out(locator))
            .is_ok_and(|bbox| bbox.contains(&point))
    }
}

fn unknown(doc: &DocumentId) -> TenazError {
    TenazError::UnknownDocument {
        id: doc.to_string(),
    }
}

/// In-memory driver with scripted page behavior
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Create a driver with one primary document at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let mut state = MockState {
            new_document_load: (LoadState::NetworkIdle, Duration::ZERO),
            ..MockState::default()
        };
        let primary = state.open(url.into());
        state.front = Some(primary);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The document created with the driver
    #[must_use]
    pub fn primary(&self) -> DocumentId {
        DocumentId::new("doc-0")
    }

    /// Add an element to the primary document
    #[must_use]
    pub fn with_element(self, locator: Locator, element: MockElement) -> Self {
        self.insert_element(&self.primary(), &locator, element);
        self
    }

    /// Add an element to `doc`; repeated calls with one selector add siblings
    pub fn insert_element(&self, doc: &DocumentId, locator: &Locator, element: MockElement) {
        if let Some(document) = self.lock().documents.get_mut(doc) {
            document
                .elements
                .entry(locator.selector().clone())
                .or_default()
                .push(element);
        }
    }

    /// Set how each drag mechanism behaves
    #[must_use]
    pub fn with_drag_support(self, support: DragSupport) -> Self {
        self.lock().drag = support;
        self
    }

    /// React when `source` is dropped onto `target`
    #[must_use]
    pub fn with_drop(self, source: Locator, target: Locator, reaction: Reaction) -> Self {
        self.lock().drops.push(DropRule {
            source,
            target,
            reaction,
        });
        self
    }

    /// React when `locator` is clicked
    #[must_use]
    pub fn with_click(self, locator: Locator, reaction: Reaction) -> Self {
        self.lock().clicks.push((locator, reaction));
        self
    }

    /// Delay every call of `operation` (e.g. `"drag_to"`) by `latency`
    #[must_use]
    pub fn with_latency(self, operation: &'static str, latency: Duration) -> Self {
        self.lock().latency.insert(operation, latency);
        self
    }

    /// Delay only the calls whose log entry starts with `call`
    /// (e.g. `"hover:css=#droppable"`), on top of any per-operation latency
    #[must_use]
    pub fn with_call_latency(self, call: impl Into<String>, latency: Duration) -> Self {
        self.lock().call_latency.push((call.into(), latency));
        self
    }

    /// Load behavior of documents opened from now on
    #[must_use]
    pub fn with_new_document_load(self, ceiling: LoadState, delay: Duration) -> Self {
        self.lock().new_document_load = (ceiling, delay);
        self
    }

    /// Strongest load state `doc` will ever reach
    pub fn set_load_ceiling(&self, doc: &DocumentId, ceiling: LoadState) {
        if let Some(document) = self.lock().documents.get_mut(doc) {
            document.load_ceiling = ceiling;
        }
    }

    /// Time `doc` takes to reach any load state
    pub fn set_load_delay(&self, doc: &DocumentId, delay: Duration) {
        if let Some(document) = self.lock().documents.get_mut(doc) {
            document.load_delay = delay;
        }
    }

    /// Whether the element is currently visible, without recording a call
    #[must_use]
    pub fn element_visible(&self, doc: &DocumentId, locator: &Locator) -> bool {
        self.lock()
            .document(doc)
            .and_then(|d| d.element(locator))
            .is_ok_and(|el| el.visible)
    }

    /// Current value of a field, without recording a call
    #[must_use]
    pub fn element_value(&self, doc: &DocumentId, locator: &Locator) -> Option<String> {
        self.lock()
            .document(doc)
            .and_then(|d| d.element(locator))
            .map(|el| el.value.clone())
            .ok()
    }

    /// Checked state of a checkbox or radio, without recording a call
    #[must_use]
    pub fn element_checked(&self, doc: &DocumentId, locator: &Locator) -> Option<bool> {
        self.lock()
            .document(doc)
            .and_then(|d| d.element(locator))
            .ok()
            .and_then(|el| el.checked)
    }

    /// URL of `doc`, without recording a call
    #[must_use]
    pub fn url_of(&self, doc: &DocumentId) -> Option<String> {
        self.lock().documents.get(doc).map(|d| d.url.clone())
    }

    /// Open documents in creation order
    #[must_use]
    pub fn open_documents(&self) -> Vec<DocumentId> {
        self.lock().order.clone()
    }

    /// Document that last received focus
    #[must_use]
    pub fn front(&self) -> Option<DocumentId> {
        self.lock().front.clone()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().calls.iter().any(|c| c.starts_with(method))
    }

    /// Whether the pointer button is held down
    #[must_use]
    pub fn pointer_pressed(&self) -> bool {
        self.lock().pointer.pressed_at.is_some()
    }

    /// Number of calls starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    /// Record the call and apply the configured latency
    async fn enter(&self, operation: &'static str, call: String) {
        let latency = {
            let mut state = self.lock();
            let targeted: Duration = state
                .call_latency
                .iter()
                .filter(|(prefix, _)| call.starts_with(prefix.as_str()))
                .map(|(_, latency)| *latency)
                .sum();
            state.calls.push(call);
            state.latency.get(operation).copied().unwrap_or_default() + targeted
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn react(&self, doc: &DocumentId, reaction: Reaction) {
        if reaction.delay.is_zero() {
            self.lock().apply(doc, &reaction.effect);
            return;
        }
        let state = Arc::clone(&self.state);
        let doc = doc.clone();
        tokio::spawn(async move {
            tokio::time::sleep(reaction.delay).await;
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(&doc, &reaction.effect);
        });
    }

    fn fire_drops(&self, doc: &DocumentId, mechanism: Mechanism, from: Point, to: Point) -> TenazResult<()> {
        match mechanism {
            Mechanism::Broken => {
                return Err(TenazError::InputError {
                    message: "drag gesture rejected".into(),
                })
            }
            Mechanism::Inert => return Ok(()),
            Mechanism::Effective => {}
        }
        let fired: Vec<Reaction> = {
            let state = self.lock();
            state
                .drops
                .iter()
                .filter(|rule| {
                    state.element_at(doc, &rule.source, from) && state.element_at(doc, &rule.target, to)
                })
                .map(|rule| rule.reaction.clone())
                .collect()
        };
        for reaction in fired {
            self.react(doc, reaction);
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn count(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<usize> {
        self.enter("count", format!("count:{locator}")).await;
        let state = self.lock();
        let raw = state
            .document(doc)?
            .elements
            .get(locator.selector())
            .map_or(0, Vec::len);
        Ok(locator.narrow_count(raw))
    }

    async fn is_visible(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<bool> {
        self.enter("is_visible", format!("is_visible:{locator}")).await;
        let state = self.lock();
        let document = state.document(doc)?;
        Ok(document.element(locator).is_ok_and(|el| el.visible))
    }

    async fn bounding_box(
        &self,
        doc: &DocumentId,
        locator: &Locator,
    ) -> TenazResult<Option<BoundingBox>> {
        self.enter("bounding_box", format!("bounding_box:{locator}"))
            .await;
        let state = self.lock();
        let el = state.document(doc)?.element(locator)?;
        Ok(el.bbox.filter(|_| el.visible))
    }

    async fn drag_to(
        &self,
        doc: &DocumentId,
        source: &Locator,
        target: &Locator,
    ) -> TenazResult<()> {
        self.enter("drag_to", format!("drag_to:{source}->{target}"))
            .await;
        let (mechanism, from, to) = {
            let state = self.lock();
            let document = state.document(doc)?;
            let from = document.laid_out(source)?.center();
            let to = document.laid_out(target)?.center();
            (state.drag.native, from, to)
        };
        self.fire_drops(doc, mechanism, from, to)
    }

    async fn hover(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<()> {
        self.enter("hover", format!("hover:{locator}")).await;
        let mut state = self.lock();
        let center = state.document(doc)?.laid_out(locator)?.center();
        state.pointer.position = Some(center);
        state.pointer.positioned_by = Positioning::Hover;
        Ok(())
    }

    async fn pointer_down(&self, doc: &DocumentId) -> TenazResult<()> {
        self.enter("pointer_down", format!("pointer_down:{doc}"))
            .await;
        let mut state = self.lock();
        state.document(doc)?;
        let position = state.pointer.position.ok_or_else(|| TenazError::InputError {
            message: "pointer has no position".into(),
        })?;
        state.pointer.pressed_at = Some((position, state.pointer.positioned_by));
        Ok(())
    }

    async fn pointer_move(&self, doc: &DocumentId, to: Point) -> TenazResult<()> {
        self.enter("pointer_move", format!("pointer_move:{:.0},{:.0}", to.x, to.y))
            .await;
        let mut state = self.lock();
        state.document(doc)?;
        state.pointer.position = Some(to);
        state.pointer.positioned_by = Positioning::Move;
        Ok(())
    }

    async fn pointer_up(&self, doc: &DocumentId) -> TenazResult<()> {
        self.enter("pointer_up", format!("pointer_up:{doc}")).await;
        let (mechanism, from, to) = {
            let mut state = self.lock();
            state.document(doc)?;
            let Some((from, pressed_by)) = state.pointer.pressed_at.take() else {
                return Err(TenazError::InputError {
                    message: "pointer is not pressed".into(),
                });
            };
            let to = state.pointer.position.unwrap_or(from);
            let mechanism = if pressed_by == Positioning::Hover
                && state.pointer.positioned_by == Positioning::Hover
            {
                state.drag.pointer
            } else {
                state.drag.coordinates
            };
            (mechanism, from, to)
        };
        self.fire_drops(doc, mechanism, from, to)
    }

    async fn click(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<()> {
        self.enter("click", format!("click:{locator}")).await;
        let fired: Vec<Reaction> = {
            let mut state = self.lock();
            let document = state.document_mut(doc)?;
            document.laid_out(locator)?;
            let el = document.element_mut(locator)?;
            if let Some(checked) = el.checked {
                match el.field.click {
                    Mechanism::Effective => el.checked = Some(!checked),
                    Mechanism::Inert => {}
                    Mechanism::Broken => {
                        return Err(TenazError::InputError {
                            message: format!("click on {locator} was intercepted"),
                        })
                    }
                }
            }
            state.focus = Some((doc.clone(), locator.clone()));
            state
                .clicks
                .iter()
                .filter(|(l, _)| l == locator)
                .map(|(_, r)| r.clone())
                .collect()
        };
        for reaction in fired {
            self.react(doc, reaction);
        }
        Ok(())
    }

    async fn fill(&self, doc: &DocumentId, locator: &Locator, text: &str) -> TenazResult<()> {
        self.enter("fill", format!("fill:{locator}")).await;
        let mut state = self.lock();
        let document = state.document_mut(doc)?;
        document.laid_out(locator)?;
        let el = document.element_mut(locator)?;
        match el.field.fill {
            Mechanism::Effective => el.value = text.to_string(),
            Mechanism::Inert => {}
            Mechanism::Broken => {
                return Err(TenazError::InputError {
                    message: format!("{locator} is not editable"),
                })
            }
        }
        Ok(())
    }

    async fn type_text(&self, doc: &DocumentId, text: &str) -> TenazResult<()> {
        self.enter("type_text", format!("type_text:{doc}")).await;
        let mut state = self.lock();
        let (focused_doc, locator) = state.focus.clone().ok_or_else(|| TenazError::InputError {
            message: "no element has focus".into(),
        })?;
        if &focused_doc != doc {
            return Err(TenazError::InputError {
                message: format!("focus is in {focused_doc}"),
            });
        }
        let el = state.document_mut(doc)?.element_mut(&locator)?;
        match el.field.typing {
            Mechanism::Effective => el.value.push_str(text),
            Mechanism::Inert => {}
            Mechanism::Broken => {
                return Err(TenazError::InputError {
                    message: "keyboard input rejected".into(),
                })
            }
        }
        Ok(())
    }

    async fn set_value(&self, doc: &DocumentId, locator: &Locator, text: &str) -> TenazResult<()> {
        self.enter("set_value", format!("set_value:{locator}")).await;
        let mut state = self.lock();
        let el = state.document_mut(doc)?.element_mut(locator)?;
        match el.field.script {
            Mechanism::Effective => el.value = text.to_string(),
            Mechanism::Inert => {}
            Mechanism::Broken => {
                return Err(TenazError::ScriptError {
                    message: "value assignment threw".into(),
                })
            }
        }
        Ok(())
    }

    async fn input_value(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<String> {
        self.enter("input_value", format!("input_value:{locator}"))
            .await;
        let state = self.lock();
        Ok(state.document(doc)?.element(locator)?.value.clone())
    }

    async fn is_checked(&self, doc: &DocumentId, locator: &Locator) -> TenazResult<bool> {
        self.enter("is_checked", format!("is_checked:{locator}")).await;
        let state = self.lock();
        state
            .document(doc)?
            .element(locator)?
            .checked
            .ok_or_else(|| TenazError::InputError {
                message: format!("{locator} is not checkable"),
            })
    }

    async fn set_checked(&self, doc: &DocumentId, locator: &Locator, checked: bool) -> TenazResult<()> {
        self.enter("set_checked", format!("set_checked:{locator}")).await;
        let mut state = self.lock();
        let el = state.document_mut(doc)?.element_mut(locator)?;
        if el.checked.is_none() {
            return Err(TenazError::ScriptError {
                message: format!("{locator} has no checked property"),
            });
        }
        match el.field.script {
            Mechanism::Effective => el.checked = Some(checked),
            Mechanism::Inert => {}
            Mechanism::Broken => {
                return Err(TenazError::ScriptError {
                    message: "checked assignment threw".into(),
                })
            }
        }
        Ok(())
    }

    async fn select_option(&self, doc: &DocumentId, locator: &Locator, option: &str) -> TenazResult<()> {
        self.enter("select_option", format!("select_option:{locator}"))
            .await;
        let mut state = self.lock();
        let document = state.document_mut(doc)?;
        document.laid_out(locator)?;
        let el = document.element_mut(locator)?;
        let value = el
            .options
            .iter()
            .find(|(value, label)| value == option || label == option)
            .map(|(value, _)| value.clone())
            .ok_or_else(|| TenazError::InputError {
                message: format!("{locator} has no option {option:?}"),
            })?;
        match el.field.select {
            Mechanism::Effective => el.value = value,
            Mechanism::Inert => {}
            Mechanism::Broken => {
                return Err(TenazError::InputError {
                    message: format!("{locator} rejected the selection"),
                })
            }
        }
        Ok(())
    }

    async fn current_url(&self, doc: &DocumentId) -> TenazResult<String> {
        self.enter("current_url", format!("current_url:{doc}")).await;
        Ok(self.lock().document(doc)?.url.clone())
    }

    async fn go_back(&self, doc: &DocumentId) -> TenazResult<()> {
        self.enter("go_back", format!("go_back:{doc}")).await;
        let mut state = self.lock();
        let document = state.document_mut(doc)?;
        let previous = document.history.pop().ok_or_else(|| TenazError::NavigationError {
            url: document.url.clone(),
            message: "no history entry to go back to".into(),
        })?;
        document.url = previous;
        Ok(())
    }

    async fn wait_for_load_state(
        &self,
        doc: &DocumentId,
        state: LoadState,
        timeout: Duration,
    ) -> TenazResult<()> {
        self.enter("wait_for_load_state", format!("wait_for_load_state:{doc}:{state}"))
            .await;
        let (ceiling, delay) = {
            let guard = self.lock();
            let document = guard.document(doc)?;
            (document.load_ceiling, document.load_delay)
        };
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        if ceiling.satisfies(state) && delay <= timeout {
            tokio::time::sleep(delay).await;
            Ok(())
        } else {
            tokio::time::sleep(timeout).await;
            Err(TenazError::Timeout { ms: timeout_ms })
        }
    }

    async fn subscribe_documents(&self) -> TenazResult<DocumentStream> {
        self.enter("subscribe_documents", "subscribe_documents".into())
            .await;
        let (tx, rx) = unbounded();
        self.lock().subscribers.push(tx);
        Ok(rx.boxed())
    }

    async fn documents(&self) -> TenazResult<Vec<DocumentId>> {
        Ok(self.lock().order.clone())
    }

    async fn close_document(&self, doc: &DocumentId) -> TenazResult<()> {
        self.enter("close_document", format!("close_document:{doc}"))
            .await;
        let mut state = self.lock();
        state.documents.remove(doc).ok_or_else(|| unknown(doc))?;
        state.order.retain(|d| d != doc);
        if state.front.as_ref() == Some(doc) {
            state.front = None;
        }
        Ok(())
    }

    async fn bring_to_front(&self, doc: &DocumentId) -> TenazResult<()> {
        self.enter("bring_to_front", format!("bring_to_front:{doc}"))
            .await;
        let mut state = self.lock();
        state.document(doc)?;
        state.front = Some(doc.clone());
        Ok(())
    }
}
