//! Locator abstraction for element selection.
//!
//! Locators are strict: interaction strategies refuse to act on a locator that
//! resolves to zero or several elements, and report it instead of guessing.
//! Use [`Locator::nth`] or [`Locator::first`] to pick one element out of many.
//!
//! Locators are usually environment configuration, so they can be parsed from
//! strings (see [`Locator::parse`]):
//!
//! ```text
//! css=#drop-target          text=Drag Me >> nth=1
//! role=heading[name="Dropped!"]   testid=submit   //form//button
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::result::{TenazError, TenazResult};

/// A point in 2D viewport space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation between `self` and `to` at `t` in `[0, 1]`
    #[must_use]
    pub fn lerp(&self, to: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }

    /// The `steps` points strictly after `self` up to and including `to`
    #[must_use]
    pub fn path_to(&self, to: &Self, steps: u32) -> Vec<Self> {
        let steps = steps.max(1);
        (1..=steps)
            .map(|i| self.lerp(to, f64::from(i) / f64::from(steps)))
            .collect()
    }
}

/// Bounding box for a laid-out element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point is inside this bounding box
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// A box with no area cannot be targeted by pointer input
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Text content selector (substring match on the innermost element)
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// ARIA role with optional accessible name
    Role {
        /// ARIA role, e.g. "heading", "link", "textbox"
        role: String,
        /// Accessible name to match exactly
        name: Option<String>,
    },
    /// Combined selector with text filter
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>, name: Option<&str>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.map(str::to_string),
        }
    }

    /// JavaScript expression evaluating to an array of every matching element
    #[must_use]
    pub fn to_all_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::XPath(s) => format!(
                "(() => {{ const r = document.evaluate({s:?}, document, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 return Array.from({{ length: r.snapshotLength }}, (_, i) => r.snapshotItem(i)); }})()"
            ),
            Self::Text(t) => format!(
                "Array.from(document.querySelectorAll('body *')).filter(el => \
                 el.textContent.includes({t:?}) && \
                 !Array.from(el.children).some(c => c.textContent.includes({t:?})))"
            ),
            Self::TestId(id) => {
                format!("Array.from(document.querySelectorAll('[data-testid={id:?}]'))")
            }
            Self::Role { role, name } => {
                let name = name
                    .as_deref()
                    .map_or_else(|| "null".to_string(), |n| format!("{n:?}"));
                format!("{ROLE_QUERY_JS}({role:?}, {name})")
            }
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({css:?})).filter(el => el.textContent.includes({text:?}))"
            ),
        }
    }
}

/// Implicit-role lookup for the roles the suite relies on; falls back to `[role=…]`
const ROLE_QUERY_JS: &str = "((role, name) => { \
    const implicit = { heading: 'h1,h2,h3,h4,h5,h6', link: 'a[href]', \
      button: 'button,input[type=button],input[type=submit]', \
      textbox: 'input:not([type]),input[type=text],input[type=email],input[type=password],input[type=tel],input[type=date],textarea', \
      checkbox: 'input[type=checkbox]', radio: 'input[type=radio]', combobox: 'select' }; \
    const sel = (implicit[role] ? implicit[role] + ',' : '') + '[role=\"' + role + '\"]'; \
    const label = el => (el.getAttribute('aria-label') || (el.labels && el.labels[0] && el.labels[0].textContent) || \
      el.getAttribute('placeholder') || el.textContent || '').trim(); \
    return Array.from(document.querySelectorAll(sel)).filter(el => name === null || label(el) === name); })";

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Text(t) => write!(f, "text={t}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name:?}]"),
            Self::CssWithText { css, text } => write!(f, "css={css} >> text={text}"),
        }
    }
}

/// A locator for finding elements: a selector plus an optional index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    selector: Selector,
    index: Option<usize>,
}

impl Locator {
    /// Create a new locator with a CSS selector
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(selector.into()))
    }

    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            index: None,
        }
    }

    /// Locate by text content
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::text(text))
    }

    /// Locate by ARIA role and accessible name
    #[must_use]
    pub fn role(role: impl Into<String>, name: &str) -> Self {
        Self::from_selector(Selector::role(role, Some(name)))
    }

    /// Locate by `data-testid`
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::from_selector(Selector::TestId(id.into()))
    }

    /// Filter by text content
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let selector = match self.selector {
            Selector::Css(css) => Selector::CssWithText {
                css,
                text: text.into(),
            },
            other => other,
        };
        Self {
            selector,
            index: self.index,
        }
    }

    /// Narrow to the `n`th match (zero-based)
    #[must_use]
    pub fn nth(mut self, n: usize) -> Self {
        self.index = Some(n);
        self
    }

    /// Narrow to the first match
    #[must_use]
    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the index, if narrowed
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// Number of elements this locator resolves to, given the selector's raw match count
    #[must_use]
    pub fn narrow_count(&self, raw: usize) -> usize {
        match self.index {
            Some(i) => usize::from(i < raw),
            None => raw,
        }
    }

    /// JavaScript expression evaluating to the array of resolved elements
    #[must_use]
    pub fn to_query(&self) -> String {
        let all = self.selector.to_all_query();
        match self.index {
            Some(i) => format!("((els) => els.length > {i} ? [els[{i}]] : [])({all})"),
            None => all,
        }
    }

    /// Parse a locator string such as `role=heading[name="Dropped!"] >> nth=0`
    pub fn parse(input: &str) -> TenazResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid(input, "empty locator"));
        }

        let (body, index) = match trimmed.rsplit_once(">> nth=") {
            Some((body, n)) => {
                let n = n
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid(input, "nth must be a non-negative integer"))?;
                (body.trim(), Some(n))
            }
            None => (trimmed, None),
        };

        let selector = if let Some(css) = body.strip_prefix("css=") {
            Selector::Css(css.to_string())
        } else if let Some(xpath) = body.strip_prefix("xpath=") {
            Selector::XPath(xpath.to_string())
        } else if body.starts_with("//") {
            Selector::XPath(body.to_string())
        } else if let Some(text) = body.strip_prefix("text=") {
            Selector::Text(text.trim_matches('"').to_string())
        } else if let Some(id) = body.strip_prefix("testid=") {
            Selector::TestId(id.to_string())
        } else if body.starts_with("role=") {
            parse_role(input, body)?
        } else {
            Selector::Css(body.to_string())
        };

        if matches!(&selector, Selector::Css(s) | Selector::XPath(s) | Selector::Text(s) | Selector::TestId(s) if s.is_empty())
        {
            return Err(invalid(input, "empty selector body"));
        }

        Ok(Self { selector, index })
    }
}

fn parse_role(input: &str, body: &str) -> TenazResult<Selector> {
    static ROLE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ROLE_RE
        .get_or_init(|| {
            Regex::new(r#"^role=([a-z]+)(?:\[name=(?:"([^"]*)"|'([^']*)')\])?$"#).ok()
        })
        .as_ref()
        .ok_or_else(|| invalid(input, "role pattern unavailable"))?;

    let caps = re
        .captures(body)
        .ok_or_else(|| invalid(input, "expected role=<role>[name=\"<name>\"]"))?;
    let role = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
    let name = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string());
    Ok(Selector::Role { role, name })
}

fn invalid(input: &str, message: &str) -> TenazError {
    TenazError::InvalidLocator {
        input: input.to_string(),
        message: message.to_string(),
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} >> nth={i}", self.selector),
            None => write!(f, "{}", self.selector),
        }
    }
}

impl std::str::FromStr for Locator {
    type Err = TenazError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_css_query() {
            let q = Selector::css("#drop-target").to_all_query();
            assert!(q.contains("querySelectorAll"));
            assert!(q.contains("#drop-target"));
        }

        #[test]
        fn test_role_query_embeds_name() {
            let q = Selector::role("heading", Some("Dropped!")).to_all_query();
            assert!(q.contains("\"heading\""));
            assert!(q.contains("\"Dropped!\""));
        }

        #[test]
        fn test_role_query_without_name() {
            let q = Selector::role("link", None).to_all_query();
            assert!(q.ends_with("(\"link\", null)"));
        }

        #[test]
        fn test_display() {
            assert_eq!(Selector::css("a").to_string(), "css=a");
            assert_eq!(
                Selector::role("heading", Some("Drag & Drop")).to_string(),
                "role=heading[name=\"Drag & Drop\"]"
            );
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_nth_narrows_count() {
            let loc = Locator::text("Drag Me").nth(1);
            assert_eq!(loc.narrow_count(2), 1);
            assert_eq!(loc.narrow_count(1), 0);
            assert_eq!(Locator::text("Drag Me").narrow_count(2), 2);
        }

        #[test]
        fn test_first_is_nth_zero() {
            assert_eq!(Locator::new("li").first().index(), Some(0));
        }

        #[test]
        fn test_with_text_on_css() {
            let loc = Locator::new("span").with_text("Login Successful");
            assert!(matches!(loc.selector(), Selector::CssWithText { .. }));
        }

        #[test]
        fn test_with_text_on_role_is_ignored() {
            let loc = Locator::role("link", "Home").with_text("x");
            assert!(matches!(loc.selector(), Selector::Role { .. }));
        }

        #[test]
        fn test_query_applies_index() {
            let q = Locator::new("li").nth(2).to_query();
            assert!(q.contains("els.length > 2"));
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_prefixes() {
            assert_eq!(
                Locator::parse("css=#nav").unwrap().selector(),
                &Selector::css("#nav")
            );
            assert_eq!(
                Locator::parse("text=Drag Me").unwrap().selector(),
                &Selector::text("Drag Me")
            );
            assert_eq!(
                Locator::parse("testid=submit").unwrap().selector(),
                &Selector::TestId("submit".into())
            );
            assert!(matches!(
                Locator::parse("//footer//a").unwrap().selector(),
                Selector::XPath(_)
            ));
        }

        #[test]
        fn test_parse_bare_is_css() {
            assert_eq!(
                Locator::parse("footer a[href^=\"mailto:\"]").unwrap().selector(),
                &Selector::css("footer a[href^=\"mailto:\"]")
            );
        }

        #[test]
        fn test_parse_role_with_name() {
            let loc: Locator = "role=heading[name=\"Dropped!\"]".parse().unwrap();
            assert_eq!(loc.selector(), &Selector::role("heading", Some("Dropped!")));

            let loc = Locator::parse("role=link[name='QA Topics']").unwrap();
            assert_eq!(loc.selector(), &Selector::role("link", Some("QA Topics")));

            let loc = Locator::parse("role=button").unwrap();
            assert_eq!(loc.selector(), &Selector::role("button", None));
        }

        #[test]
        fn test_parse_nth_suffix() {
            let loc = Locator::parse("text=Drag Me >> nth=1").unwrap();
            assert_eq!(loc.index(), Some(1));
            assert_eq!(loc.selector(), &Selector::text("Drag Me"));
            assert_eq!(loc.to_string(), "text=Drag Me >> nth=1");
        }

        #[test]
        fn test_parse_rejects_garbage() {
            assert!(Locator::parse("   ").is_err());
            assert!(Locator::parse("css=").is_err());
            assert!(Locator::parse("role=heading[title=x]").is_err());
            assert!(Locator::parse("text=a >> nth=-1").is_err());
        }
    }

    mod geometry_tests {
        use super::*;

        #[test]
        fn test_bounding_box_center() {
            let bbox = BoundingBox::new(100.0, 200.0, 50.0, 20.0);
            assert_eq!(bbox.center(), Point::new(125.0, 210.0));
        }

        #[test]
        fn test_bounding_box_contains_edges() {
            let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
            assert!(bbox.contains(&Point::new(0.0, 0.0)));
            assert!(bbox.contains(&Point::new(10.0, 10.0)));
            assert!(!bbox.contains(&Point::new(10.1, 5.0)));
        }

        #[test]
        fn test_empty_box() {
            assert!(BoundingBox::new(5.0, 5.0, 0.0, 10.0).is_empty());
            assert!(!BoundingBox::new(5.0, 5.0, 1.0, 1.0).is_empty());
        }

        #[test]
        fn test_path_ends_at_target() {
            let from = Point::new(0.0, 0.0);
            let to = Point::new(100.0, 50.0);
            let path = from.path_to(&to, 10);
            assert_eq!(path.len(), 10);
            assert_eq!(path[0], Point::new(10.0, 5.0));
            assert_eq!(*path.last().unwrap(), to);
        }

        #[test]
        fn test_path_zero_steps_is_single_move() {
            let path = Point::new(0.0, 0.0).path_to(&Point::new(4.0, 4.0), 0);
            assert_eq!(path, vec![Point::new(4.0, 4.0)]);
        }
    }
}
