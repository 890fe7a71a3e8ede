//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a plain value: a selector kind plus a selector value.
//! It identifies zero or more elements in a remote document but holds no
//! reference to any of them. Resolution into [`crate::ElementHandle`]s
//! happens inside a polling primitive and never outlives it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector kind and value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., "button[type='submit']")
    Css(String),
    /// `name` attribute (form inputs)
    Name(String),
    /// Single class name
    ClassName(String),
    /// Tag name (e.g., "td")
    TagName(String),
    /// Element id
    Id(String),
    /// XPath selector
    XPath(String),
}

impl Selector {
    /// Short kind label used in logs and error messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::Name(_) => "name",
            Self::ClassName(_) => "class",
            Self::TagName(_) => "tag",
            Self::Id(_) => "id",
            Self::XPath(_) => "xpath",
        }
    }

    /// Raw selector value
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v)
            | Self::Name(v)
            | Self::ClassName(v)
            | Self::TagName(v)
            | Self::Id(v)
            | Self::XPath(v) => v,
        }
    }

    /// Equivalent CSS selector, if one exists. XPath has none.
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self {
            Self::Css(s) => Some(s.clone()),
            Self::Name(n) => Some(format!("[name={n:?}]")),
            Self::ClassName(c) => Some(format!(".{c}")),
            Self::TagName(t) => Some(t.clone()),
            Self::Id(id) => Some(format!("[id={id:?}]")),
            Self::XPath(_) => None,
        }
    }

    /// JavaScript expression returning an `Array` of matching elements
    /// below `scope` (a JS expression evaluating to a node, e.g. `document`).
    #[must_use]
    pub fn to_query_all(&self, scope: &str) -> String {
        match self {
            Self::XPath(x) => format!(
                "(() => {{ const r = document.evaluate({x:?}, {scope}, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
                 return out; }})()"
            ),
            other => {
                let css = other.to_css().unwrap_or_default();
                format!("Array.from({scope}.querySelectorAll({css:?}))")
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind(), self.value())
    }
}

/// Immutable element descriptor, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    selector: Selector,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self { selector }
    }

    /// CSS selector locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(selector.into()))
    }

    /// `name` attribute locator
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::from_selector(Selector::Name(name.into()))
    }

    /// Class name locator
    #[must_use]
    pub fn class_name(class: impl Into<String>) -> Self {
        Self::from_selector(Selector::ClassName(class.into()))
    }

    /// Tag name locator
    #[must_use]
    pub fn tag_name(tag: impl Into<String>) -> Self {
        Self::from_selector(Selector::TagName(tag.into()))
    }

    /// Element id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::from_selector(Selector::Id(id.into()))
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::from_selector(Selector::XPath(xpath.into()))
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.selector.fmt(f)
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Self::from_selector(selector)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_css_passthrough() {
            let sel = Selector::Css("tbody tr".into());
            assert_eq!(sel.to_css().as_deref(), Some("tbody tr"));
            assert_eq!(sel.kind(), "css");
        }

        #[test]
        fn test_name_becomes_attribute_selector() {
            let sel = Selector::Name("email".into());
            assert_eq!(sel.to_css().as_deref(), Some("[name=\"email\"]"));
        }

        #[test]
        fn test_class_and_tag() {
            assert_eq!(
                Selector::ClassName("edit_btn".into()).to_css().as_deref(),
                Some(".edit_btn")
            );
            assert_eq!(
                Selector::TagName("td".into()).to_css().as_deref(),
                Some("td")
            );
        }

        #[test]
        fn test_xpath_has_no_css_form() {
            let sel = Selector::XPath("//tr".into());
            assert!(sel.to_css().is_none());
            assert!(sel.to_query_all("document").contains("document.evaluate"));
        }

        #[test]
        fn test_query_all_scoped() {
            let sel = Selector::TagName("td".into());
            let js = sel.to_query_all("row");
            assert_eq!(js, "Array.from(row.querySelectorAll(\"td\"))");
        }

        #[test]
        fn test_display() {
            assert_eq!(Selector::Name("age".into()).to_string(), "name=age");
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_value_equality() {
            assert_eq!(Locator::name("name"), Locator::name("name"));
            assert_ne!(Locator::name("name"), Locator::class_name("name"));
        }

        #[test]
        fn test_hashable() {
            let mut set = HashSet::new();
            set.insert(Locator::css("tbody tr"));
            set.insert(Locator::css("tbody tr"));
            assert_eq!(set.len(), 1);
        }

        #[test]
        fn test_display_matches_selector() {
            let loc = Locator::css("button[type='submit']");
            assert_eq!(loc.to_string(), "css=button[type='submit']");
        }

        #[test]
        fn test_serde_shape() {
            let loc = Locator::class_name("table");
            let json = serde_json::to_string(&loc).unwrap();
            assert!(json.contains("\"kind\":\"class_name\""));
            let back: Locator = serde_json::from_str(&json).unwrap();
            assert_eq!(back, loc);
        }
    }
}
