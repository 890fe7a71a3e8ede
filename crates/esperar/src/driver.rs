//! DocumentDriver - abstract remote document trait
//!
//! Everything the polling layer needs from a browser binding: element
//! lookup, reads, user gestures, navigation, and page-blocking dialogs.
//! Implementations:
//!
//! - [`crate::MockDocument`] - in-memory application, used by the test suite
//! - `ChromiumDocument` - CDP via chromiumoxide (feature `browser`)
//!
//! All methods take `&self`; drivers use interior mutability so a page
//! object and its polling primitives can share one borrowed driver.

use crate::dialog::Dialog;
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identity of one node in one render of the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap a driver-specific id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live reference to one matched element at lookup time.
///
/// Not stable across re-renders: once the node is replaced every driver
/// call on this handle fails with [`EsperarError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: ElementId,
    tag_name: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: ElementId::new(id),
            tag_name: tag_name.into(),
        }
    }

    /// Element id
    #[must_use]
    pub const fn id(&self) -> &ElementId {
        &self.id
    }

    /// Lower-case tag name
    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Build the stale-element error for this handle
    #[must_use]
    pub fn stale(&self) -> EsperarError {
        EsperarError::StaleElement {
            id: self.id.to_string(),
        }
    }
}

/// `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    /// Still parsing
    Loading,
    /// Parsed, sub-resources loading
    Interactive,
    /// Fully loaded
    Complete,
}

impl ReadyState {
    /// DOM string for this state
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Interactive => "interactive",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadyState {
    type Err = EsperarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(Self::Loading),
            "interactive" => Ok(Self::Interactive),
            "complete" => Ok(Self::Complete),
            other => Err(EsperarError::driver(format!(
                "unknown document.readyState '{other}'"
            ))),
        }
    }
}

/// Remote document query interface.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> EsperarResult<()>;

    /// Reload the current page
    async fn refresh(&self) -> EsperarResult<()>;

    /// Current URL
    async fn current_url(&self) -> EsperarResult<String>;

    /// Document title
    async fn title(&self) -> EsperarResult<String>;

    /// `document.readyState`
    async fn ready_state(&self) -> EsperarResult<ReadyState>;

    /// Run a read-only script against document state
    async fn evaluate(&self, script: &str) -> EsperarResult<serde_json::Value>;

    /// All elements matching `locator`, in document order. Zero matches is `Ok(vec![])`.
    async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>>;

    /// All descendants of `parent` matching `locator`
    async fn find_within(
        &self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> EsperarResult<Vec<ElementHandle>>;

    /// Rendered text content
    async fn text(&self, element: &ElementHandle) -> EsperarResult<String>;

    /// Attribute or property value (`value` reads the live input value)
    async fn attribute(&self, element: &ElementHandle, name: &str)
        -> EsperarResult<Option<String>>;

    /// Rendered and visible
    async fn is_displayed(&self, element: &ElementHandle) -> EsperarResult<bool>;

    /// Visible, enabled, and not obscured by another element
    async fn is_interactable(&self, element: &ElementHandle) -> EsperarResult<bool>;

    /// Simulate a click
    async fn click(&self, element: &ElementHandle) -> EsperarResult<()>;

    /// Clear an input
    async fn clear(&self, element: &ElementHandle) -> EsperarResult<()>;

    /// Type text into an input
    async fn send_keys(&self, element: &ElementHandle, text: &str) -> EsperarResult<()>;

    /// Scroll the element into the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> EsperarResult<()> {
        let _ = element;
        Ok(())
    }

    /// The page-blocking dialog currently open, if any
    async fn pending_dialog(&self) -> EsperarResult<Option<Dialog>>;

    /// Accept (dismiss) the open dialog
    async fn accept_dialog(&self) -> EsperarResult<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> EsperarResult<Vec<u8>> {
        Err(EsperarError::driver("screenshots not supported by this driver"))
    }

    /// End the session and release the browser
    async fn close(&self) -> EsperarResult<()>;
}

#[async_trait]
impl<T: DocumentDriver + ?Sized> DocumentDriver for std::sync::Arc<T> {
    async fn navigate(&self, url: &str) -> EsperarResult<()> {
        (**self).navigate(url).await
    }

    async fn refresh(&self) -> EsperarResult<()> {
        (**self).refresh().await
    }

    async fn current_url(&self) -> EsperarResult<String> {
        (**self).current_url().await
    }

    async fn title(&self) -> EsperarResult<String> {
        (**self).title().await
    }

    async fn ready_state(&self) -> EsperarResult<ReadyState> {
        (**self).ready_state().await
    }

    async fn evaluate(&self, script: &str) -> EsperarResult<serde_json::Value> {
        (**self).evaluate(script).await
    }

    async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>> {
        (**self).find_all(locator).await
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> EsperarResult<Vec<ElementHandle>> {
        (**self).find_within(parent, locator).await
    }

    async fn text(&self, element: &ElementHandle) -> EsperarResult<String> {
        (**self).text(element).await
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> EsperarResult<Option<String>> {
        (**self).attribute(element, name).await
    }

    async fn is_displayed(&self, element: &ElementHandle) -> EsperarResult<bool> {
        (**self).is_displayed(element).await
    }

    async fn is_interactable(&self, element: &ElementHandle) -> EsperarResult<bool> {
        (**self).is_interactable(element).await
    }

    async fn click(&self, element: &ElementHandle) -> EsperarResult<()> {
        (**self).click(element).await
    }

    async fn clear(&self, element: &ElementHandle) -> EsperarResult<()> {
        (**self).clear(element).await
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> EsperarResult<()> {
        (**self).send_keys(element, text).await
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> EsperarResult<()> {
        (**self).scroll_into_view(element).await
    }

    async fn pending_dialog(&self) -> EsperarResult<Option<Dialog>> {
        (**self).pending_dialog().await
    }

    async fn accept_dialog(&self) -> EsperarResult<()> {
        (**self).accept_dialog().await
    }

    async fn screenshot(&self) -> EsperarResult<Vec<u8>> {
        (**self).screenshot().await
    }

    async fn close(&self) -> EsperarResult<()> {
        (**self).close().await
    }
}
