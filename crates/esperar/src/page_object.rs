//! Page Object Model Support
//!
//! [`PageObject`] is what every page type exposes to a runner: where it
//! lives and how to tell that it finished loading. [`BasePage`] carries the
//! generic element helpers page types build on. Every helper goes through
//! a [`PollingLocator`] primitive; none reads the document unguarded.

use crate::config::TimeoutConfig;
use crate::driver::{DocumentDriver, ElementHandle};
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{PollingLocator, ReadyStateComplete, WaitOptions, WaitResult};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// A page or component in the application under test.
#[async_trait]
pub trait PageObject: Send + Sync {
    /// URL this page is opened at
    fn url(&self) -> &str;

    /// Whether the page's key elements are present
    async fn is_loaded(&self) -> EsperarResult<bool>;

    /// How long to wait for [`Self::is_loaded`]
    fn load_timeout(&self) -> Duration {
        Duration::from_millis(crate::wait::DEFAULT_WAIT_TIMEOUT_MS)
    }

    /// Get the page name for logging/debugging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Generic element helpers over one driver.
#[derive(Debug)]
pub struct BasePage<'d, D: DocumentDriver + ?Sized> {
    poller: PollingLocator<'d, D>,
    dialog_grace: Duration,
}

impl<'d, D: DocumentDriver + ?Sized> Clone for BasePage<'d, D> {
    fn clone(&self) -> Self {
        Self {
            poller: self.poller,
            dialog_grace: self.dialog_grace,
        }
    }
}

impl<'d, D: DocumentDriver + ?Sized> BasePage<'d, D> {
    /// Helpers with default timings
    pub fn new(driver: &'d D) -> Self {
        Self::with_timeouts(driver, &TimeoutConfig::default())
    }

    /// Helpers with configured timings
    pub fn with_timeouts(driver: &'d D, timeouts: &TimeoutConfig) -> Self {
        Self {
            poller: PollingLocator::with_options(driver, timeouts.wait_options()),
            dialog_grace: timeouts.dialog_grace(),
        }
    }

    /// Helpers with explicit options
    pub const fn with_options(driver: &'d D, options: WaitOptions, dialog_grace: Duration) -> Self {
        Self {
            poller: PollingLocator::with_options(driver, options),
            dialog_grace,
        }
    }

    /// Underlying driver
    pub const fn driver(&self) -> &'d D {
        self.poller.driver()
    }

    /// Polling primitives
    pub const fn poller(&self) -> &PollingLocator<'d, D> {
        &self.poller
    }

    /// Default wait timeout
    pub const fn timeout(&self) -> Duration {
        self.poller.default_timeout()
    }

    /// Dialog grace window
    pub const fn dialog_grace(&self) -> Duration {
        self.dialog_grace
    }

    /// First match, or [`EsperarError::ElementNotFound`] after the default timeout.
    pub async fn find(&self, locator: &Locator) -> EsperarResult<ElementHandle> {
        match self.poller.await_presence(locator, self.timeout()).await? {
            WaitResult::Found(element) => Ok(element),
            WaitResult::TimedOut => Err(EsperarError::ElementNotFound {
                locator: locator.to_string(),
            }),
        }
    }

    /// All matches; empty when none appear in time
    pub async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>> {
        self.find_all_within(locator, self.timeout()).await
    }

    /// All matches with an explicit timeout; empty when none appear in time
    pub async fn find_all_within(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<Vec<ElementHandle>> {
        Ok(self
            .poller
            .await_all(locator, timeout)
            .await?
            .into_option()
            .unwrap_or_default())
    }

    /// Wait until clickable, then click. `false` if it never became clickable.
    pub async fn click(&self, locator: &Locator) -> EsperarResult<bool> {
        match self.poller.await_clickable(locator, self.timeout()).await? {
            WaitResult::Found(element) => {
                self.driver().click(&element).await?;
                debug!(%locator, "clicked");
                Ok(true)
            }
            WaitResult::TimedOut => Ok(false),
        }
    }

    /// Wait for presence, clear, type. `false` if the input never appeared.
    pub async fn type_into(&self, locator: &Locator, text: &str) -> EsperarResult<bool> {
        match self.poller.await_presence(locator, self.timeout()).await? {
            WaitResult::Found(element) => {
                self.driver().clear(&element).await?;
                self.driver().send_keys(&element, text).await?;
                Ok(true)
            }
            WaitResult::TimedOut => Ok(false),
        }
    }

    /// Whether the element shows up within the default timeout
    pub async fn is_present(&self, locator: &Locator) -> EsperarResult<bool> {
        self.is_present_within(locator, self.timeout()).await
    }

    /// Whether the element shows up within `timeout`
    pub async fn is_present_within(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<bool> {
        Ok(self.poller.await_presence(locator, timeout).await?.is_found())
    }

    /// Text of the first match, `None` if absent
    pub async fn text_of(&self, locator: &Locator) -> EsperarResult<Option<String>> {
        self.text_within(locator, self.timeout()).await
    }

    /// Text of the first match within `timeout`, `None` if absent
    pub async fn text_within(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<Option<String>> {
        match self.poller.await_presence(locator, timeout).await? {
            WaitResult::Found(element) => Ok(Some(self.driver().text(&element).await?)),
            WaitResult::TimedOut => Ok(None),
        }
    }

    /// Attribute of the first match, `None` if the element or attribute is absent
    pub async fn attribute_of(
        &self,
        locator: &Locator,
        name: &str,
    ) -> EsperarResult<Option<String>> {
        match self.poller.await_presence(locator, self.timeout()).await? {
            WaitResult::Found(element) => self.driver().attribute(&element, name).await,
            WaitResult::TimedOut => Ok(None),
        }
    }

    /// Wait until visible
    pub async fn wait_for_visible(&self, locator: &Locator, timeout: Duration) -> EsperarResult<bool> {
        Ok(self.poller.await_visible(locator, timeout).await?.is_found())
    }

    /// Wait until hidden or gone
    pub async fn wait_for_invisible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<bool> {
        Ok(self.poller.await_invisible(locator, timeout).await?.is_found())
    }

    /// Wait until nothing matches
    pub async fn wait_for_disappear(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<bool> {
        Ok(self.poller.await_absence(locator, timeout).await?.is_found())
    }

    /// Wait for `document.readyState == "complete"`
    pub async fn wait_for_page_load(&self) -> EsperarResult<bool> {
        Ok(self
            .poller
            .await_predicate(&ReadyStateComplete, self.timeout())
            .await?
            .is_found())
    }

    /// Accept a blocking dialog if one opens within the grace window.
    pub async fn blocking_dialog_text(&self) -> EsperarResult<Option<String>> {
        self.blocking_dialog_text_within(self.dialog_grace).await
    }

    /// Accept a blocking dialog if one opens within `grace`.
    pub async fn blocking_dialog_text_within(
        &self,
        grace: Duration,
    ) -> EsperarResult<Option<String>> {
        match self.poller.await_dialog(grace).await? {
            WaitResult::Found(dialog) => {
                self.driver().accept_dialog().await?;
                info!(kind = %dialog.dialog_type(), text = dialog.message(), "dialog accepted");
                Ok(Some(dialog.message().to_string()))
            }
            WaitResult::TimedOut => Ok(None),
        }
    }

    /// Scroll the first match into view. `false` if absent.
    pub async fn scroll_into_view(&self, locator: &Locator) -> EsperarResult<bool> {
        match self.poller.await_presence(locator, self.timeout()).await? {
            WaitResult::Found(element) => {
                self.driver().scroll_into_view(&element).await?;
                Ok(true)
            }
            WaitResult::TimedOut => Ok(false),
        }
    }

    /// Save a PNG screenshot, creating parent directories
    pub async fn screenshot(&self, path: impl AsRef<Path>) -> EsperarResult<()> {
        let path = path.as_ref();
        let png = self.driver().screenshot().await?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &png)?;
        info!(path = %path.display(), bytes = png.len(), "screenshot saved");
        Ok(())
    }
}
