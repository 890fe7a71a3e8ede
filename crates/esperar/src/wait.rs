//! Wait Mechanisms
//!
//! Bounded polling primitives that turn an asynchronously rendered remote
//! document into deterministic test steps. Nothing here assumes that an
//! action's effect is visible when the action returns; every read is a
//! poll with an explicit deadline.
//!
//! A timeout is a value ([`WaitResult::TimedOut`]), not an error. Only
//! fatal driver failures come back as `Err`. Callers that want a hard
//! failure escalate with [`WaitResult::or_timeout`].

use crate::dialog::Dialog;
use crate::driver::{DocumentDriver, ReadyState};
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Floor for the polling interval; zero would spin
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Ceiling applied when a timeout would overflow the clock (one year)
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Outcome of a polling primitive
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum WaitResult<T> {
    /// The condition held; carries the resolved value
    Found(T),
    /// The deadline elapsed first
    TimedOut,
}

impl<T> WaitResult<T> {
    /// Condition held
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Deadline elapsed
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Borrow the found value
    pub const fn found(&self) -> Option<&T> {
        match self {
            Self::Found(v) => Some(v),
            Self::TimedOut => None,
        }
    }

    /// Convert into an `Option`
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::TimedOut => None,
        }
    }

    /// Map the found value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> WaitResult<U> {
        match self {
            Self::Found(v) => WaitResult::Found(f(v)),
            Self::TimedOut => WaitResult::TimedOut,
        }
    }

    /// Escalate a timeout into [`EsperarError::Timeout`].
    pub fn or_timeout(self, waited_for: impl Into<String>, timeout: Duration) -> EsperarResult<T> {
        match self {
            Self::Found(v) => Ok(v),
            Self::TimedOut => Err(EsperarError::Timeout {
                waited_for: waited_for.into(),
                ms: timeout.as_millis() as u64,
            }),
        }
    }
}

impl<T> From<WaitResult<T>> for Option<T> {
    fn from(result: WaitResult<T>) -> Self {
        result.into_option()
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as Duration, clamped to [`MIN_POLL_INTERVAL_MS`]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

// =============================================================================
// WAIT CONDITION TRAIT
// =============================================================================

/// A condition over document state that is not expressible as a locator.
#[async_trait]
pub trait WaitCondition<D: DocumentDriver + ?Sized>: Send + Sync {
    /// Check if the condition is satisfied right now
    async fn check(&self, driver: &D) -> EsperarResult<bool>;

    /// Get description for logs and escalated errors
    fn description(&self) -> String;
}

/// `document.readyState == "complete"`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadyStateComplete;

#[async_trait]
impl<D: DocumentDriver + ?Sized> WaitCondition<D> for ReadyStateComplete {
    async fn check(&self, driver: &D) -> EsperarResult<bool> {
        Ok(driver.ready_state().await? == ReadyState::Complete)
    }

    fn description(&self) -> String {
        "document ready".to_string()
    }
}

/// Document title contains a fragment
#[derive(Debug, Clone)]
pub struct TitleContains(pub String);

#[async_trait]
impl<D: DocumentDriver + ?Sized> WaitCondition<D> for TitleContains {
    async fn check(&self, driver: &D) -> EsperarResult<bool> {
        Ok(driver.title().await?.contains(&self.0))
    }

    fn description(&self) -> String {
        format!("title containing '{}'", self.0)
    }
}

/// Some element matching the locator is displayed
#[derive(Debug, Clone)]
pub struct ElementVisible(pub Locator);

#[async_trait]
impl<D: DocumentDriver + ?Sized> WaitCondition<D> for ElementVisible {
    async fn check(&self, driver: &D) -> EsperarResult<bool> {
        for element in driver.find_all(&self.0).await? {
            if driver.is_displayed(&element).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn description(&self) -> String {
        format!("visible {}", self.0)
    }
}

/// Exactly `expected` elements match a locator
#[derive(Debug, Clone)]
pub struct ElementCount {
    /// Locator to count
    pub locator: Locator,
    /// Count to wait for
    pub expected: usize,
}

#[async_trait]
impl<D: DocumentDriver + ?Sized> WaitCondition<D> for ElementCount {
    async fn check(&self, driver: &D) -> EsperarResult<bool> {
        Ok(driver.find_all(&self.locator).await?.len() == self.expected)
    }

    fn description(&self) -> String {
        format!("{} x {}", self.expected, self.locator)
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

/// Core poll loop shared by every primitive.
///
/// `check` runs at least once, then every `poll_interval` until it yields
/// `Some` or `timeout` elapses. Each check is cut off at the deadline, so a
/// hung driver call still ends in `TimedOut`. Transient errors (stale
/// elements) count as "not yet"; anything else is returned immediately.
pub async fn poll_for<T, F, Fut>(
    waited_for: &str,
    timeout: Duration,
    poll_interval: Duration,
    mut check: F,
) -> EsperarResult<WaitResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EsperarResult<Option<T>>>,
{
    let start = Instant::now();
    let deadline = start
        .checked_add(timeout)
        .unwrap_or_else(|| start + MAX_WAIT_TIMEOUT);
    let interval = poll_interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS));
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        match tokio::time::timeout_at(deadline, check()).await {
            Ok(Ok(Some(value))) => {
                debug!(
                    waited_for,
                    polls,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "condition met"
                );
                return Ok(WaitResult::Found(value));
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) if e.is_transient() => {
                debug!(waited_for, error = %e, "transient error, polling again");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(interval.min(deadline.saturating_duration_since(now))).await;
    }

    debug!(
        waited_for,
        polls,
        timeout_ms = timeout.as_millis() as u64,
        "wait timed out"
    );
    Ok(WaitResult::TimedOut)
}

// =============================================================================
// POLLING LOCATOR
// =============================================================================

/// The five polling primitives (plus visibility variants) over one driver.
#[derive(Debug)]
pub struct PollingLocator<'d, D: DocumentDriver + ?Sized> {
    driver: &'d D,
    options: WaitOptions,
}

impl<'d, D: DocumentDriver + ?Sized> Clone for PollingLocator<'d, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'d, D: DocumentDriver + ?Sized> Copy for PollingLocator<'d, D> {}

impl<'d, D: DocumentDriver + ?Sized> PollingLocator<'d, D> {
    /// Create with default options
    pub fn new(driver: &'d D) -> Self {
        Self::with_options(driver, WaitOptions::default())
    }

    /// Create with custom options
    pub const fn with_options(driver: &'d D, options: WaitOptions) -> Self {
        Self { driver, options }
    }

    /// Borrowed driver
    pub const fn driver(&self) -> &'d D {
        self.driver
    }

    /// Options in use
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Default timeout from options
    pub const fn default_timeout(&self) -> Duration {
        self.options.timeout()
    }

    /// Wait until at least one element matches; returns the first.
    pub async fn await_presence(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<crate::ElementHandle>> {
        let driver = self.driver;
        let waited_for = format!("presence of {locator}");
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            Ok::<_, EsperarError>(driver.find_all(locator).await?.into_iter().next())
        })
        .await
    }

    /// Wait until at least one element matches; returns all of them.
    ///
    /// On timeout this returns `Found(vec![])`, never `TimedOut`: use it
    /// where zero matches is a legitimate state (an empty table).
    pub async fn await_all(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<Vec<crate::ElementHandle>>> {
        let driver = self.driver;
        let waited_for = format!("all of {locator}");
        let result = poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            let found = driver.find_all(locator).await?;
            Ok::<_, EsperarError>((!found.is_empty()).then_some(found))
        })
        .await?;
        Ok(WaitResult::Found(result.into_option().unwrap_or_default()))
    }

    /// Wait until a matching element is interactable (visible, enabled,
    /// not obscured); returns the first such element.
    pub async fn await_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<crate::ElementHandle>> {
        let driver = self.driver;
        let waited_for = format!("clickable {locator}");
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            for element in driver.find_all(locator).await? {
                match driver.is_interactable(&element).await {
                    Ok(true) => return Ok(Some(element)),
                    Ok(false) => {}
                    Err(e) if e.is_transient() => {}
                    Err(e) => return Err(e),
                }
            }
            Ok::<_, EsperarError>(None)
        })
        .await
    }

    /// [`Self::await_clickable`] scoped to the `index`-th match of `scope`.
    ///
    /// Scope and control are re-resolved on every poll, so a re-render
    /// between polls never leaves the wait holding a stale row.
    pub async fn await_clickable_within(
        &self,
        scope: &Locator,
        index: usize,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<crate::ElementHandle>> {
        let driver = self.driver;
        let waited_for = format!("clickable {locator} in {scope}[{index}]");
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            let Some(parent) = driver.find_all(scope).await?.into_iter().nth(index) else {
                return Ok(None);
            };
            for element in driver.find_within(&parent, locator).await? {
                if driver.is_interactable(&element).await? {
                    return Ok(Some(element));
                }
            }
            Ok::<_, EsperarError>(None)
        })
        .await
    }

    /// Wait until a matching element is displayed.
    pub async fn await_visible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<crate::ElementHandle>> {
        let driver = self.driver;
        let waited_for = format!("visible {locator}");
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            for element in driver.find_all(locator).await? {
                if driver.is_displayed(&element).await? {
                    return Ok(Some(element));
                }
            }
            Ok::<_, EsperarError>(None)
        })
        .await
    }

    /// Wait until no matching element is displayed (absent counts).
    pub async fn await_invisible(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<()>> {
        let driver = self.driver;
        let waited_for = format!("invisible {locator}");
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            for element in driver.find_all(locator).await? {
                if driver.is_displayed(&element).await? {
                    return Ok(None);
                }
            }
            Ok::<_, EsperarError>(Some(()))
        })
        .await
    }

    /// Wait until a generic document condition holds.
    pub async fn await_predicate<C>(
        &self,
        condition: &C,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<()>>
    where
        C: WaitCondition<D> + ?Sized,
    {
        let driver = self.driver;
        let waited_for = condition.description();
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            Ok::<_, EsperarError>(condition.check(driver).await?.then_some(()))
        })
        .await
    }

    /// Closure form of [`Self::await_predicate`].
    pub async fn await_until<F, Fut>(
        &self,
        description: &str,
        timeout: Duration,
        check: F,
    ) -> EsperarResult<WaitResult<()>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EsperarResult<bool>>,
    {
        let mut check = check;
        poll_for(description, timeout, self.options.poll_interval(), move || {
            let fut = check();
            async move { Ok::<_, EsperarError>(fut.await?.then_some(())) }
        })
        .await
    }

    /// Wait until a page-blocking dialog is open; returns it unhandled.
    pub async fn await_dialog(&self, timeout: Duration) -> EsperarResult<WaitResult<Dialog>> {
        let driver = self.driver;
        poll_for("blocking dialog", timeout, self.options.poll_interval(), move || async move {
            driver.pending_dialog().await
        })
        .await
    }

    /// Wait until nothing matches the locator.
    pub async fn await_absence(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> EsperarResult<WaitResult<()>> {
        let driver = self.driver;
        let waited_for = format!("absence of {locator}");
        poll_for(&waited_for, timeout, self.options.poll_interval(), move || async move {
            Ok::<_, EsperarError>(driver.find_all(locator).await?.is_empty().then_some(()))
        })
        .await
    }
}

// =============================================================================
// TESTS
// =============================================================================
