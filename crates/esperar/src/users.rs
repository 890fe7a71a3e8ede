//! User management page.
//!
//! [`UserManagementPage`] turns domain actions (add, edit, delete, read the
//! table) into polling waits plus one side-effecting driver call. It never
//! assumes an action's effect is visible when the action returns: callers
//! observe effects with `wait_until_row_*` or [`UserManagementPage::dispatch_and_observe`].
//!
//! ## Mutation state machine
//!
//! ```text
//! Idle ──dispatch──▶ ActionDispatched ──┬──▶ RowAppeared
//!                                       ├──▶ DialogShown (row unchanged)
//!                                       └──▶ Timeout
//! ```
//!
//! All three are terminal. Nothing here retries a submission.

use crate::config::HarnessConfig;
use crate::driver::{DocumentDriver, ElementHandle};
use crate::page_object::{BasePage, PageObject};
use crate::record::{TableSnapshot, UserRecord, UserRow, ROW_CELLS};
use crate::result::{EsperarError, EsperarResult};
use crate::wait::{PollingLocator, WaitResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Submit button label while adding
pub const ADD_LABEL: &str = "Add user";

/// Submit button label the bundled app shows while editing a row
pub const UPDATE_LABEL: &str = "Update user";

/// Locators for the page's elements
pub mod locators {
    use crate::locator::Locator;

    /// Name input
    pub fn name_input() -> Locator {
        Locator::name("name")
    }

    /// Email input
    pub fn email_input() -> Locator {
        Locator::name("email")
    }

    /// Age input
    pub fn age_input() -> Locator {
        Locator::name("age")
    }

    /// Form submit button
    pub fn submit_button() -> Locator {
        Locator::css("button[type='submit']")
    }

    /// The user form
    pub fn form() -> Locator {
        Locator::tag_name("form")
    }

    /// Users table
    pub fn users_table() -> Locator {
        Locator::class_name("table")
    }

    /// Body rows of the users table
    pub fn user_rows() -> Locator {
        Locator::css("tbody tr")
    }

    /// Cells within a row
    pub fn row_cells() -> Locator {
        Locator::tag_name("td")
    }

    /// Per-row edit control
    pub fn edit_button() -> Locator {
        Locator::class_name("edit_btn")
    }

    /// Per-row delete control
    pub fn delete_button() -> Locator {
        Locator::class_name("delete_btn")
    }

    /// Inline message of either kind
    pub fn message() -> Locator {
        Locator::class_name("message")
    }

    /// Inline success message
    pub fn success_message() -> Locator {
        Locator::class_name("success-message")
    }

    /// Inline error message
    pub fn error_message() -> Locator {
        Locator::class_name("error-message")
    }
}

/// Current contents of the three form inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValues {
    /// Name input value
    pub name: String,
    /// Email input value
    pub email: String,
    /// Age input value
    pub age: String,
}

impl From<&UserRecord> for FormValues {
    fn from(record: &UserRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            age: record.age.to_string(),
        }
    }
}

impl FormValues {
    /// All three inputs are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.age.is_empty()
    }
}

/// Outcome of the last operation as reported by the inline message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Message text mentions success
    pub success: bool,
    /// Message text, or a timeout note
    pub message: String,
    /// 200 on success, 400 otherwise, `None` when no message appeared
    pub status_code: Option<u16>,
}

/// A form submission to dispatch and observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Fill the empty form and submit
    Add(UserRecord),
    /// Edit the row at `row`, replace its values, submit
    Update {
        /// Row index at dispatch time
        row: usize,
        /// New values
        record: UserRecord,
    },
}

impl Mutation {
    /// Record the table should show afterwards
    #[must_use]
    pub const fn record(&self) -> &UserRecord {
        match self {
            Self::Add(record) | Self::Update { record, .. } => record,
        }
    }
}

/// Terminal state of a dispatched mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A row matching every field of the record is in the table
    RowAppeared {
        /// Its index at observation time
        index: usize,
    },
    /// The application answered with a blocking dialog (now dismissed)
    DialogShown {
        /// Dialog text
        text: String,
        /// Row count equals the count before dispatch
        rows_unchanged: bool,
    },
    /// Neither happened before the deadline
    Timeout,
}

/// Page object for the user management CRUD page.
#[derive(Debug)]
pub struct UserManagementPage<'d, D: DocumentDriver + ?Sized> {
    base: BasePage<'d, D>,
    url: String,
}

impl<'d, D: DocumentDriver + ?Sized> UserManagementPage<'d, D> {
    /// Page at `config.base_url` with configured timings
    pub fn new(driver: &'d D, config: &HarnessConfig) -> Self {
        Self {
            base: BasePage::with_timeouts(driver, &config.timeouts),
            url: config.base_url.clone(),
        }
    }

    /// Page over prepared helpers
    pub fn with_base(base: BasePage<'d, D>, url: impl Into<String>) -> Self {
        Self {
            base,
            url: url.into(),
        }
    }

    /// Generic helpers
    pub const fn base(&self) -> &BasePage<'d, D> {
        &self.base
    }

    fn poller(&self) -> &PollingLocator<'d, D> {
        self.base.poller()
    }

    fn driver(&self) -> &'d D {
        self.base.driver()
    }

    fn timeout(&self) -> Duration {
        self.base.timeout()
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Navigate to the page and wait for the document to finish loading.
    pub async fn open(&self) -> EsperarResult<()> {
        info!(url = %self.url, "opening user management page");
        self.driver().navigate(&self.url).await?;
        self.ensure_loaded().await
    }

    /// Reload and wait for the document to finish loading.
    pub async fn refresh(&self) -> EsperarResult<()> {
        self.driver().refresh().await?;
        self.ensure_loaded().await
    }

    async fn ensure_loaded(&self) -> EsperarResult<()> {
        if self.base.wait_for_page_load().await? {
            Ok(())
        } else {
            Err(EsperarError::Timeout {
                waited_for: "document ready".to_string(),
                ms: self.timeout().as_millis() as u64,
            })
        }
    }

    /// Document title
    pub async fn title(&self) -> EsperarResult<String> {
        self.driver().title().await
    }

    /// Form is on the page
    pub async fn is_form_present(&self) -> EsperarResult<bool> {
        self.base.is_present(&locators::form()).await
    }

    /// Users table is on the page
    pub async fn is_users_table_present(&self) -> EsperarResult<bool> {
        self.base.is_present(&locators::users_table()).await
    }

    // =========================================================================
    // FORM
    // =========================================================================

    async fn set_field(&self, locator: &crate::Locator, value: &str) -> EsperarResult<()> {
        let input = self.base.find(locator).await?;
        self.driver().clear(&input).await?;
        self.driver().send_keys(&input, value).await
    }

    /// Clear and type each of the three inputs.
    ///
    /// An input that never appears is [`EsperarError::ElementNotFound`].
    pub async fn fill_user_form(&self, name: &str, email: &str, age: &str) -> EsperarResult<()> {
        self.set_field(&locators::name_input(), name).await?;
        self.set_field(&locators::email_input(), email).await?;
        self.set_field(&locators::age_input(), age).await
    }

    /// Wait for the submit button to become clickable and click it.
    pub async fn submit_form(&self) -> EsperarResult<()> {
        let submit = locators::submit_button();
        let button = self
            .poller()
            .await_clickable(&submit, self.timeout())
            .await?
            .or_timeout(format!("clickable {submit}"), self.timeout())?;
        self.driver().click(&button).await?;
        debug!("form submitted");
        Ok(())
    }

    /// Fill the form and submit it. Returns once the click is dispatched;
    /// the row shows up (or a dialog opens) later.
    pub async fn submit_new_user(&self, name: &str, email: &str, age: &str) -> EsperarResult<()> {
        info!(name, email, age, "submitting user");
        self.fill_user_form(name, email, age).await?;
        self.submit_form().await
    }

    /// [`Self::submit_new_user`] from a record
    pub async fn add_user(&self, record: &UserRecord) -> EsperarResult<()> {
        self.submit_new_user(&record.name, &record.email, &record.age.to_string())
            .await
    }

    /// Clear all three inputs
    pub async fn clear_user_form(&self) -> EsperarResult<()> {
        for locator in [locators::name_input(), locators::email_input(), locators::age_input()] {
            let input = self.base.find(&locator).await?;
            self.driver().clear(&input).await?;
        }
        Ok(())
    }

    /// Live values of the three inputs
    pub async fn form_values(&self) -> EsperarResult<FormValues> {
        let value = |locator: crate::Locator| async move {
            let input = self.base.find(&locator).await?;
            Ok::<_, EsperarError>(
                self.driver()
                    .attribute(&input, "value")
                    .await?
                    .unwrap_or_default(),
            )
        };
        Ok(FormValues {
            name: value(locators::name_input()).await?,
            email: value(locators::email_input()).await?,
            age: value(locators::age_input()).await?,
        })
    }

    /// All three inputs are empty
    pub async fn is_form_cleared(&self) -> EsperarResult<bool> {
        Ok(self.form_values().await?.is_empty())
    }

    /// Submit button label, `None` if the button never appears
    pub async fn submit_button_text(&self) -> EsperarResult<Option<String>> {
        self.base.text_of(&locators::submit_button()).await
    }

    // =========================================================================
    // TABLE
    // =========================================================================

    async fn decode_row(&self, row: &ElementHandle) -> EsperarResult<Option<UserRow>> {
        let driver = self.driver();
        let cells = driver.find_within(row, &locators::row_cells()).await?;
        let mut texts = Vec::with_capacity(ROW_CELLS);
        for cell in cells.iter().take(ROW_CELLS) {
            texts.push(driver.text(cell).await?);
        }
        Ok(UserRow::from_cells(&texts))
    }

    async fn decode_rows(&self, handles: Vec<ElementHandle>) -> EsperarResult<TableSnapshot> {
        let mut rows = Vec::with_capacity(handles.len());
        for (index, handle) in handles.iter().enumerate() {
            match self.decode_row(handle).await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => warn!(index, "dropping malformed table row"),
                Err(e) if e.is_transient() => {
                    warn!(index, error = %e, "dropping row replaced mid-read");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(TableSnapshot::new(rows))
    }

    /// Snapshot of the table. Waits up to the default timeout for rows to
    /// render; an empty table yields an empty snapshot, not an error.
    pub async fn read_table(&self) -> EsperarResult<TableSnapshot> {
        self.read_table_within(self.timeout()).await
    }

    /// [`Self::read_table`] with an explicit wait for rows
    pub async fn read_table_within(&self, timeout: Duration) -> EsperarResult<TableSnapshot> {
        let handles = self.base.find_all_within(&locators::user_rows(), timeout).await?;
        self.decode_rows(handles).await
    }

    /// One immediate read, for use inside a predicate that already polls
    async fn snapshot_once(&self) -> EsperarResult<TableSnapshot> {
        let handles = self.driver().find_all(&locators::user_rows()).await?;
        self.decode_rows(handles).await
    }

    /// Index of the row showing `email` in a fresh snapshot
    pub async fn find_row_by_email(&self, email: &str) -> EsperarResult<Option<usize>> {
        Ok(self.read_table().await?.find_by_email(email))
    }

    /// Row at `index` in a fresh snapshot
    pub async fn row(&self, index: usize) -> EsperarResult<Option<UserRow>> {
        Ok(self.read_table().await?.get(index).cloned())
    }

    /// Number of rendered body rows, malformed ones included
    pub async fn users_count(&self) -> EsperarResult<usize> {
        Ok(self.base.find_all(&locators::user_rows()).await?.len())
    }

    /// Whether a row shows `email`
    pub async fn user_exists(&self, email: &str) -> EsperarResult<bool> {
        Ok(self.find_row_by_email(email).await?.is_some())
    }

    /// Whether a row shows both `name` and `email`
    pub async fn is_user_in_table(&self, name: &str, email: &str) -> EsperarResult<bool> {
        Ok(self.read_table().await?.contains_user(name, email))
    }

    /// Poll until a row shows `email`. An open dialog ends the wait with
    /// [`EsperarError::DialogOpen`].
    pub async fn wait_until_row_appears(&self, email: &str, timeout: Duration) -> EsperarResult<bool> {
        let result = self
            .poller()
            .await_until(&format!("row {email}"), timeout, move || async move {
                Ok::<_, EsperarError>(self.snapshot_once().await?.find_by_email(email).is_some())
            })
            .await?;
        Ok(result.is_found())
    }

    /// Poll until no row shows `email`
    pub async fn wait_until_row_disappears(
        &self,
        email: &str,
        timeout: Duration,
    ) -> EsperarResult<bool> {
        let result = self
            .poller()
            .await_until(&format!("no row {email}"), timeout, move || async move {
                Ok::<_, EsperarError>(self.snapshot_once().await?.find_by_email(email).is_none())
            })
            .await?;
        Ok(result.is_found())
    }

    /// Poll until the table holds exactly `expected` rows, else fail naming
    /// both counts.
    pub async fn assert_row_count(&self, expected: usize, timeout: Duration) -> EsperarResult<()> {
        let reached = self
            .poller()
            .await_until(&format!("{expected} rows"), timeout, move || async move {
                Ok::<_, EsperarError>(self.snapshot_once().await?.len() == expected)
            })
            .await?;
        if reached.is_found() {
            return Ok(());
        }
        let observed = self.snapshot_once().await?.len();
        Err(EsperarError::assertion(format!(
            "expected {expected} user rows, observed {observed}"
        )))
    }

    // =========================================================================
    // ROW ACTIONS
    // =========================================================================

    async fn trigger(&self, row: usize, control: &crate::Locator) -> EsperarResult<bool> {
        let rows = locators::user_rows();
        let current = self.base.find_all(&rows).await?;
        if row >= current.len() {
            debug!(row, rows = current.len(), "row index out of range");
            return Ok(false);
        }
        match self
            .poller()
            .await_clickable_within(&rows, row, control, self.timeout())
            .await?
        {
            WaitResult::Found(button) => {
                self.driver().click(&button).await?;
                info!(row, %control, "row action clicked");
                Ok(true)
            }
            WaitResult::TimedOut => Ok(false),
        }
    }

    /// Click edit on `row` and wait for the form to hold that row's values.
    /// `false` when the row or its control is absent, or the form never
    /// picks the row up.
    pub async fn trigger_edit(&self, row: usize) -> EsperarResult<bool> {
        let handles = self.driver().find_all(&locators::user_rows()).await?;
        let expected = match handles.get(row) {
            Some(handle) => match self.decode_row(handle).await {
                Ok(decoded) => decoded
                    .as_ref()
                    .and_then(UserRow::to_record)
                    .map(|record| FormValues::from(&record)),
                Err(e) if e.is_transient() => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        if !self.trigger(row, &locators::edit_button()).await? {
            return Ok(false);
        }
        let Some(expected) = expected else {
            debug!(row, "edited row unreadable, skipping form check");
            return Ok(true);
        };
        let populated = self
            .poller()
            .await_until("form holds edited row", self.timeout(), || {
                let expected = &expected;
                async move { Ok::<_, EsperarError>(self.form_values().await? == *expected) }
            })
            .await?;
        Ok(populated.is_found())
    }

    /// Click delete on `row`. `false` when the row or its control is absent.
    pub async fn trigger_delete(&self, row: usize) -> EsperarResult<bool> {
        self.trigger(row, &locators::delete_button()).await
    }

    // =========================================================================
    // DIALOGS AND MESSAGES
    // =========================================================================

    /// Accept a blocking dialog that opens within the grace window and
    /// return its text.
    pub async fn read_blocking_dialog_text(&self) -> EsperarResult<Option<String>> {
        self.base.blocking_dialog_text().await
    }

    /// Like [`Self::read_blocking_dialog_text`] but fails unless the dialog
    /// text contains `fragment`.
    pub async fn expect_dialog_containing(&self, fragment: &str) -> EsperarResult<String> {
        match self.read_blocking_dialog_text().await? {
            Some(text) if text.contains(fragment) => Ok(text),
            Some(text) => Err(EsperarError::assertion(format!(
                "expected dialog containing '{fragment}', observed '{text}'"
            ))),
            None => Err(EsperarError::assertion(format!(
                "expected dialog containing '{fragment}', observed no dialog"
            ))),
        }
    }

    /// Inline success message, `None` if absent
    pub async fn success_message(&self) -> EsperarResult<Option<String>> {
        self.base.text_of(&locators::success_message()).await
    }

    /// Inline error message, `None` if absent
    pub async fn error_message(&self) -> EsperarResult<Option<String>> {
        self.base.text_of(&locators::error_message()).await
    }

    /// Classify the inline message of the last operation
    pub async fn operation_result(&self) -> EsperarResult<OperationResult> {
        Ok(match self.base.text_of(&locators::message()).await? {
            Some(message) => {
                let success = message.to_lowercase().contains("success");
                OperationResult {
                    success,
                    message,
                    status_code: Some(if success { 200 } else { 400 }),
                }
            }
            None => OperationResult {
                success: false,
                message: "Operation timed out".to_string(),
                status_code: None,
            },
        })
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    /// Dispatch a mutation and wait for its terminal state.
    ///
    /// A row only counts as the outcome when the number of rows matching
    /// the record rises above its pre-dispatch value, so an identical row
    /// already on screen never settles an `Add`. An `Update` that leaves
    /// the row's values as they were settles when the form resets.
    pub async fn dispatch_and_observe(
        &self,
        mutation: &Mutation,
        timeout: Duration,
    ) -> EsperarResult<MutationOutcome> {
        let initial = self.snapshot_once().await?;
        let before = initial.len();
        let record = mutation.record();
        let matching_before = initial.count_matching(record);
        let unchanged_update = match mutation {
            Mutation::Update { row, .. } => initial.get(*row).is_some_and(|r| r.matches(record)),
            Mutation::Add(_) => false,
        };

        if let Mutation::Update { row, .. } = mutation {
            if !self.trigger_edit(*row).await? {
                return Err(EsperarError::ElementNotFound {
                    locator: format!("{} [{row}]", locators::user_rows()),
                });
            }
        }
        self.add_user(record).await?;
        debug!(email = %record.email, matching_before, "mutation dispatched");

        let driver = self.driver();
        let settled = self
            .poller()
            .await_until(&format!("row {} or dialog", record.email), timeout, move || async move {
                if driver.pending_dialog().await?.is_some() {
                    return Ok::<_, EsperarError>(true);
                }
                let observed = match self.snapshot_once().await {
                    Ok(snapshot) => snapshot.count_matching(record) > matching_before,
                    Err(EsperarError::DialogOpen { .. }) => return Ok(true),
                    Err(e) => return Err(e),
                };
                if observed || !unchanged_update {
                    return Ok(observed);
                }
                match self.is_form_cleared().await {
                    Err(EsperarError::DialogOpen { .. }) => Ok(true),
                    other => other,
                }
            })
            .await?;
        if settled.is_timed_out() {
            warn!(email = %record.email, "mutation did not settle");
            return Ok(MutationOutcome::Timeout);
        }

        if driver.pending_dialog().await?.is_some() {
            if let Some(text) = self.read_blocking_dialog_text().await? {
                let after = self.snapshot_once().await?.len();
                return Ok(MutationOutcome::DialogShown {
                    text,
                    rows_unchanged: after == before,
                });
            }
        }
        let snapshot = self.snapshot_once().await?;
        let index = match mutation {
            Mutation::Add(_) => snapshot.rows().iter().rposition(|r| r.matches(record)),
            Mutation::Update { .. } => snapshot.rows().iter().position(|r| r.matches(record)),
        };
        Ok(index.map_or(MutationOutcome::Timeout, |index| MutationOutcome::RowAppeared { index }))
    }
}

#[async_trait]
impl<'d, D: DocumentDriver + ?Sized> PageObject for UserManagementPage<'d, D> {
    fn url(&self) -> &str {
        &self.url
    }

    async fn is_loaded(&self) -> EsperarResult<bool> {
        Ok(self.is_form_present().await? && self.is_users_table_present().await?)
    }

    fn load_timeout(&self) -> Duration {
        self.timeout()
    }
}
