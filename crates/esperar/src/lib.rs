//! Esperar: deterministic UI-state polling for end-to-end tests
//!
//! Esperar (Spanish: "to wait") turns an asynchronously rendered remote
//! document into test steps that either observe the expected state within
//! a bound or report that they did not. No fixed sleeps.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ESPERAR Architecture                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │   ┌──────────────┐    ┌────────────────┐    ┌────────────┐   │
//! │   │ Page model   │    │ PollingLocator │    │ Document   │   │
//! │   │ (users form, │───►│ (bounded polls,│───►│ Driver     │   │
//! │   │  table)      │    │  WaitResult)   │    │ (mock/CDP) │   │
//! │   └──────────────┘    └────────────────┘    └────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use esperar::prelude::*;
//!
//! # async fn demo() -> EsperarResult<()> {
//! let doc = MockDocument::new().with_render_delay(2);
//! let config = HarnessConfig::default();
//! let page = UserManagementPage::new(&doc, &config);
//! page.open().await?;
//! page.submit_new_user("John Doe", "john.doe@test.com", "30").await?;
//! assert!(page.wait_until_row_appears("john.doe@test.com", config.timeouts.default_timeout()).await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

#[cfg(feature = "api")]
pub mod api;
pub mod browser;
mod config;
mod dialog;
mod driver;
mod locator;
mod mock;
#[allow(clippy::missing_errors_doc)]
mod page_object;
mod record;
mod result;
mod session;
#[allow(clippy::missing_errors_doc)]
pub mod users;
mod wait;

#[cfg(feature = "api")]
pub use api::{cross_check, ApiUser, ConsistencyReport, FieldMismatch, UsersApi};
#[cfg(feature = "browser")]
pub use browser::ChromiumDocument;
pub use config::{
    BrowserSettings, HarnessConfig, TimeoutConfig, DEFAULT_API_URL, DEFAULT_BASE_URL,
    DEFAULT_DIALOG_GRACE_MS, ENV_PREFIX,
};
pub use dialog::{Dialog, DialogLog, DialogType};
pub use driver::{DocumentDriver, ElementHandle, ElementId, ReadyState};
pub use locator::{Locator, Selector};
pub use mock::{MockDocument, ALERT_DUPLICATE_EMAIL, ALERT_MISSING_FIELDS, APP_TITLE};
pub use page_object::{BasePage, PageObject};
pub use record::{parse_age_label, TableSnapshot, UserRecord, UserRow, AGE_SUFFIX, ROW_CELLS};
pub use result::{EsperarError, EsperarResult};
pub use session::Session;
pub use users::{
    FormValues, Mutation, MutationOutcome, OperationResult, UserManagementPage, ADD_LABEL,
    UPDATE_LABEL,
};
pub use wait::{
    poll_for, ElementCount, ElementVisible, PollingLocator, ReadyStateComplete, TitleContains,
    WaitCondition, WaitOptions, WaitResult, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
    MAX_WAIT_TIMEOUT, MIN_POLL_INTERVAL_MS,
};

/// Everything a test body usually needs
pub mod prelude {
    #[cfg(feature = "api")]
    pub use super::api::*;
    #[cfg(feature = "browser")]
    pub use super::browser::ChromiumDocument;
    pub use super::config::*;
    pub use super::dialog::*;
    pub use super::driver::*;
    pub use super::locator::*;
    pub use super::mock::*;
    pub use super::page_object::*;
    pub use super::record::*;
    pub use super::result::*;
    pub use super::session::*;
    pub use super::users::*;
    pub use super::wait::*;
}
