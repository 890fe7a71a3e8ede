//! Page-blocking dialogs (alert, confirm, prompt, beforeunload).
//!
//! Some mutation paths report errors through a modal dialog instead of an
//! in-page message. While one is open the page accepts no other commands,
//! so drivers surface it through [`crate::DocumentDriver::pending_dialog`].

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// An open (or previously handled) browser dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    dialog_type: DialogType,
    message: String,
    default_value: Option<String>,
}

impl Dialog {
    /// Create a new dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            default_value: None,
        }
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    /// Create a prompt dialog carrying the page's default answer
    #[must_use]
    pub fn prompt(message: impl Into<String>, default: Option<String>) -> Self {
        let mut dialog = Self::new(DialogType::Prompt, message);
        dialog.default_value = default;
        dialog
    }

    /// Get dialog type
    #[must_use]
    pub const fn dialog_type(&self) -> DialogType {
        self.dialog_type
    }

    /// Get dialog message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get default value (for prompts)
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }
}

/// Shared history of dialogs a driver has accepted.
#[derive(Debug, Clone, Default)]
pub struct DialogLog {
    handled: Arc<Mutex<Vec<Dialog>>>,
}

impl DialogLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handled dialog
    pub fn record(&self, dialog: Dialog) {
        if let Ok(mut d) = self.handled.lock() {
            d.push(dialog);
        }
    }

    /// Number of handled dialogs
    #[must_use]
    pub fn count(&self) -> usize {
        self.handled.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Most recently handled dialog
    #[must_use]
    pub fn last(&self) -> Option<Dialog> {
        self.handled.lock().ok().and_then(|d| d.last().cloned())
    }
}
