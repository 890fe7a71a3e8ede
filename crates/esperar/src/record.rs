//! User records and the table row schema.
//!
//! The users table renders one `<tr>` per record with four cells, in
//! order: id, name, email, age. Age carries a unit suffix (`"30 Year's"`).
//! Rows decode by field name through [`UserRow::from_cells`] and fail
//! closed: anything that does not fit the schema is `None`, never a panic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Unit label the application appends to the age cell
pub const AGE_SUFFIX: &str = " Year's";

/// Number of cells in a well-formed row
pub const ROW_CELLS: usize = 4;

fn age_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(\d+)\s*Year's\s*$").ok())
        .as_ref()
}

/// Years out of a rendered age label such as `"30 Year's"`
#[must_use]
pub fn parse_age_label(label: &str) -> Option<u32> {
    age_pattern()?
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A user as the application stores it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRecord {
    /// Display name
    pub name: String,
    /// Unique key
    pub email: String,
    /// Age in years
    pub age: u32,
}

impl UserRecord {
    /// Create a new record
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: u32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            age,
        }
    }

    /// Age as the table renders it
    #[must_use]
    pub fn age_label(&self) -> String {
        format!("{}{AGE_SUFFIX}", self.age)
    }
}

/// One decoded table row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRow {
    /// Server-assigned id (first cell)
    pub id: String,
    /// Name cell
    pub name: String,
    /// Email cell
    pub email: String,
    /// Age cell verbatim, e.g. `"30 Year's"`
    pub age_label: String,
}

impl UserRow {
    /// Decode cell texts into a row. Extra trailing cells (the action
    /// column) are ignored; fewer than [`ROW_CELLS`] is malformed.
    #[must_use]
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        match cells {
            [id, name, email, age, ..] => Some(Self {
                id: id.as_ref().trim().to_string(),
                name: name.as_ref().trim().to_string(),
                email: email.as_ref().trim().to_string(),
                age_label: age.as_ref().trim().to_string(),
            }),
            _ => None,
        }
    }

    /// Age with the unit suffix stripped
    #[must_use]
    pub fn age_years(&self) -> Option<u32> {
        parse_age_label(&self.age_label)
    }

    /// Back to a domain record, if the age cell parses
    #[must_use]
    pub fn to_record(&self) -> Option<UserRecord> {
        Some(UserRecord::new(
            self.name.clone(),
            self.email.clone(),
            self.age_years()?,
        ))
    }

    /// All three user fields match
    #[must_use]
    pub fn matches(&self, record: &UserRecord) -> bool {
        self.name == record.name
            && self.email == record.email
            && self.age_label == record.age_label()
    }
}

/// Rows read from the table at one instant.
///
/// Never refreshed in place. Read a new one after every action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    rows: Vec<UserRow>,
}

impl TableSnapshot {
    /// Wrap decoded rows
    #[must_use]
    pub fn new(rows: Vec<UserRow>) -> Self {
        Self { rows }
    }

    /// Rows in document order
    #[must_use]
    pub fn rows(&self) -> &[UserRow] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&UserRow> {
        self.rows.get(index)
    }

    /// Index of the first row with this email
    #[must_use]
    pub fn find_by_email(&self, email: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.email == email)
    }

    /// Whether any row shows this name and email
    #[must_use]
    pub fn contains_user(&self, name: &str, email: &str) -> bool {
        self.rows.iter().any(|r| r.name == name && r.email == email)
    }

    /// Rows matching every field of `record`
    #[must_use]
    pub fn count_matching(&self, record: &UserRecord) -> usize {
        self.rows.iter().filter(|r| r.matches(record)).count()
    }

    /// Rows that decode back into records
    #[must_use]
    pub fn records(&self) -> Vec<UserRecord> {
        self.rows.iter().filter_map(UserRow::to_record).collect()
    }

    /// Iterate rows
    pub fn iter(&self) -> std::slice::Iter<'_, UserRow> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a TableSnapshot {
    type Item = &'a UserRow;
    type IntoIter = std::slice::Iter<'a, UserRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
