//! Backend API collaborator.
//!
//! The users table is a view over `GET {api_url}/users`. [`UsersApi`]
//! fetches that list so a test can compare what the page rendered with
//! what the server holds, and [`cross_check`] does the comparison.
//!
//! The server is inconsistent about age: it may send `30`, `"30"`, or the
//! rendered label `"30 Year's"`. All three decode to the same record.

use crate::record::{parse_age_label, TableSnapshot, UserRecord};
use crate::result::{EsperarError, EsperarResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Request timeout for API calls
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// One user as the API returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUser {
    /// Server id, when the payload carries one
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Display name
    pub name: String,
    /// Unique key
    pub email: String,
    /// Age in years
    #[serde(deserialize_with = "deserialize_age")]
    pub age: u32,
}

impl ApiUser {
    /// Domain record for this user
    #[must_use]
    pub fn to_record(&self) -> UserRecord {
        UserRecord::new(self.name.clone(), self.email.clone(), self.age)
    }
}

fn deserialize_age<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAge {
        Number(u32),
        Text(String),
    }

    match RawAge::deserialize(deserializer)? {
        RawAge::Number(n) => Ok(n),
        RawAge::Text(text) => text
            .trim()
            .parse()
            .ok()
            .or_else(|| parse_age_label(&text))
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized age '{text}'"))),
    }
}

/// HTTP client for the users endpoint
#[derive(Debug, Clone)]
pub struct UsersApi {
    base_url: String,
    client: reqwest::Client,
}

impl UsersApi {
    /// Client for an API root such as `http://localhost:3000/api`
    pub fn new(api_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_API_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Client for the API configured in `config`
    pub fn from_config(config: &crate::config::HarnessConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    /// API root
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {api_url}/users`
    pub async fn list_users(&self) -> EsperarResult<Vec<ApiUser>> {
        let url = format!("{}/users", self.base_url);
        debug!(url = %url, "fetching users");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| api_error(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(format!("GET {url} returned {status}: {body}")));
        }

        let users: Vec<ApiUser> = response
            .json()
            .await
            .map_err(|e| api_error(format!("decoding users from {url}: {e}")))?;
        info!(count = users.len(), "fetched users from API");
        Ok(users)
    }

    /// The user stored under `email`, if any
    pub async fn find_user(&self, email: &str) -> EsperarResult<Option<ApiUser>> {
        Ok(self
            .list_users()
            .await?
            .into_iter()
            .find(|u| u.email == email))
    }
}

fn api_error(message: String) -> EsperarError {
    EsperarError::Api { message }
}

/// A field that differs between the table and the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// Email of the user
    pub email: String,
    /// Field name (`name` or `age`)
    pub field: String,
    /// Value shown in the table
    pub ui: String,
    /// Value stored by the API
    pub api: String,
}

/// Outcome of comparing the table with the API, keyed by email
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Emails present and identical on both sides
    pub matched: Vec<String>,
    /// Present on both sides with differing fields
    pub mismatched: Vec<FieldMismatch>,
    /// In the table only
    pub missing_in_api: Vec<String>,
    /// In the API only
    pub missing_in_ui: Vec<String>,
}

impl ConsistencyReport {
    /// Both sides agree completely
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mismatched.is_empty() && self.missing_in_api.is_empty() && self.missing_in_ui.is_empty()
    }

    /// Fail with a description of every difference
    pub fn assert_consistent(&self) -> EsperarResult<()> {
        if self.is_consistent() {
            return Ok(());
        }
        let mut problems = Vec::new();
        for m in &self.mismatched {
            problems.push(format!(
                "{} {}: table '{}' vs api '{}'",
                m.email, m.field, m.ui, m.api
            ));
        }
        for email in &self.missing_in_api {
            problems.push(format!("{email} missing from API"));
        }
        for email in &self.missing_in_ui {
            problems.push(format!("{email} missing from table"));
        }
        Err(EsperarError::assertion(format!(
            "table and API disagree: {}",
            problems.join("; ")
        )))
    }
}

/// Compare a table snapshot with the API's user list by email.
///
/// Age compares as the rendered label, so `30` on the server matches
/// `"30 Year's"` in the table.
#[must_use]
pub fn cross_check(snapshot: &TableSnapshot, api_users: &[ApiUser]) -> ConsistencyReport {
    let by_email: HashMap<&str, &ApiUser> =
        api_users.iter().map(|u| (u.email.as_str(), u)).collect();
    let mut report = ConsistencyReport::default();

    for row in snapshot {
        let Some(api) = by_email.get(row.email.as_str()) else {
            report.missing_in_api.push(row.email.clone());
            continue;
        };
        let expected = api.to_record();
        let mut clean = true;
        if row.name != expected.name {
            clean = false;
            report.mismatched.push(FieldMismatch {
                email: row.email.clone(),
                field: "name".to_string(),
                ui: row.name.clone(),
                api: expected.name.clone(),
            });
        }
        if row.age_label != expected.age_label() {
            clean = false;
            report.mismatched.push(FieldMismatch {
                email: row.email.clone(),
                field: "age".to_string(),
                ui: row.age_label.clone(),
                api: expected.age_label(),
            });
        }
        if clean {
            report.matched.push(row.email.clone());
        }
    }

    for user in api_users {
        if snapshot.find_by_email(&user.email).is_none() {
            report.missing_in_ui.push(user.email.clone());
        }
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::UserRow;

    fn row(id: &str, name: &str, email: &str, age: &str) -> UserRow {
        UserRow::from_cells(&[id, name, email, age]).unwrap()
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_age_as_number() {
            let user: ApiUser =
                serde_json::from_str(r#"{"name":"John Doe","email":"john.doe@test.com","age":30}"#)
                    .unwrap();
            assert_eq!(user.age, 30);
            assert!(user.id.is_none());
        }

        #[test]
        fn test_age_as_numeric_string() {
            let user: ApiUser =
                serde_json::from_str(r#"{"name":"A","email":"a@x.io","age":" 41 "}"#).unwrap();
            assert_eq!(user.age, 41);
        }

        #[test]
        fn test_age_as_rendered_label() {
            let user: ApiUser = serde_json::from_str(
                r#"{"_id":"65f0","name":"A","email":"a@x.io","age":"30 Year's"}"#,
            )
            .unwrap();
            assert_eq!(user.age, 30);
            assert_eq!(user.id, Some(serde_json::json!("65f0")));
        }

        #[test]
        fn test_age_garbage_rejected() {
            let result: Result<ApiUser, _> =
                serde_json::from_str(r#"{"name":"A","email":"a@x.io","age":"old"}"#);
            assert!(result.is_err());
        }

        #[test]
        fn test_base_url_trailing_slash_trimmed() {
            let api = UsersApi::new("http://localhost:3000/api/");
            assert_eq!(api.base_url(), "http://localhost:3000/api");
        }
    }

    mod cross_check_tests {
        use super::*;

        fn api_user(name: &str, email: &str, age: u32) -> ApiUser {
            ApiUser {
                id: None,
                name: name.to_string(),
                email: email.to_string(),
                age,
            }
        }

        #[test]
        fn test_identical_sides_consistent() {
            let snapshot = TableSnapshot::new(vec![row("1", "John Doe", "john.doe@test.com", "30 Year's")]);
            let report = cross_check(&snapshot, &[api_user("John Doe", "john.doe@test.com", 30)]);
            assert!(report.is_consistent());
            assert_eq!(report.matched, vec!["john.doe@test.com".to_string()]);
            assert!(report.assert_consistent().is_ok());
        }

        #[test]
        fn test_age_mismatch_reported() {
            let snapshot = TableSnapshot::new(vec![row("1", "John Doe", "john.doe@test.com", "30 Year's")]);
            let report = cross_check(&snapshot, &[api_user("John Doe", "john.doe@test.com", 31)]);
            assert!(!report.is_consistent());
            assert_eq!(report.mismatched.len(), 1);
            assert_eq!(report.mismatched[0].field, "age");
            assert_eq!(report.mismatched[0].api, "31 Year's");
        }

        #[test]
        fn test_missing_on_either_side() {
            let snapshot = TableSnapshot::new(vec![row("1", "Only Ui", "ui@x.io", "20 Year's")]);
            let report = cross_check(&snapshot, &[api_user("Only Api", "api@x.io", 20)]);
            assert_eq!(report.missing_in_api, vec!["ui@x.io".to_string()]);
            assert_eq!(report.missing_in_ui, vec!["api@x.io".to_string()]);
            let err = report.assert_consistent().unwrap_err().to_string();
            assert!(err.contains("ui@x.io missing from API"));
            assert!(err.contains("api@x.io missing from table"));
        }

        #[test]
        fn test_empty_sides_consistent() {
            assert!(cross_check(&TableSnapshot::default(), &[]).is_consistent());
        }
    }
}
