//! End-to-end scenarios for the user management page against the
//! in-memory document.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{
    duplicate_email_user, fast_config, init_tracing, updated_user, valid_user, BRIEF, SETTLE,
};
use esperar::prelude::*;
use esperar::users::locators;
use std::time::{Duration, Instant};

// ===== Add =====

#[tokio::test]
async fn test_add_john_doe_renders_age_label_and_clears_form() {
    init_tracing();
    let doc = MockDocument::new().with_render_delay(3).with_ready_after(2);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    page.open().await.unwrap();
    assert_eq!(page.title().await.unwrap(), APP_TITLE);

    page.submit_new_user("John Doe", "john.doe@test.com", "30")
        .await
        .unwrap();
    assert!(page
        .wait_until_row_appears("john.doe@test.com", SETTLE)
        .await
        .unwrap());

    let snapshot = page.read_table().await.unwrap();
    let index = snapshot.find_by_email("john.doe@test.com").unwrap();
    let row = snapshot.get(index).unwrap();
    assert_eq!(row.name, "John Doe");
    assert_eq!(row.age_label, "30 Year's");
    assert_eq!(row.age_years(), Some(30));
    assert!(page.is_form_cleared().await.unwrap());
    assert_eq!(
        page.success_message().await.unwrap().as_deref(),
        Some("User added successfully")
    );
}

#[tokio::test]
async fn test_add_yields_exactly_one_matching_row() {
    init_tracing();
    let doc = MockDocument::new()
        .with_render_delay(2)
        .with_users(vec![UserRecord::new("Ann", "ann@x.io", 41)]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);

    let outcome = page
        .dispatch_and_observe(&Mutation::Add(valid_user()), SETTLE)
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::RowAppeared { index: 1 });

    let snapshot = page.read_table().await.unwrap();
    assert_eq!(snapshot.count_matching(&valid_user()), 1);
    assert_eq!(snapshot.len(), 2);
}

#[tokio::test]
async fn test_invalid_submit_shows_missing_fields_dialog() {
    init_tracing();
    let doc = MockDocument::new();
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);

    let outcome = page
        .dispatch_and_observe(&Mutation::Add(UserRecord::new("", "invalid-email", 150)), SETTLE)
        .await
        .unwrap();
    match outcome {
        MutationOutcome::DialogShown {
            text,
            rows_unchanged,
        } => {
            assert_eq!(text, ALERT_MISSING_FIELDS);
            assert!(rows_unchanged);
        }
        other => panic!("expected dialog, got {other:?}"),
    }
    assert!(page.read_table_within(BRIEF).await.unwrap().is_empty());
    assert_eq!(doc.dialog_log().count(), 1);
}

#[tokio::test]
async fn test_age_input_drops_non_digits() {
    let doc = MockDocument::new();
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    page.fill_user_form("Ann", "ann@x.io", "4x1").await.unwrap();
    assert_eq!(page.form_values().await.unwrap().age, "41");
}

// ===== Duplicate email =====

#[tokio::test]
async fn test_duplicate_email_leaves_table_unchanged_and_reports_dialog() {
    init_tracing();
    let doc = MockDocument::new()
        .with_render_delay(2)
        .with_users(vec![valid_user()]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    let before = page.read_table().await.unwrap();

    let outcome = page
        .dispatch_and_observe(&Mutation::Add(duplicate_email_user()), SETTLE)
        .await
        .unwrap();
    match outcome {
        MutationOutcome::DialogShown {
            text,
            rows_unchanged,
        } => {
            assert!(!text.is_empty());
            assert!(text.contains("Email already exists"));
            assert!(rows_unchanged);
        }
        other => panic!("expected dialog, got {other:?}"),
    }

    let after = page.read_table().await.unwrap();
    assert_eq!(after.len(), before.len());
    assert_eq!(after.count_matching(&duplicate_email_user()), 0);
}

#[tokio::test]
async fn test_resubmitting_identical_user_reports_dialog() {
    init_tracing();
    let doc = MockDocument::new()
        .with_render_delay(10)
        .with_users(vec![valid_user()]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);

    let outcome = page
        .dispatch_and_observe(&Mutation::Add(valid_user()), SETTLE)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MutationOutcome::DialogShown {
            text: "Email already exists".to_string(),
            rows_unchanged: true,
        }
    );

    // Nothing left blocking the page.
    assert_eq!(page.read_blocking_dialog_text().await.unwrap(), None);
    let handled = doc.dialog_log();
    assert_eq!(handled.count(), 1);
    assert_eq!(handled.last().unwrap().message(), "Email already exists");
    let after = page.read_table().await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after.count_matching(&valid_user()), 1);
}

// ===== Read =====

#[tokio::test]
async fn test_read_table_is_idempotent() {
    let doc = MockDocument::new().with_users(vec![valid_user(), updated_user()]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    let first = page.read_table().await.unwrap();
    let second = page.read_table().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.records(), vec![valid_user(), updated_user()]);
}

#[tokio::test]
async fn test_await_all_on_empty_table_is_found_empty() {
    let doc = MockDocument::new();
    let poller = PollingLocator::new(&doc);
    let started = Instant::now();
    let rows = poller
        .await_all(&locators::user_rows(), BRIEF)
        .await
        .unwrap();
    assert_eq!(rows, WaitResult::Found(vec![]));
    assert!(started.elapsed() >= BRIEF);
}

#[tokio::test]
async fn test_rows_inserted_by_another_client_are_observed() {
    let doc = MockDocument::new().with_render_delay(4);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    doc.schedule_insert(UserRecord::new("Other", "other@x.io", 50));
    assert!(page.wait_until_row_appears("other@x.io", SETTLE).await.unwrap());
    assert!(page.is_user_in_table("Other", "other@x.io").await.unwrap());
}

// ===== Edit =====

#[tokio::test]
async fn test_edit_round_trip() {
    init_tracing();
    let doc = MockDocument::new()
        .with_render_delay(2)
        .with_users(vec![valid_user()]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);

    let outcome = page
        .dispatch_and_observe(
            &Mutation::Update {
                row: 0,
                record: updated_user(),
            },
            SETTLE,
        )
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::RowAppeared { index: 0 });

    let snapshot = page.read_table().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.find_by_email(&valid_user().email).is_none());
    assert_eq!(snapshot.get(0).unwrap().age_label, "31 Year's");
    assert_eq!(
        page.submit_button_text().await.unwrap().as_deref(),
        Some(ADD_LABEL)
    );
    assert_eq!(
        page.success_message().await.unwrap().as_deref(),
        Some("User updated successfully")
    );
}

#[tokio::test]
async fn test_add_then_edit_then_resubmit_replaces_row() {
    init_tracing();
    let doc = MockDocument::new().with_render_delay(3);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    let (first, second) = (valid_user(), updated_user());

    page.add_user(&first).await.unwrap();
    assert!(page.wait_until_row_appears(&first.email, SETTLE).await.unwrap());
    let row = page.find_row_by_email(&first.email).await.unwrap().unwrap();

    assert!(page.trigger_edit(row).await.unwrap());
    assert_eq!(page.form_values().await.unwrap(), FormValues::from(&first));

    page.submit_new_user(&second.name, &second.email, &second.age.to_string())
        .await
        .unwrap();
    assert!(page.wait_until_row_appears(&second.email, SETTLE).await.unwrap());
    assert_eq!(page.find_row_by_email(&first.email).await.unwrap(), None);
    assert_eq!(page.read_table().await.unwrap().records(), vec![second]);
}

#[tokio::test]
async fn test_update_of_missing_row_is_not_found() {
    let doc = MockDocument::new();
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    let err = page
        .dispatch_and_observe(
            &Mutation::Update {
                row: 2,
                record: updated_user(),
            },
            SETTLE,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EsperarError::ElementNotFound { .. }));
}

// ===== Delete =====

#[tokio::test]
async fn test_delete_round_trip() {
    init_tracing();
    let doc = MockDocument::new()
        .with_render_delay(3)
        .with_users(vec![valid_user(), UserRecord::new("Ann", "ann@x.io", 41)]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);

    let index = page
        .find_row_by_email(&valid_user().email)
        .await
        .unwrap()
        .unwrap();
    assert!(page.trigger_delete(index).await.unwrap());
    assert!(page
        .wait_until_row_disappears(&valid_user().email, SETTLE)
        .await
        .unwrap());

    let snapshot = page.read_table().await.unwrap();
    assert!(snapshot.find_by_email(&valid_user().email).is_none());
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        page.success_message().await.unwrap().as_deref(),
        Some("User deleted successfully")
    );
}

#[tokio::test]
async fn test_add_then_delete_removes_row() {
    let doc = MockDocument::new().with_render_delay(3);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);

    page.add_user(&valid_user()).await.unwrap();
    assert!(page
        .wait_until_row_appears(&valid_user().email, SETTLE)
        .await
        .unwrap());
    let row = page
        .find_row_by_email(&valid_user().email)
        .await
        .unwrap()
        .unwrap();
    assert!(page.trigger_delete(row).await.unwrap());
    assert!(page
        .wait_until_row_disappears(&valid_user().email, SETTLE)
        .await
        .unwrap());
    assert_eq!(page.find_row_by_email(&valid_user().email).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_absent_row_reports_false() {
    let doc = MockDocument::new();
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    assert!(!page.trigger_delete(0).await.unwrap());
}

// ===== Failure modes =====

#[tokio::test]
async fn test_lost_session_is_an_error_not_a_timeout() {
    let doc = MockDocument::new().with_users(vec![valid_user()]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    doc.lose_session();
    let err = page.read_table().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_hung_driver_is_bounded_by_deadline() {
    let doc = MockDocument::new().with_hanging_queries();
    let poller = PollingLocator::new(&doc);
    let started = Instant::now();
    let found = poller
        .await_presence(&locators::name_input(), BRIEF)
        .await
        .unwrap();
    assert!(found.is_timed_out());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_page_object_contract() {
    let doc = MockDocument::new();
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    assert_eq!(page.url(), config.base_url);
    assert!(page.is_loaded().await.unwrap());
    assert_eq!(page.load_timeout(), Duration::from_millis(400));
}
