//! Property: any valid submission shows up as exactly one matching row,
//! whatever the render latency and however many rows were already there.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{fast_config, SETTLE};
use esperar::prelude::*;
use proptest::prelude::*;

// ===== Strategy definitions =====

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,8}( [A-Z][a-z]{1,8})?"
}

fn email_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}\\.[a-z]{1,8}@[a-z]{2,6}\\.(io|com)"
}

fn record_strategy() -> impl Strategy<Value = UserRecord> {
    (name_strategy(), email_strategy(), 1u32..=120).prop_map(|(n, e, a)| UserRecord::new(n, e, a))
}

/// Pre-existing users on a domain the generated emails never use
fn seed_users(count: usize) -> Vec<UserRecord> {
    (0..count)
        .map(|i| UserRecord::new(format!("Seed {i}"), format!("seed{i}@fixture.invalid"), 20))
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_added_user_appears_once(
        record in record_strategy(),
        seeds in 0usize..4,
        delay in 0u64..5,
    ) {
        let (outcome, before, after) = runtime().block_on(async {
            let doc = MockDocument::new()
                .with_render_delay(delay)
                .with_users(seed_users(seeds));
            let config = fast_config();
            let page = UserManagementPage::new(&doc, &config);
            let before = page.read_table().await.unwrap();
            let outcome = page
                .dispatch_and_observe(&Mutation::Add(record.clone()), SETTLE)
                .await
                .unwrap();
            let after = page.read_table().await.unwrap();
            (outcome, before, after)
        });

        prop_assert_eq!(outcome, MutationOutcome::RowAppeared { index: seeds });
        prop_assert_eq!(after.len(), before.len() + 1);
        prop_assert_eq!(after.count_matching(&record), 1);
        prop_assert_eq!(after.get(seeds).unwrap().age_label.clone(), record.age_label());
    }

    #[test]
    fn prop_age_label_parses_back(age in 0u32..100_000) {
        let record = UserRecord::new("A", "a@x.io", age);
        prop_assert_eq!(parse_age_label(&record.age_label()), Some(age));
    }
}
