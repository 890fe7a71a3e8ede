//! Shared fixtures for the integration suites

#![allow(dead_code)]

use esperar::{HarnessConfig, UserRecord};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Route `tracing` output through the test harness. Quiet unless `RUST_LOG` is set.
pub fn init_tracing() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(filter)
            .try_init();
    });
}

/// Harness tuned for the in-memory document: short waits, tight polling
pub fn fast_config() -> HarnessConfig {
    HarnessConfig::new()
        .with_default_timeout(400)
        .with_poll_interval(5)
        .with_dialog_grace(150)
}

/// Generous bound for waits that are expected to succeed
pub const SETTLE: Duration = Duration::from_secs(2);

/// Short bound for waits that are expected to time out
pub const BRIEF: Duration = Duration::from_millis(60);

pub fn valid_user() -> UserRecord {
    UserRecord::new("John Doe", "john.doe@test.com", 30)
}

pub fn updated_user() -> UserRecord {
    UserRecord::new("John Updated", "john.updated@test.com", 31)
}

pub fn duplicate_email_user() -> UserRecord {
    UserRecord::new("Jane Doe", "john.doe@test.com", 25)
}
