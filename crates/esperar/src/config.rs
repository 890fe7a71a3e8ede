//! Harness configuration.
//!
//! Resolution order: built-in defaults, then a YAML file, then `ESPERAR_*`
//! environment variables. Later sources override earlier ones.

use crate::result::{EsperarError, EsperarResult};
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default frontend URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

/// Default backend API root
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Default grace window for a blocking dialog to show up (1 second)
pub const DEFAULT_DIALOG_GRACE_MS: u64 = 1_000;

/// Prefix of every recognised environment variable
pub const ENV_PREFIX: &str = "ESPERAR_";

/// Wait timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default timeout for polling primitives
    pub default_ms: u64,
    /// Delay between polls
    pub poll_interval_ms: u64,
    /// How long to look for a blocking dialog after an action
    pub dialog_grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            dialog_grace_ms: DEFAULT_DIALOG_GRACE_MS,
        }
    }
}

impl TimeoutConfig {
    /// Polling options derived from these timings
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.default_ms)
            .with_poll_interval(self.poll_interval_ms)
    }

    /// Default timeout as Duration
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }

    /// Dialog grace window as Duration
    #[must_use]
    pub const fn dialog_grace(&self) -> Duration {
        Duration::from_millis(self.dialog_grace_ms)
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Viewport width
    pub window_width: u32,
    /// Viewport height
    pub window_height: u32,
    /// Chromium sandbox (off in containers)
    pub sandbox: bool,
    /// Explicit Chromium binary, otherwise auto-detected
    pub chromium_path: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            sandbox: false,
            chromium_path: None,
        }
    }
}

/// Everything a test run needs to reach the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Frontend URL the page object opens
    pub base_url: String,
    /// Backend API root used for cross-checks
    pub api_url: String,
    /// Wait timing
    pub timeouts: TimeoutConfig,
    /// Browser launch settings
    pub browser: BrowserSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeouts: TimeoutConfig::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl HarnessConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> EsperarResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> EsperarResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Defaults, then `path` if it exists, then the process environment.
    pub fn load(path: Option<&Path>) -> EsperarResult<Self> {
        let base = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        base.with_env_overrides(std::env::vars())
    }

    /// Apply `ESPERAR_*` overrides from a variable list.
    ///
    /// Recognised: `BASE_URL`, `API_URL`, `TIMEOUT_MS`, `POLL_INTERVAL_MS`,
    /// `DIALOG_GRACE_MS`, `HEADLESS`, `CHROMIUM_PATH`. Others are ignored.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> EsperarResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match key {
                "BASE_URL" => self.base_url = value.to_string(),
                "API_URL" => self.api_url = value.to_string(),
                "TIMEOUT_MS" => self.timeouts.default_ms = parse_env(key, value)?,
                "POLL_INTERVAL_MS" => self.timeouts.poll_interval_ms = parse_env(key, value)?,
                "DIALOG_GRACE_MS" => self.timeouts.dialog_grace_ms = parse_env(key, value)?,
                "HEADLESS" => self.browser.headless = parse_bool(key, value)?,
                "CHROMIUM_PATH" => self.browser.chromium_path = Some(value.to_string()),
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Check URLs and timings
    pub fn validate(&self) -> EsperarResult<()> {
        for (field, url) in [("base_url", &self.base_url), ("api_url", &self.api_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EsperarError::config(format!(
                    "{field} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.timeouts.default_ms == 0 {
            return Err(EsperarError::config("timeouts.default_ms must be > 0"));
        }
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(EsperarError::config("browser window must be non-empty"));
        }
        Ok(())
    }

    /// `{api_url}/users`
    #[must_use]
    pub fn users_endpoint(&self) -> String {
        format!("{}/users", self.api_url.trim_end_matches('/'))
    }

    /// Set the frontend URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API root
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the default wait timeout
    #[must_use]
    pub const fn with_default_timeout(mut self, ms: u64) -> Self {
        self.timeouts.default_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.timeouts.poll_interval_ms = ms;
        self
    }

    /// Set the dialog grace window
    #[must_use]
    pub const fn with_dialog_grace(mut self, ms: u64) -> Self {
        self.timeouts.dialog_grace_ms = ms;
        self
    }

    /// Toggle headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }
}

fn parse_env(key: &str, value: &str) -> EsperarResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| EsperarError::config(format!("{ENV_PREFIX}{key}: expected integer, got '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> EsperarResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EsperarError::config(format!(
            "{ENV_PREFIX}{key}: expected boolean, got '{value}'"
        ))),
    }
}
