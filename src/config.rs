use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use url::Url;
use validator::Validate;

/// Environment variable prefix for both app-config overrides and payment
/// fallbacks.
pub const ENV_PREFIX: &str = "RUSHLINE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub watcher: WatcherConfig,
    pub browser: BrowserConfig,
    pub notifications: NotificationsConfig,
    pub screenshots: ScreenshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Schedule page to poll.
    pub schedule_url: String,
    pub poll_interval_secs: u64,
    pub state_file: String,
    /// Purchase-rules JSON; absence disables auto-purchase entirely.
    pub rules_file: String,
    /// Session cookies JSON; absence means an anonymous session.
    pub cookies_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub nav_timeout_secs: u64,
    pub nav_retries: u32,
    pub nav_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    pub dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_sources("config/default", "config/local")
    }

    pub fn from_sources(default_path: &str, local_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(default_path))
            // Local overrides, ignored by git
            .add_source(File::with_name(local_path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.watcher.schedule_url).is_err() {
            return Err(ConfigError::Message("Invalid schedule URL".into()));
        }

        if self.watcher.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "watcher.poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.watcher.state_file.is_empty() {
            return Err(ConfigError::Message("watcher.state_file must be set".into()));
        }

        if self.browser.nav_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "browser.nav_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.notifications.smtp.enabled {
            if self.notifications.smtp.port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
            if self.notifications.smtp.to_address.is_none() {
                return Err(ConfigError::Message(
                    "SMTP notifications enabled but no to_address configured".into(),
                ));
            }
        }

        if let Some(url) = &self.notifications.webhook.url {
            if Url::parse(url).is_err() {
                return Err(ConfigError::Message("Invalid webhook URL".into()));
            }
        }

        Ok(())
    }
}

fn default_max_steps() -> u32 {
    12
}

fn default_step_wait_ms() -> u64 {
    1500
}

fn default_prompt_wait_ms() -> u64 {
    15_000
}

fn default_quantity() -> u32 {
    1
}

/// One user-declared watch rule. A rule with an explicit screening time only
/// covers that exact screening; a rule without one covers any screening of the
/// title, but only as a fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilmRule {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening_time: Option<String>,
    pub auto_purchase: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSettings {
    #[validate(range(min = 1, message = "ticketQuantity must be at least 1"))]
    #[serde(default = "default_quantity")]
    pub ticket_quantity: u32,
    #[serde(default)]
    pub notify_on_purchase_updates: bool,
    #[serde(default)]
    pub debug_screenshots: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_step_wait_ms")]
    pub step_wait_ms: u64,
    #[serde(default = "default_prompt_wait_ms")]
    pub prompt_wait_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDetails>,
}

impl Default for PurchaseSettings {
    fn default() -> Self {
        Self {
            ticket_quantity: default_quantity(),
            notify_on_purchase_updates: false,
            debug_screenshots: false,
            max_steps: default_max_steps(),
            step_wait_ms: default_step_wait_ms(),
            prompt_wait_ms: default_prompt_wait_ms(),
            payment: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseConfig {
    pub enabled: bool,
    #[serde(default)]
    pub films: Vec<FilmRule>,
    #[serde(default)]
    pub settings: PurchaseSettings,
}

impl PurchaseConfig {
    /// Read the purchase-rules file. A missing file is not an error: it means
    /// auto-purchase is simply not configured.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        let config: PurchaseConfig = serde_json::from_str(&raw)?;
        config.settings.validate()?;
        Ok(Some(config))
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }
}

/// Card details for the payment-filling step. Every field may instead come
/// from the environment, so secrets never have to live in the rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl PaymentDetails {
    /// Overlay environment-sourced values onto whatever the rules file
    /// declares. Config wins field-by-field; env fills the gaps.
    pub fn resolve(configured: Option<&PaymentDetails>) -> PaymentDetails {
        let from_env = |suffix: &str| env::var(format!("{}_CARD_{}", ENV_PREFIX, suffix)).ok();
        let base = configured.cloned().unwrap_or_default();
        PaymentDetails {
            card_number: base.card_number.or_else(|| from_env("NUMBER")),
            exp: base.exp.or_else(|| from_env("EXP")),
            cvc: base.cvc.or_else(|| from_env("CVC")),
            name: base.name.or_else(|| from_env("NAME")),
            zip: base.zip.or_else(|| from_env("ZIP")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.card_number.is_none()
            && self.exp.is_none()
            && self.cvc.is_none()
            && self.name.is_none()
            && self.zip.is_none()
    }
}
