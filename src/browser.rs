use anyhow::{anyhow, Result};
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use crate::config::BrowserConfig;

/// Session identifier injected into the browser before the first navigation.
/// The watcher treats these as opaque; how they were obtained is the user's
/// business.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

pub fn load_cookies(path: impl AsRef<Path>) -> Result<Vec<SessionCookie>> {
    let raw = std::fs::read_to_string(path.as_ref())
        .map_err(|e| anyhow!("failed to read cookie file {}: {}", path.as_ref().display(), e))?;
    let cookies: Vec<SessionCookie> = serde_json::from_str(&raw)?;
    Ok(cookies)
}

fn to_cookie_param(cookie: SessionCookie) -> Result<CookieParam> {
    // Built through serde so protocol fields we don't set keep their
    // defaults regardless of CDP revision.
    let param = serde_json::from_value(serde_json::json!({
        "name": cookie.name,
        "value": cookie.value,
        "domain": cookie.domain,
        "path": cookie.path,
        "secure": cookie.secure,
        "httpOnly": cookie.http_only,
        "expires": cookie.expires,
    }))?;
    Ok(param)
}

/// One long-lived Chrome session shared by monitoring and purchase attempts.
pub struct BrowserSession {
    browser: Arc<Browser>,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl BrowserSession {
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-background-timer-throttling"),
                std::ffi::OsStr::new("--disable-backgrounding-occluded-windows"),
                std::ffi::OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser =
            Browser::new(launch_options).map_err(|e| anyhow!("Failed to launch browser: {}", e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| anyhow!("Failed to create tab: {}", e))?;
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| anyhow!("Failed to set user agent: {}", e))?;

        Ok(Self {
            browser: Arc::new(browser),
            tab,
            config,
        })
    }

    pub fn browser(&self) -> Arc<Browser> {
        Arc::clone(&self.browser)
    }

    pub fn tab(&self) -> Arc<Tab> {
        Arc::clone(&self.tab)
    }

    /// Inject session cookies into the browsing context. Must happen before
    /// the first schedule navigation for authenticated schedules to render.
    pub fn inject_cookies(&self, cookies: Vec<SessionCookie>) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let count = cookies.len();
        let params: Vec<CookieParam> = cookies
            .into_iter()
            .map(to_cookie_param)
            .collect::<Result<_>>()?;
        self.tab
            .set_cookies(params)
            .map_err(|e| anyhow!("Failed to set cookies: {}", e))?;
        tracing::info!(count, "injected session cookies");
        Ok(())
    }

    /// Navigate the primary tab to the schedule page, retrying transient
    /// failures on a fixed interval, and return the rendered HTML.
    pub async fn fetch_schedule(&self, url: &str) -> Result<String> {
        let strategy = FixedInterval::from_millis(self.config.nav_retry_delay_ms)
            .take(self.config.nav_retries as usize);
        Retry::spawn(strategy, || async { self.navigate_once(url) }).await
    }

    fn navigate_once(&self, url: &str) -> Result<String> {
        self.tab
            .navigate_to(url)
            .map_err(|e| anyhow!("Navigation failed: {}", e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| anyhow!("Page load failed: {}", e))?;
        self.tab
            .get_content()
            .map_err(|e| anyhow!("Failed to get page content: {}", e))
    }
}
