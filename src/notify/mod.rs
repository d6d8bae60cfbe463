use async_trait::async_trait;

use crate::config::NotificationsConfig;
use crate::models::ChangeEvent;
use crate::utils::error::AppError;

pub mod email;
pub mod webhook;

pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

/// Delivery channel for change events. Implementations own their transport
/// config; the monitoring loop only hands them events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn notify(&self, event: &ChangeEvent) -> Result<(), AppError>;
}

/// Fan-out dispatcher. Delivery failures are logged and swallowed: a broken
/// SMTP server must never take the watcher down or mask other channels.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut set = Self::new();

        if config.smtp.enabled {
            set.push(Box::new(EmailNotifier::new(config.smtp.clone())));
        }
        if let Some(url) = &config.webhook.url {
            set.push(Box::new(WebhookNotifier::new(
                url.clone(),
                config.webhook.username.clone(),
            )));
        }

        if set.is_empty() {
            tracing::info!("no notification channels configured");
        }
        set
    }

    pub fn push(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub async fn dispatch(&self, event: &ChangeEvent) {
        for notifier in &self.notifiers {
            match notifier.notify(event).await {
                Ok(()) => {
                    tracing::debug!(notifier = notifier.name(), kind = ?event.kind, "notification delivered");
                }
                Err(e) => {
                    tracing::warn!(notifier = notifier.name(), error = %e, "notification delivery failed");
                }
            }
        }
    }
}
