use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::models::{ChangeEvent, ChangeKind};
use crate::notify::Notifier;
use crate::utils::error::AppError;

pub struct EmailNotifier {
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn subject(event: &ChangeEvent) -> String {
        match event.kind {
            ChangeKind::NewAvailable => format!("🎟 New screening: {}", event.title),
            ChangeKind::NowAvailable => format!("🎟 Tickets open: {}", event.title),
            ChangeKind::PurchaseSuccess => format!("✅ Purchased: {}", event.title),
            ChangeKind::PurchaseFailed => format!("⚠️ Purchase failed: {}", event.title),
        }
    }

    fn body(event: &ChangeEvent) -> String {
        let mut body = format!("{}\n\n", event.headline());
        if !event.screening_time.is_empty() {
            body.push_str(&format!("Screening: {}\n", event.screening_time));
        }
        if let Some(detail) = &event.detail {
            body.push_str(&format!("Detail: {}\n", detail));
        }
        body.push_str(&format!("Link: {}\n", event.url));
        body
    }

    fn build_message(&self, event: &ChangeEvent) -> Result<Message, AppError> {
        let to = self.config.to_address.as_deref().ok_or_else(|| {
            AppError::Notification {
                notifier: "email".to_string(),
                message: "no to_address configured".to_string(),
            }
        })?;
        let from_address = self
            .config
            .from_address
            .as_deref()
            .unwrap_or("rushline@localhost");
        let from = format!("{} <{}>", self.config.from_name, from_address);

        Message::builder()
            .from(from.parse().map_err(|e| AppError::Notification {
                notifier: "email".to_string(),
                message: format!("invalid from address: {}", e),
            })?)
            .to(to.parse().map_err(|e| AppError::Notification {
                notifier: "email".to_string(),
                message: format!("invalid to address: {}", e),
            })?)
            .subject(Self::subject(event))
            .header(ContentType::TEXT_PLAIN)
            .body(Self::body(event))
            .map_err(|e| AppError::Notification {
                notifier: "email".to_string(),
                message: format!("failed to build message: {}", e),
            })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<(), AppError> {
        let message = self.build_message(event)?;

        let mut builder =
            SmtpTransport::relay(&self.config.host).map_err(|e| AppError::Notification {
                notifier: "email".to_string(),
                message: format!("smtp relay setup failed: {}", e),
            })?;
        builder = builder.port(self.config.port);
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        builder
            .build()
            .send(&message)
            .map_err(|e| AppError::Notification {
                notifier: "email".to_string(),
                message: format!("send failed: {}", e),
            })?;
        Ok(())
    }
}
