use async_trait::async_trait;
use serde_json::json;

use crate::models::ChangeEvent;
use crate::notify::Notifier;
use crate::utils::error::AppError;

/// Posts change events to a webhook (Discord-compatible payload shape).
pub struct WebhookNotifier {
    url: String,
    username: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, username: String) -> Self {
        Self {
            url,
            username,
            client: reqwest::Client::new(),
        }
    }

    fn payload(&self, event: &ChangeEvent) -> serde_json::Value {
        let mut content = event.headline();
        if !event.screening_time.is_empty() {
            content.push_str(&format!(" — {}", event.screening_time));
        }
        if let Some(detail) = &event.detail {
            content.push_str(&format!("\n{}", detail));
        }
        content.push_str(&format!("\n{}", event.url));

        json!({
            "username": self.username,
            "content": content,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(event))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeKind, ScreeningRecord, TicketStatus};

    fn record() -> ScreeningRecord {
        ScreeningRecord::new(
            "Mirror",
            "Oct 12 9:30 PM",
            TicketStatus::Available,
            "Order Tickets",
            "https://fest.example/s/2",
        )
    }

    #[test]
    fn test_payload_shape() {
        let notifier = WebhookNotifier::new(
            "https://hooks.example/abc".to_string(),
            "Rushline".to_string(),
        );
        let event = ChangeEvent::availability(ChangeKind::NowAvailable, &record());
        let payload = notifier.payload(&event);

        assert_eq!(payload["username"], "Rushline");
        let content = payload["content"].as_str().unwrap();
        assert!(content.contains("Tickets now available: Mirror"));
        assert!(content.contains("Oct 12 9:30 PM"));
        assert!(content.contains("https://fest.example/s/2"));
    }

    #[test]
    fn test_payload_includes_purchase_detail() {
        let notifier = WebhookNotifier::new(
            "https://hooks.example/abc".to_string(),
            "Rushline".to_string(),
        );
        let event = ChangeEvent::purchase(&record(), true, "purchase confirmed", None);
        let content = notifier.payload(&event)["content"].as_str().unwrap().to_string();
        assert!(content.contains("Purchase confirmed: Mirror"));
        assert!(content.contains("purchase confirmed"));
    }
}
