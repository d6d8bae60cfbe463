use serde::{Deserialize, Serialize};

use crate::models::{ChangeKind, ScreeningRecord, TicketStatus};

/// A notification-worthy transition derived from two snapshots, or the
/// terminal outcome of a purchase attempt. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub title: String,
    pub screening_time: String,
    pub status: TicketStatus,
    pub button_text: String,
    pub url: String,
    /// Human-readable reason for purchase outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChangeEvent {
    pub fn availability(kind: ChangeKind, record: &ScreeningRecord) -> Self {
        Self {
            kind,
            title: record.title.clone(),
            screening_time: record.screening_time.clone(),
            status: record.status,
            button_text: record.button_text.clone(),
            url: record.url.clone(),
            detail: None,
        }
    }

    /// Synthesized record for the notification side channel after a checkout
    /// attempt finishes.
    pub fn purchase(record: &ScreeningRecord, success: bool, reason: &str, url: Option<&str>) -> Self {
        Self {
            kind: if success {
                ChangeKind::PurchaseSuccess
            } else {
                ChangeKind::PurchaseFailed
            },
            title: record.title.clone(),
            screening_time: record.screening_time.clone(),
            status: record.status,
            button_text: record.button_text.clone(),
            url: url.unwrap_or(record.url.as_str()).to_string(),
            detail: Some(reason.to_string()),
        }
    }

    pub fn headline(&self) -> String {
        match self.kind {
            ChangeKind::NewAvailable => format!("New screening available: {}", self.title),
            ChangeKind::NowAvailable => format!("Tickets now available: {}", self.title),
            ChangeKind::PurchaseSuccess => format!("Purchase confirmed: {}", self.title),
            ChangeKind::PurchaseFailed => format!("Purchase failed: {}", self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ScreeningRecord {
        ScreeningRecord::new(
            "Mirror",
            "9:30 PM",
            TicketStatus::Available,
            "Order Tickets",
            "https://fest.example/s/2",
        )
    }

    #[test]
    fn test_availability_event_copies_record_fields() {
        let event = ChangeEvent::availability(ChangeKind::NowAvailable, &sample_record());
        assert_eq!(event.kind, ChangeKind::NowAvailable);
        assert_eq!(event.title, "Mirror");
        assert_eq!(event.screening_time, "9:30 PM");
        assert_eq!(event.detail, None);
    }

    #[test]
    fn test_purchase_event_carries_reason_and_final_url() {
        let event = ChangeEvent::purchase(
            &sample_record(),
            false,
            "queue/waiting room encountered",
            Some("https://fest.example/queue"),
        );
        assert_eq!(event.kind, ChangeKind::PurchaseFailed);
        assert_eq!(event.detail.as_deref(), Some("queue/waiting room encountered"));
        assert_eq!(event.url, "https://fest.example/queue");
    }

    #[test]
    fn test_purchase_event_falls_back_to_record_url() {
        let event = ChangeEvent::purchase(&sample_record(), true, "purchase confirmed", None);
        assert_eq!(event.kind, ChangeKind::PurchaseSuccess);
        assert_eq!(event.url, "https://fest.example/s/2");
    }

    #[test]
    fn test_headlines() {
        let record = sample_record();
        let event = ChangeEvent::availability(ChangeKind::NewAvailable, &record);
        assert_eq!(event.headline(), "New screening available: Mirror");
        let event = ChangeEvent::purchase(&record, true, "purchase confirmed", None);
        assert_eq!(event.headline(), "Purchase confirmed: Mirror");
    }
}
