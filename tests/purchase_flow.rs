// End-to-end purchase flow: a sold-out screening opens up, the differ flags
// it, the matcher resolves a rule, and the engine walks a scripted checkout
// UI to confirmation.

use anyhow::Result;
use std::time::Duration;

use rushline::checkout::{CheckoutEngine, CheckoutPage};
use rushline::config::{FilmRule, PaymentDetails, PurchaseConfig, PurchaseSettings};
use rushline::models::{ChangeKind, ScheduleSnapshot, ScreeningRecord, TicketStatus};
use rushline::{differ, matcher, ChangeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Schedule,
    Checkout,
    Queue,
    Confirmed,
}

/// Scripted three-stage checkout UI: schedule → checkout (agreement box plus
/// a final-purchase control) → confirmation. Optionally detours to a waiting
/// room instead of checkout.
struct ScriptedCheckout {
    stage: Stage,
    agreement_checked: bool,
    queue_on_entry: bool,
}

impl ScriptedCheckout {
    fn new() -> Self {
        Self {
            stage: Stage::Schedule,
            agreement_checked: false,
            queue_on_entry: false,
        }
    }

    fn with_queue() -> Self {
        Self {
            queue_on_entry: true,
            ..Self::new()
        }
    }
}

impl CheckoutPage for ScriptedCheckout {
    fn url(&self) -> String {
        match self.stage {
            Stage::Schedule => "https://fest.example/schedule".to_string(),
            Stage::Checkout => "https://fest.example/checkout/tickets".to_string(),
            Stage::Queue => "https://fest.example/waiting-room".to_string(),
            Stage::Confirmed => "https://fest.example/checkout/confirmation".to_string(),
        }
    }

    fn body_text(&self) -> String {
        match self.stage {
            Stage::Schedule => "Festival schedule".to_string(),
            Stage::Checkout => "Review your tickets and agree to the terms".to_string(),
            Stage::Queue => "You are in line. Please wait.".to_string(),
            Stage::Confirmed => "Thank you for your order. Order number: 4242".to_string(),
        }
    }

    fn dialog_text(&self) -> Option<String> {
        None
    }

    fn has_password_field(&self) -> bool {
        false
    }

    fn click_entry_control(&mut self, title: &str, _vocab: &[&str]) -> Result<bool> {
        if self.stage == Stage::Schedule && "mirror".contains(title) {
            self.stage = if self.queue_on_entry {
                Stage::Queue
            } else {
                Stage::Checkout
            };
            return Ok(true);
        }
        Ok(false)
    }

    fn adopt_popup(&mut self, _within: Duration) -> bool {
        false
    }

    fn activate_by_content(&mut self, _phrase: &str) -> Result<bool> {
        Ok(false)
    }

    fn click_labeled(&mut self, vocab: &[&str]) -> Result<bool> {
        let control = "complete purchase";
        if self.stage == Stage::Checkout
            && self.agreement_checked
            && vocab.iter().any(|phrase| control.contains(phrase))
        {
            self.stage = Stage::Confirmed;
            return Ok(true);
        }
        Ok(false)
    }

    fn check_agreements(&mut self, _vocab: &[&str]) -> Result<u32> {
        if self.stage == Stage::Checkout && !self.agreement_checked {
            self.agreement_checked = true;
            return Ok(1);
        }
        Ok(0)
    }

    fn set_quantity(&mut self, _desired: u32) -> Result<Option<u32>> {
        Ok(None)
    }

    fn select_saved_payment(&mut self, _vocab: &[&str]) -> Result<bool> {
        Ok(false)
    }

    fn fill_payment_fields(&mut self, _payment: &PaymentDetails) -> Result<u32> {
        Ok(0)
    }

    fn settle(&mut self, _wait: Duration) {}
}

fn quick_settings() -> PurchaseSettings {
    PurchaseSettings {
        step_wait_ms: 0,
        prompt_wait_ms: 0,
        ..Default::default()
    }
}

fn snapshot_with(status: TicketStatus) -> ScheduleSnapshot {
    vec![ScreeningRecord::new(
        "Mirror",
        "Oct 12 9:30 PM",
        status,
        if status == TicketStatus::Available {
            "Order Tickets"
        } else {
            "Sold Out"
        },
        "https://fest.example/s/mirror",
    )]
    .into_iter()
    .collect()
}

fn rules() -> PurchaseConfig {
    PurchaseConfig {
        enabled: true,
        films: vec![FilmRule {
            title: "Mirror".to_string(),
            screening_time: Some("Oct 12 9:30 PM".to_string()),
            auto_purchase: true,
        }],
        settings: quick_settings(),
    }
}

#[tokio::test]
async fn test_sold_out_to_available_triggers_confirmed_purchase() {
    let previous = snapshot_with(TicketStatus::SoldOut);
    let current = snapshot_with(TicketStatus::Available);

    // 1. The differ surfaces exactly one NOW_AVAILABLE event.
    let events = differ::diff(&previous, &current);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::NowAvailable);

    // 2. The matcher resolves the exact-time rule for it.
    let config = rules();
    let event = &events[0];
    assert!(matcher::should_auto_purchase(
        &event.title,
        &event.screening_time,
        &config
    ));

    // 3. The engine drives the scripted UI to confirmation.
    let record = current.get("mirror_oct 12 9:30 pm").unwrap();
    let engine = CheckoutEngine::new(&config.settings);
    let mut page = ScriptedCheckout::new();
    let outcome = engine.run(&mut page, record);

    assert!(outcome.success);
    assert_eq!(outcome.reason, "purchase confirmed");
    assert_eq!(
        outcome.url.as_deref(),
        Some("https://fest.example/checkout/confirmation")
    );

    // 4. The synthesized purchase event is what the notifier would receive.
    let update = ChangeEvent::purchase(record, outcome.success, &outcome.reason, outcome.url.as_deref());
    assert_eq!(update.kind, ChangeKind::PurchaseSuccess);
    assert_eq!(update.detail.as_deref(), Some("purchase confirmed"));
}

#[tokio::test]
async fn test_queue_detour_fails_with_classified_reason() {
    let config = rules();
    let current = snapshot_with(TicketStatus::Available);
    let record = current.get("mirror_oct 12 9:30 pm").unwrap();

    let engine = CheckoutEngine::new(&config.settings);
    let mut page = ScriptedCheckout::with_queue();
    let outcome = engine.run(&mut page, record);

    assert!(!outcome.success);
    assert_eq!(outcome.reason, "queue/waiting room encountered");

    let update = ChangeEvent::purchase(record, outcome.success, &outcome.reason, outcome.url.as_deref());
    assert_eq!(update.kind, ChangeKind::PurchaseFailed);
    assert_eq!(update.url, "https://fest.example/waiting-room");
}

#[tokio::test]
async fn test_rule_for_other_screening_time_never_fires() {
    let previous = snapshot_with(TicketStatus::SoldOut);
    let current = snapshot_with(TicketStatus::Available);
    let events = differ::diff(&previous, &current);

    let mut config = rules();
    config.films[0].screening_time = Some("Oct 14 5:00 PM".to_string());

    let event = &events[0];
    assert!(!matcher::should_auto_purchase(
        &event.title,
        &event.screening_time,
        &config
    ));
}

#[tokio::test]
async fn test_unmatched_available_screening_only_notifies() {
    let events = differ::diff(&ScheduleSnapshot::new(), &snapshot_with(TicketStatus::Available));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::NewAvailable);

    // No rules configured: event flows to notifiers, engine never runs.
    let config = PurchaseConfig {
        enabled: true,
        films: vec![],
        settings: quick_settings(),
    };
    assert!(!matcher::should_auto_purchase(
        &events[0].title,
        &events[0].screening_time,
        &config
    ));
}
