use regex::Regex;

use crate::checkout::page::CheckoutPage;

/// A page condition that terminates the attempt. Variants are ordered by
/// detection precedence; when several indicators are present at once the
/// first match in this order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    Queue,
    LoginRequired,
    Confirmed,
    ModalError,
}

impl Hazard {
    pub fn reason(&self) -> &'static str {
        match self {
            Hazard::Queue => "queue/waiting room encountered",
            Hazard::LoginRequired => "login required during checkout",
            Hazard::Confirmed => "purchase confirmed",
            Hazard::ModalError => "checkout error in modal",
        }
    }
}

const QUEUE_TEXT: &[&str] = &[
    "waiting room",
    "you are in line",
    "you're in line",
    "virtual queue",
    "in the queue",
];

const LOGIN_TEXT: &[&str] = &[
    "sign in to continue",
    "log in to continue",
    "please sign in",
    "please log in",
    "session expired",
];

const CONFIRMATION_TEXT: &[&str] = &[
    "purchase confirmed",
    "order confirmed",
    "your order is complete",
    "thank you for your order",
    "confirmation number",
    "order number",
];

const MODAL_ERROR_TEXT: &[&str] = &[
    "error",
    "failed",
    "unable",
    "problem",
    "could not",
    "sold out",
];

pub struct HazardScan {
    queue_url: Regex,
    login_url: Regex,
    confirmation_url: Regex,
}

impl Default for HazardScan {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardScan {
    pub fn new() -> Self {
        Self {
            queue_url: Regex::new(r"(?i)queue|waiting[-_]?room").expect("queue url pattern"),
            login_url: Regex::new(r"(?i)log[-_]?in|sign[-_]?in|authenticate|/auth(/|$|\?)")
                .expect("login url pattern"),
            confirmation_url: Regex::new(
                r"(?i)confirmation|confirmed|order[-_]?complete|receipt|thank[-_]?you",
            )
            .expect("confirmation url pattern"),
        }
    }

    /// Run the hazard checks in their fixed order. Queue and login checks run
    /// before confirmation so a contradictory page resolves deterministically.
    pub fn detect(&self, page: &dyn CheckoutPage) -> Option<Hazard> {
        let url = page.url();
        let body = page.body_text().to_lowercase();

        if self.queue_url.is_match(&url) || contains_any(&body, QUEUE_TEXT) {
            return Some(Hazard::Queue);
        }

        if self.login_url.is_match(&url)
            || page.has_password_field()
            || contains_any(&body, LOGIN_TEXT)
        {
            return Some(Hazard::LoginRequired);
        }

        if self.confirmation_url.is_match(&url) || contains_any(&body, CONFIRMATION_TEXT) {
            return Some(Hazard::Confirmed);
        }

        // Blocking errors only count inside a modal container; matching the
        // background page would trip on unrelated text.
        if let Some(dialog) = page.dialog_text() {
            if contains_any(&dialog.to_lowercase(), MODAL_ERROR_TEXT) {
                return Some(Hazard::ModalError);
            }
        }

        None
    }

    /// Confirmation-only re-check used right after the final-purchase control
    /// is activated.
    pub fn confirmed(&self, page: &dyn CheckoutPage) -> bool {
        let url = page.url();
        let body = page.body_text().to_lowercase();
        self.confirmation_url.is_match(&url) || contains_any(&body, CONFIRMATION_TEXT)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
