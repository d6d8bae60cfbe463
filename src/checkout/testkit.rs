//! Scripted page double for engine and action tests.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::time::Duration;

use crate::checkout::page::CheckoutPage;
use crate::config::PaymentDetails;
use crate::models::normalize;

/// In-memory stand-in for a checkout page. Fields describe what the "page"
/// currently offers; effectful calls consume those affordances and append to
/// `log`, so tests can assert both outcomes and the path taken.
pub struct FakePage {
    pub url: String,
    pub body: String,
    pub dialog: Option<String>,
    pub password_field: bool,

    /// Row texts that carry an entry control.
    pub entry_rows: Vec<String>,
    pub popup_on_entry: bool,

    pub agreement_boxes: u32,
    pub quantity_options: Vec<u32>,
    pub quantity_set: Option<u32>,
    /// Clickable control labels currently on the page; a click consumes one.
    pub labels: Vec<String>,
    /// Body text to swap in after a given label is clicked.
    pub after_click: HashMap<String, String>,
    pub saved_payment_label: Option<String>,
    pub saved_payment_selected: bool,
    pub payment_fields: u32,

    /// Make label clicks fail like a dead CDP connection.
    pub fail_clicks: bool,

    pub settle_count: u32,
    pub log: Vec<String>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self {
            url: "https://fest.example/checkout".to_string(),
            body: String::new(),
            dialog: None,
            password_field: false,
            entry_rows: Vec::new(),
            popup_on_entry: false,
            agreement_boxes: 0,
            quantity_options: Vec::new(),
            quantity_set: None,
            labels: Vec::new(),
            after_click: HashMap::new(),
            saved_payment_label: None,
            saved_payment_selected: false,
            payment_fields: 0,
            fail_clicks: false,
            settle_count: 0,
            log: Vec::new(),
        }
    }
}

impl CheckoutPage for FakePage {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn body_text(&self) -> String {
        self.body.clone()
    }

    fn dialog_text(&self) -> Option<String> {
        self.dialog.clone()
    }

    fn has_password_field(&self) -> bool {
        self.password_field
    }

    fn click_entry_control(&mut self, title: &str, _vocab: &[&str]) -> Result<bool> {
        if self.entry_rows.iter().any(|row| normalize(row).contains(title)) {
            self.log.push(format!("entry:{}", title));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn adopt_popup(&mut self, _within: Duration) -> bool {
        if self.popup_on_entry {
            self.popup_on_entry = false;
            self.log.push("adopt-popup".to_string());
            true
        } else {
            false
        }
    }

    fn activate_by_content(&mut self, phrase: &str) -> Result<bool> {
        if self.body.to_lowercase().contains(&phrase.to_lowercase()) {
            self.log.push(format!("activate:{}", phrase));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn click_labeled(&mut self, vocab: &[&str]) -> Result<bool> {
        if self.fail_clicks {
            return Err(anyhow!("tab crashed"));
        }
        let position = self.labels.iter().position(|label| {
            let label = label.to_lowercase();
            vocab.iter().any(|phrase| label.contains(phrase))
        });
        match position {
            Some(pos) => {
                let label = self.labels.remove(pos);
                self.log.push(format!("click:{}", label));
                if let Some(next_body) = self.after_click.remove(&label) {
                    self.body = next_body;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn check_agreements(&mut self, _vocab: &[&str]) -> Result<u32> {
        let checked = self.agreement_boxes;
        self.agreement_boxes = 0;
        if checked > 0 {
            self.log.push(format!("agreements:{}", checked));
        }
        Ok(checked)
    }

    fn set_quantity(&mut self, desired: u32) -> Result<Option<u32>> {
        let pick = self
            .quantity_options
            .iter()
            .copied()
            .filter(|&offered| offered <= desired)
            .max();
        match pick {
            Some(pick) if self.quantity_set != Some(pick) => {
                self.quantity_set = Some(pick);
                self.log.push(format!("quantity:{}", pick));
                Ok(Some(pick))
            }
            _ => Ok(None),
        }
    }

    fn select_saved_payment(&mut self, vocab: &[&str]) -> Result<bool> {
        let Some(label) = &self.saved_payment_label else {
            return Ok(false);
        };
        if self.saved_payment_selected {
            return Ok(false);
        }
        let label = label.to_uppercase();
        if vocab.iter().any(|phrase| label.contains(phrase)) {
            self.saved_payment_selected = true;
            self.log.push("saved-payment".to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn fill_payment_fields(&mut self, _payment: &PaymentDetails) -> Result<u32> {
        let filled = self.payment_fields;
        self.payment_fields = 0;
        if filled > 0 {
            self.log.push(format!("payment-fields:{}", filled));
        }
        Ok(filled)
    }

    fn settle(&mut self, _wait: Duration) {
        self.settle_count += 1;
    }

    fn capture_diagnostics(&mut self, tag: &str) {
        self.log.push(format!("diagnostics:{}", tag));
    }
}
