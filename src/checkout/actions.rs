use anyhow::Result;
use std::time::Duration;

use crate::checkout::hazards::HazardScan;
use crate::checkout::page::CheckoutPage;
use crate::config::{PaymentDetails, PurchaseSettings};

pub const AGREEMENT_VOCAB: &[&str] = &["agree", "terms", "conditions", "policy", "purchasing"];

pub const FINAL_PURCHASE_VOCAB: &[&str] = &[
    "complete purchase",
    "place order",
    "confirm purchase",
    "pay now",
    "submit order",
    "buy now",
    "finish",
];

pub const PAYMENT_METHOD_VOCAB: &[&str] = &[
    "VISA",
    "MASTERCARD",
    "AMEX",
    "DISCOVER",
    "ENDING",
    "CARD",
    "****",
];

pub const CONTINUE_VOCAB: &[&str] = &[
    "add to cart",
    "continue",
    "next",
    "checkout",
    "proceed",
    "review",
];

/// What a step action accomplished this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nothing applicable on the page; try the next action.
    None,
    /// An effect was produced; this iteration made progress.
    Acted,
    /// The final-purchase re-check found the confirmation page.
    Confirmed,
}

pub struct StepContext<'a> {
    pub settings: &'a PurchaseSettings,
    pub payment: &'a PaymentDetails,
    pub scan: &'a HazardScan,
}

/// One heuristic checkout step. Actions are re-run in priority order every
/// iteration, so each must be idempotent: applying it to a page it has already
/// handled reports `Progress::None`.
pub trait StepAction {
    fn name(&self) -> &'static str;
    fn try_apply(&self, page: &mut dyn CheckoutPage, ctx: &StepContext<'_>) -> Result<Progress>;
}

/// The fixed priority order: agreement → purchase/quantity/payment → continue.
/// This mirrors how checkout flows usually sequence their steps while staying
/// tolerant of flows that reorder or omit some of them.
pub fn action_stack() -> Vec<Box<dyn StepAction>> {
    vec![
        Box::new(CheckAgreements),
        Box::new(FinalPurchase),
        Box::new(SetQuantity),
        Box::new(SelectSavedPayment),
        Box::new(FillPaymentFields),
        Box::new(ContinueNext),
    ]
}

pub struct CheckAgreements;

impl StepAction for CheckAgreements {
    fn name(&self) -> &'static str {
        "check-agreements"
    }

    fn try_apply(&self, page: &mut dyn CheckoutPage, _ctx: &StepContext<'_>) -> Result<Progress> {
        let checked = page.check_agreements(AGREEMENT_VOCAB)?;
        if checked > 0 {
            tracing::debug!(checked, "checked agreement boxes");
            Ok(Progress::Acted)
        } else {
            Ok(Progress::None)
        }
    }
}

pub struct FinalPurchase;

impl StepAction for FinalPurchase {
    fn name(&self) -> &'static str {
        "final-purchase"
    }

    fn try_apply(&self, page: &mut dyn CheckoutPage, ctx: &StepContext<'_>) -> Result<Progress> {
        if !page.click_labeled(FINAL_PURCHASE_VOCAB)? {
            return Ok(Progress::None);
        }
        // The purchase may land immediately; re-check before burning another
        // iteration on it.
        page.settle(Duration::from_millis(ctx.settings.step_wait_ms));
        if ctx.scan.confirmed(page) {
            Ok(Progress::Confirmed)
        } else {
            Ok(Progress::Acted)
        }
    }
}

pub struct SetQuantity;

impl StepAction for SetQuantity {
    fn name(&self) -> &'static str {
        "set-quantity"
    }

    fn try_apply(&self, page: &mut dyn CheckoutPage, ctx: &StepContext<'_>) -> Result<Progress> {
        let desired = ctx.settings.ticket_quantity;
        match page.set_quantity(desired)? {
            Some(applied) => {
                if applied < desired {
                    tracing::warn!(desired, applied, "degraded ticket quantity to what the page offers");
                }
                Ok(Progress::Acted)
            }
            None => Ok(Progress::None),
        }
    }
}

pub struct SelectSavedPayment;

impl StepAction for SelectSavedPayment {
    fn name(&self) -> &'static str {
        "select-saved-payment"
    }

    fn try_apply(&self, page: &mut dyn CheckoutPage, _ctx: &StepContext<'_>) -> Result<Progress> {
        if page.select_saved_payment(PAYMENT_METHOD_VOCAB)? {
            Ok(Progress::Acted)
        } else {
            Ok(Progress::None)
        }
    }
}

pub struct FillPaymentFields;

impl StepAction for FillPaymentFields {
    fn name(&self) -> &'static str {
        "fill-payment-fields"
    }

    fn try_apply(&self, page: &mut dyn CheckoutPage, ctx: &StepContext<'_>) -> Result<Progress> {
        if ctx.payment.is_empty() {
            return Ok(Progress::None);
        }
        let filled = page.fill_payment_fields(ctx.payment)?;
        if filled > 0 {
            tracing::debug!(filled, "filled payment fields");
            Ok(Progress::Acted)
        } else {
            Ok(Progress::None)
        }
    }
}

pub struct ContinueNext;

impl StepAction for ContinueNext {
    fn name(&self) -> &'static str {
        "continue"
    }

    fn try_apply(&self, page: &mut dyn CheckoutPage, _ctx: &StepContext<'_>) -> Result<Progress> {
        if page.click_labeled(CONTINUE_VOCAB)? {
            Ok(Progress::Acted)
        } else {
            Ok(Progress::None)
        }
    }
}
