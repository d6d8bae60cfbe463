use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::checkout::actions::{action_stack, Progress, StepContext};
use crate::checkout::hazards::{Hazard, HazardScan};
use crate::checkout::page::CheckoutPage;
use crate::config::{PaymentDetails, PurchaseSettings};
use crate::models::{normalize, ScreeningRecord};

pub const ENTRY_VOCAB: &[&str] = &[
    "order",
    "get ticket",
    "get tickets",
    "buy ticket",
    "buy tickets",
];

const ADDITIONAL_TICKETS_PHRASE: &str = "buy additional tickets";

const ADDITIONAL_TICKETS_LABELS: &[&str] =
    &["buy additional tickets", "additional tickets", "add tickets"];

/// How long to wait for the entry click to open a new browsing context.
const ENTRY_POPUP_WAIT: Duration = Duration::from_secs(3);

const PROMPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Terminal result of one checkout attempt. Never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutOutcome {
    pub success: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CheckoutOutcome {
    fn confirmed(url: String) -> Self {
        Self {
            success: true,
            reason: Hazard::Confirmed.reason().to_string(),
            url: Some(url),
        }
    }

    fn failed(reason: impl Into<String>, url: Option<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    AwaitingEntry,
    AwaitingAdditionalPrompt,
    CheckoutStepping,
}

/// Drives a purchase attempt over an unknown multi-step checkout UI.
///
/// The required action sequence is not fixed; it is rediscovered every
/// iteration by running the full priority-ordered action list against the
/// live page. Combined with the step budget this guarantees the attempt
/// either reaches a terminal state or fails with a descriptive reason; it can
/// never hang.
pub struct CheckoutEngine<'a> {
    settings: &'a PurchaseSettings,
    payment: PaymentDetails,
    scan: HazardScan,
}

impl<'a> CheckoutEngine<'a> {
    pub fn new(settings: &'a PurchaseSettings) -> Self {
        Self {
            settings,
            payment: PaymentDetails::resolve(settings.payment.as_ref()),
            scan: HazardScan::new(),
        }
    }

    /// Run one attempt to completion. Exactly one outcome is produced; runtime
    /// errors are absorbed at this boundary rather than propagated to the
    /// monitoring loop.
    pub fn run(&self, page: &mut dyn CheckoutPage, target: &ScreeningRecord) -> CheckoutOutcome {
        let started = Instant::now();
        let outcome = match self.drive(page, target) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(title = %target.title, error = %e, "checkout attempt aborted by runtime error");
                page.capture_diagnostics("attempt-error");
                CheckoutOutcome::failed(e.to_string(), Some(page.url()))
            }
        };
        tracing::info!(
            title = %target.title,
            success = outcome.success,
            reason = %outcome.reason,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "checkout attempt finished"
        );
        outcome
    }

    fn drive(
        &self,
        page: &mut dyn CheckoutPage,
        target: &ScreeningRecord,
    ) -> Result<CheckoutOutcome> {
        let step_wait = Duration::from_millis(self.settings.step_wait_ms);

        let mut state = EngineState::AwaitingEntry;
        tracing::debug!(?state, title = %target.title, "starting checkout attempt");

        if !page.click_entry_control(&normalize(&target.title), ENTRY_VOCAB)? {
            return Ok(CheckoutOutcome::failed(
                "entry control not found",
                Some(page.url()),
            ));
        }
        if page.adopt_popup(ENTRY_POPUP_WAIT) {
            tracing::debug!("checkout continues in popup context");
        }
        page.settle(step_wait);

        state = EngineState::AwaitingAdditionalPrompt;
        tracing::debug!(?state, "entry control activated");
        self.handle_additional_prompt(page, step_wait)?;

        state = EngineState::CheckoutStepping;
        tracing::debug!(?state, max_steps = self.settings.max_steps, "stepping checkout");

        let actions = action_stack();
        let ctx = StepContext {
            settings: self.settings,
            payment: &self.payment,
            scan: &self.scan,
        };

        for step in 1..=self.settings.max_steps {
            if let Some(hazard) = self.scan.detect(page) {
                tracing::debug!(step, ?hazard, "terminal condition detected");
                return Ok(match hazard {
                    Hazard::Confirmed => CheckoutOutcome::confirmed(page.url()),
                    other => {
                        page.capture_diagnostics("hazard");
                        CheckoutOutcome::failed(other.reason(), Some(page.url()))
                    }
                });
            }

            let mut progressed = false;
            for action in &actions {
                match action.try_apply(page, &ctx)? {
                    Progress::Confirmed => {
                        tracing::debug!(step, action = action.name(), "confirmed after final purchase");
                        return Ok(CheckoutOutcome::confirmed(page.url()));
                    }
                    Progress::Acted => {
                        tracing::debug!(step, action = action.name(), "action applied");
                        progressed = true;
                        break;
                    }
                    Progress::None => {}
                }
            }

            if !progressed {
                // Nothing actionable yet; the UI may still be rendering. The
                // iteration still counts against the budget.
                tracing::trace!(step, "no actionable control this iteration");
            }
            page.settle(step_wait);
        }

        page.capture_diagnostics("budget-exhausted");
        Ok(CheckoutOutcome::failed(
            "checkout flow incomplete",
            Some(page.url()),
        ))
    }

    /// Some flows gate checkout behind a secondary "buy additional tickets"
    /// affordance that is often not a standard control. Try a content-based
    /// match first, then poll label heuristics across the wait window. Not
    /// finding it is fine: the flow may already be inside checkout.
    fn handle_additional_prompt(
        &self,
        page: &mut dyn CheckoutPage,
        step_wait: Duration,
    ) -> Result<()> {
        if page.activate_by_content(ADDITIONAL_TICKETS_PHRASE)? {
            tracing::debug!("activated additional-tickets prompt by content match");
            page.settle(step_wait);
            return Ok(());
        }

        let deadline = Instant::now() + Duration::from_millis(self.settings.prompt_wait_ms);
        while Instant::now() < deadline {
            if page.click_labeled(ADDITIONAL_TICKETS_LABELS)? {
                tracing::debug!("activated additional-tickets prompt by label match");
                page.settle(step_wait);
                return Ok(());
            }
            std::thread::sleep(PROMPT_POLL_INTERVAL);
        }

        tracing::debug!("no additional-tickets prompt; assuming checkout is already open");
        Ok(())
    }
}
