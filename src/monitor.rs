use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::browser::BrowserSession;
use crate::checkout::{CheckoutEngine, CheckoutOutcome, ChromePage};
use crate::config::{AppConfig, PurchaseConfig};
use crate::differ;
use crate::extractor::ScheduleExtractor;
use crate::matcher;
use crate::models::{ChangeEvent, ChangeKind, ScheduleSnapshot, ScreeningRecord};
use crate::notify::NotifierSet;
use crate::state_store::StateStore;

/// Orchestrates extraction → diff → notification → matcher → engine on a
/// fixed interval, forever. Owns the primary browsing context; purchase
/// attempts borrow it (or a popup derived from it) one at a time and hand it
/// back before monitoring resumes.
pub struct Monitor {
    config: AppConfig,
    session: BrowserSession,
    extractor: ScheduleExtractor,
    store: StateStore,
    notifiers: NotifierSet,
    previous: ScheduleSnapshot,
}

impl Monitor {
    pub fn new(config: AppConfig, session: BrowserSession) -> Self {
        let store = StateStore::new(&config.watcher.state_file);
        let previous = store.load();
        let notifiers = NotifierSet::from_config(&config.notifications);
        Self {
            config,
            session,
            extractor: ScheduleExtractor::new(),
            store,
            notifiers,
            previous,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = interval(Duration::from_secs(self.config.watcher.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            url = %self.config.watcher.schedule_url,
            interval_secs = self.config.watcher.poll_interval_secs,
            known_screenings = self.previous.len(),
            "monitoring started"
        );

        loop {
            ticker.tick().await;
            if let Err(e) = self.cycle().await {
                // The cycle is abandoned but its state is untouched; the next
                // tick starts from the last good snapshot.
                tracing::error!(error = %e, "monitoring cycle failed; retrying next interval");
            }
        }
    }

    /// Run a single cycle and return. Used by the --once CLI mode.
    pub async fn run_once(&mut self) -> Result<()> {
        self.cycle().await
    }

    async fn cycle(&mut self) -> Result<()> {
        // Rules are re-read every cycle so edits apply without a restart, and
        // stay fixed for the duration of the cycle.
        let purchase_config = match PurchaseConfig::load(&self.config.watcher.rules_file) {
            Ok(config) => config.filter(PurchaseConfig::is_active),
            Err(e) => {
                tracing::warn!(error = %e, "purchase rules unreadable; skipping auto-purchase this cycle");
                None
            }
        };

        let html = self
            .session
            .fetch_schedule(&self.config.watcher.schedule_url)
            .await?;
        let current = self.extractor.extract(&html, &self.config.watcher.schedule_url);

        // An empty extraction after a non-empty one is a failed render, not a
        // cleared schedule; persisting it would replay every screening as new
        // once the page recovers.
        if current.is_empty() && !self.previous.is_empty() {
            tracing::warn!("schedule page yielded no screenings; keeping previous snapshot");
            return Ok(());
        }

        let events = differ::diff(&self.previous, &current);
        tracing::info!(
            screenings = current.len(),
            changes = events.len(),
            "cycle complete"
        );

        for event in &events {
            tracing::info!(kind = ?event.kind, title = %event.title, time = %event.screening_time, "availability change");
            self.notifiers.dispatch(event).await;
        }

        if let Some(purchase) = &purchase_config {
            self.handle_purchases(&events, purchase).await;
        }

        self.store.save(&current)?;
        self.previous = current;
        Ok(())
    }

    /// Purchase attempts are strictly sequential: the checkout flow occupies
    /// the shared browsing context, so concurrency would race on page state.
    async fn handle_purchases(&self, events: &[ChangeEvent], purchase: &PurchaseConfig) {
        for event in purchasable_events(events, purchase) {
            let record = ScreeningRecord::new(
                event.title.clone(),
                event.screening_time.clone(),
                event.status,
                event.button_text.clone(),
                event.url.clone(),
            );

            tracing::info!(title = %record.title, time = %record.screening_time, "starting auto-purchase attempt");
            let outcome = self.attempt_purchase(&record, purchase);

            if purchase.settings.notify_on_purchase_updates {
                let update = ChangeEvent::purchase(
                    &record,
                    outcome.success,
                    &outcome.reason,
                    outcome.url.as_deref(),
                );
                self.notifiers.dispatch(&update).await;
            }

            // Hand the context back to monitoring before the next attempt.
            if let Err(e) = self
                .session
                .fetch_schedule(&self.config.watcher.schedule_url)
                .await
            {
                tracing::warn!(error = %e, "failed to return to schedule view after attempt");
            }
        }
    }

    fn attempt_purchase(&self, record: &ScreeningRecord, purchase: &PurchaseConfig) -> CheckoutOutcome {
        let screenshot_dir = purchase
            .settings
            .debug_screenshots
            .then(|| PathBuf::from(&self.config.screenshots.dir));
        let mut page = ChromePage::new(self.session.browser(), self.session.tab(), screenshot_dir);
        let engine = CheckoutEngine::new(&purchase.settings);
        engine.run(&mut page, record)
    }
}

/// Change events that should trigger an attempt: newly-available screenings
/// covered by a rule with auto-purchase enabled.
fn purchasable_events<'a>(
    events: &'a [ChangeEvent],
    purchase: &PurchaseConfig,
) -> Vec<&'a ChangeEvent> {
    events
        .iter()
        .filter(|e| matches!(e.kind, ChangeKind::NewAvailable | ChangeKind::NowAvailable))
        .filter(|e| matcher::should_auto_purchase(&e.title, &e.screening_time, purchase))
        .collect()
}
