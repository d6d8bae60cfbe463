use anyhow::{anyhow, Result};
use headless_chrome::{Browser, Tab};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PaymentDetails;

/// Capability surface the checkout engine drives a page through.
///
/// The engine never touches selectors or site markup directly; everything
/// site-specific lives behind this trait so the step logic is adapter-agnostic
/// and tests can drive it with a scripted fake.
pub trait CheckoutPage {
    fn url(&self) -> String;
    fn body_text(&self) -> String;
    /// Text confined to a visible modal/dialog container, if one is open.
    fn dialog_text(&self) -> Option<String>;
    fn has_password_field(&self) -> bool;

    /// Find and activate the order control for the given (normalized) title.
    fn click_entry_control(&mut self, title: &str, vocab: &[&str]) -> Result<bool>;
    /// Switch to a browsing context opened by the entry click, if one appears
    /// within the wait window. Returns whether a switch happened.
    fn adopt_popup(&mut self, within: Duration) -> bool;
    /// Content-based match over all elements; activates the nearest actionable
    /// ancestor of the matching text.
    fn activate_by_content(&mut self, phrase: &str) -> Result<bool>;
    /// Click the first visible, enabled control whose label contains any of
    /// the given phrases.
    fn click_labeled(&mut self, vocab: &[&str]) -> Result<bool>;
    /// Check unchecked agreement checkboxes; returns how many were newly
    /// checked.
    fn check_agreements(&mut self, vocab: &[&str]) -> Result<u32>;
    /// Set the ticket quantity, degrading below `desired` if the selector
    /// offers less. Returns the applied quantity, or None if nothing changed.
    fn set_quantity(&mut self, desired: u32) -> Result<Option<u32>>;
    fn select_saved_payment(&mut self, vocab: &[&str]) -> Result<bool>;
    /// Fill card/name/zip fields; card fields are searched across embedded
    /// frames. Returns how many fields were newly filled.
    fn fill_payment_fields(&mut self, payment: &PaymentDetails) -> Result<u32>;

    /// Bounded pause for asynchronous UI updates to finish.
    fn settle(&mut self, wait: Duration);
    /// Best-effort diagnostic capture; never fails the attempt.
    fn capture_diagnostics(&mut self, _tag: &str) {}
}

const JS_CLICK_LABELED: &str = r#"
(() => {
  const vocab = __VOCAB__;
  const nodes = Array.from(document.querySelectorAll(
    "button, a, input[type=submit], input[type=button], [role=button]"));
  const label = el => ((el.innerText || el.value || el.getAttribute('aria-label') || '') + '')
    .replace(/\s+/g, ' ').trim().toLowerCase();
  const visible = el => { const r = el.getBoundingClientRect(); return r.width > 0 && r.height > 0; };
  for (const el of nodes) {
    if (el.disabled || !visible(el)) continue;
    const text = label(el);
    if (!text) continue;
    if (vocab.some(v => text.includes(v))) {
      el.scrollIntoView({ block: 'center' });
      el.click();
      return true;
    }
  }
  return false;
})()
"#;

const JS_CLICK_ENTRY: &str = r#"
(() => {
  const vocab = __VOCAB__;
  const title = __TITLE__;
  const nodes = Array.from(document.querySelectorAll(
    "button, a, input[type=submit], [role=button]"));
  const label = el => ((el.innerText || el.value || el.getAttribute('aria-label') || '') + '')
    .replace(/\s+/g, ' ').trim().toLowerCase();
  const visible = el => { const r = el.getBoundingClientRect(); return r.width > 0 && r.height > 0; };
  for (const el of nodes) {
    if (el.disabled || !visible(el)) continue;
    const text = label(el);
    if (!vocab.some(v => text.includes(v))) continue;
    let scope = el.parentElement;
    for (let depth = 0; depth < 6 && scope; depth++) {
      const scopeText = (scope.innerText || '').replace(/\s+/g, ' ').toLowerCase();
      if (scopeText.includes(title)) {
        el.scrollIntoView({ block: 'center' });
        el.click();
        return true;
      }
      scope = scope.parentElement;
    }
  }
  return false;
})()
"#;

const JS_ACTIVATE_BY_CONTENT: &str = r#"
(() => {
  const phrase = __PHRASE__;
  if (!document.body) return false;
  const actionable = el => el && (el.tagName === 'A' || el.tagName === 'BUTTON'
    || el.onclick || el.hasAttribute('onclick') || el.getAttribute('role') === 'button');
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
  let node;
  while ((node = walker.nextNode())) {
    const text = (node.textContent || '').replace(/\s+/g, ' ').toLowerCase();
    if (!text.includes(phrase)) continue;
    let el = node.parentElement;
    let target = null;
    for (let depth = 0; depth < 6 && el; depth++) {
      if (actionable(el)) { target = el; break; }
      el = el.parentElement;
    }
    (target || node.parentElement).click();
    return true;
  }
  return false;
})()
"#;

const JS_CHECK_AGREEMENTS: &str = r#"
(() => {
  const vocab = __VOCAB__;
  const labelText = box => {
    let text = '';
    if (box.id) {
      const l = document.querySelector('label[for="' + box.id + '"]');
      if (l) text += ' ' + l.innerText;
    }
    const wrap = box.closest('label');
    if (wrap) text += ' ' + wrap.innerText;
    if (!text.trim() && box.parentElement) text = box.parentElement.innerText || '';
    return text.replace(/\s+/g, ' ').toLowerCase();
  };
  let checked = 0;
  for (const box of Array.from(document.querySelectorAll('input[type=checkbox]'))) {
    if (box.checked || box.disabled) continue;
    const text = labelText(box);
    if (vocab.some(v => text.includes(v))) {
      box.click();
      if (!box.checked) box.checked = true;
      checked += 1;
    }
  }
  return checked;
})()
"#;

const JS_SET_QUANTITY: &str = r#"
(() => {
  const desired = __DESIRED__;
  const qtyLike = el => /quantity|qty/i.test(
    (el.id || '') + ' ' + (el.name || '') + ' ' + (el.className || ''));
  const selects = Array.from(document.querySelectorAll('select'));
  const select = selects.find(qtyLike) || null;
  if (select) {
    const numeric = o => parseInt(o.value || o.textContent, 10);
    const offered = Array.from(select.options).map(numeric)
      .filter(n => Number.isInteger(n) && n >= 1);
    const fits = offered.filter(n => n <= desired);
    if (!fits.length) return null;
    const pick = Math.max(...fits);
    if (parseInt(select.value, 10) === pick) return null;
    const option = Array.from(select.options).find(o => numeric(o) === pick);
    select.value = option.value;
    select.dispatchEvent(new Event('change', { bubbles: true }));
    return pick;
  }
  const inputs = Array.from(document.querySelectorAll('input[type=number]'));
  const input = inputs.find(qtyLike) || (inputs.length === 1 ? inputs[0] : null);
  if (!input) return null;
  const max = parseInt(input.max, 10);
  const pick = Number.isInteger(max) && max >= 1 ? Math.min(desired, max) : desired;
  if (parseInt(input.value, 10) === pick) return null;
  input.value = String(pick);
  input.dispatchEvent(new Event('input', { bubbles: true }));
  input.dispatchEvent(new Event('change', { bubbles: true }));
  return pick;
})()
"#;

const JS_SELECT_SAVED_PAYMENT: &str = r#"
(() => {
  const vocab = __VOCAB__;
  const textFor = el => {
    let text = '';
    if (el.id) {
      const l = document.querySelector('label[for="' + el.id + '"]');
      if (l) text += ' ' + l.innerText;
    }
    const wrap = el.closest('label');
    if (wrap) text += ' ' + wrap.innerText;
    if (!text.trim() && el.parentElement) text = el.parentElement.innerText || '';
    return text.toUpperCase();
  };
  for (const radio of Array.from(document.querySelectorAll('input[type=radio]'))) {
    if (radio.checked || radio.disabled) continue;
    const text = textFor(radio);
    if (vocab.some(v => text.includes(v))) {
      radio.click();
      if (!radio.checked) radio.checked = true;
      return true;
    }
  }
  return false;
})()
"#;

const JS_FILL_PAYMENT: &str = r#"
(() => {
  const payment = __PAYMENT__;
  const docs = [document];
  for (const frame of Array.from(document.querySelectorAll('iframe'))) {
    try { if (frame.contentDocument) docs.push(frame.contentDocument); } catch (e) {}
  }
  const fieldFor = (doc, patterns) => {
    const inputs = Array.from(doc.querySelectorAll('input, select'));
    return inputs.find(i => {
      const hay = [(i.name || ''), (i.id || ''), (i.placeholder || ''),
        (i.getAttribute('autocomplete') || ''), (i.className || '')].join(' ').toLowerCase();
      return patterns.some(p => hay.includes(p));
    });
  };
  const fill = (el, value) => {
    if (!el || !value || el.value) return false;
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
  };
  let filled = 0;
  const cardFields = [
    [['cardnumber', 'card-number', 'card_number', 'ccnumber', 'cc-number', 'pan'], payment.cardNumber],
    [['exp', 'expiry', 'expiration'], payment.exp],
    [['cvc', 'cvv', 'security', 'csc'], payment.cvc],
  ];
  for (const doc of docs) {
    for (const [patterns, value] of cardFields) {
      if (fill(fieldFor(doc, patterns), value)) filled += 1;
    }
  }
  if (fill(fieldFor(document, ['cardholder', 'card-name', 'ccname', 'holder-name', 'nameoncard']), payment.name)) filled += 1;
  if (fill(fieldFor(document, ['zip', 'postal', 'postcode']), payment.zip)) filled += 1;
  return filled;
})()
"#;

const JS_BODY_TEXT: &str = "(() => document.body ? document.body.innerText : '')()";

const JS_DIALOG_TEXT: &str = r#"
(() => {
  const selectors = ['[role=dialog]', '[role=alertdialog]', '.modal', '.dialog', '.popup', '.overlay'];
  for (const s of selectors) {
    for (const el of Array.from(document.querySelectorAll(s))) {
      const r = el.getBoundingClientRect();
      if (r.width > 0 && r.height > 0 && el.innerText && el.innerText.trim()) {
        return el.innerText;
      }
    }
  }
  return null;
})()
"#;

const JS_HAS_PASSWORD_FIELD: &str = r#"
(() => Array.from(document.querySelectorAll('input[type=password]')).some(el => {
  const r = el.getBoundingClientRect();
  return r.width > 0 && r.height > 0;
}))()
"#;

/// Production adapter over a `headless_chrome` tab.
///
/// Holds a handle to whichever browsing context is currently active: after a
/// popup adoption, `tab` points at the new window and the original is left
/// alone for the monitoring loop to reclaim.
pub struct ChromePage {
    browser: Arc<Browser>,
    tab: Arc<Tab>,
    screenshot_dir: Option<PathBuf>,
    tabs_before_entry: Vec<String>,
}

impl ChromePage {
    pub fn new(browser: Arc<Browser>, tab: Arc<Tab>, screenshot_dir: Option<PathBuf>) -> Self {
        Self {
            browser,
            tab,
            screenshot_dir,
            tabs_before_entry: Vec::new(),
        }
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn eval_json(&self, js: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(js, false)
            .map_err(|e| anyhow!("script evaluation failed: {}", e))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    fn eval_bool(&self, js: &str) -> Result<bool> {
        Ok(self.eval_json(js)?.as_bool().unwrap_or(false))
    }

    fn current_tab_ids(&self) -> Vec<String> {
        match self.browser.get_tabs().lock() {
            Ok(tabs) => tabs.iter().map(|t| t.get_target_id().to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn find_new_tab(&self) -> Option<Arc<Tab>> {
        let tabs = self.browser.get_tabs().lock().ok()?;
        tabs.iter()
            .find(|t| !self.tabs_before_entry.contains(&t.get_target_id().to_string()))
            .cloned()
    }
}

fn with_arg(template: &str, placeholder: &str, value: &impl serde::Serialize) -> String {
    let encoded = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    template.replace(placeholder, &encoded)
}

impl CheckoutPage for ChromePage {
    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn body_text(&self) -> String {
        self.eval_json(JS_BODY_TEXT)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    fn dialog_text(&self) -> Option<String> {
        self.eval_json(JS_DIALOG_TEXT)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .filter(|t| !t.trim().is_empty())
    }

    fn has_password_field(&self) -> bool {
        self.eval_bool(JS_HAS_PASSWORD_FIELD).unwrap_or(false)
    }

    fn click_entry_control(&mut self, title: &str, vocab: &[&str]) -> Result<bool> {
        self.tabs_before_entry = self.current_tab_ids();
        let js = with_arg(
            &with_arg(JS_CLICK_ENTRY, "__VOCAB__", &vocab),
            "__TITLE__",
            &title,
        );
        self.eval_bool(&js)
    }

    fn adopt_popup(&mut self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if let Some(tab) = self.find_new_tab() {
                let _ = tab.wait_until_navigated();
                tracing::debug!(target_id = %tab.get_target_id(), "adopted popup context");
                self.tab = tab;
                return true;
            }
            std::thread::sleep(Duration::from_millis(250));
        }
        false
    }

    fn activate_by_content(&mut self, phrase: &str) -> Result<bool> {
        let js = with_arg(JS_ACTIVATE_BY_CONTENT, "__PHRASE__", &phrase.to_lowercase());
        self.eval_bool(&js)
    }

    fn click_labeled(&mut self, vocab: &[&str]) -> Result<bool> {
        let js = with_arg(JS_CLICK_LABELED, "__VOCAB__", &vocab);
        self.eval_bool(&js)
    }

    fn check_agreements(&mut self, vocab: &[&str]) -> Result<u32> {
        let js = with_arg(JS_CHECK_AGREEMENTS, "__VOCAB__", &vocab);
        Ok(self.eval_json(&js)?.as_u64().unwrap_or(0) as u32)
    }

    fn set_quantity(&mut self, desired: u32) -> Result<Option<u32>> {
        let js = with_arg(JS_SET_QUANTITY, "__DESIRED__", &desired);
        Ok(self.eval_json(&js)?.as_u64().map(|n| n as u32))
    }

    fn select_saved_payment(&mut self, vocab: &[&str]) -> Result<bool> {
        let js = with_arg(JS_SELECT_SAVED_PAYMENT, "__VOCAB__", &vocab);
        self.eval_bool(&js)
    }

    fn fill_payment_fields(&mut self, payment: &PaymentDetails) -> Result<u32> {
        let js = with_arg(JS_FILL_PAYMENT, "__PAYMENT__", payment);
        Ok(self.eval_json(&js)?.as_u64().unwrap_or(0) as u32)
    }

    fn settle(&mut self, wait: Duration) {
        std::thread::sleep(wait);
        // A click may have kicked off a navigation; give it a chance to land.
        let _ = self.tab.wait_until_navigated();
    }

    fn capture_diagnostics(&mut self, tag: &str) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let shot = self.tab.capture_screenshot(
            headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Png,
            None,
            None,
            true,
        );
        match shot {
            Ok(data) => {
                let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
                let filename =
                    format!("{}_{}_{}.png", tag, timestamp, uuid::Uuid::new_v4().simple());
                let path = dir.join(filename);
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&path, data) {
                    tracing::warn!("failed to write debug screenshot: {}", e);
                } else {
                    tracing::debug!(path = %path.display(), "captured debug screenshot");
                }
            }
            Err(e) => tracing::warn!("debug screenshot capture failed: {}", e),
        }
    }
}
