use crate::config::{FilmRule, PurchaseConfig};
use crate::models::normalize;

/// Resolve the purchase rule covering a screening, if any.
///
/// An exact (title, time) rule always beats a title-only rule. The title-only
/// form exists for festivals that list a single showing; when a title screens
/// multiple times, users pin rules to a screening time and the fallback never
/// fires for that title.
pub fn resolve<'a>(
    title: &str,
    screening_time: &str,
    config: &'a PurchaseConfig,
) -> Option<&'a FilmRule> {
    if !config.is_active() {
        return None;
    }

    let title = normalize(title);
    let time = normalize(screening_time);

    let exact = config.films.iter().find(|rule| {
        normalize(&rule.title) == title
            && rule
                .screening_time
                .as_deref()
                .map(normalize)
                .is_some_and(|rule_time| rule_time == time)
    });
    if exact.is_some() {
        return exact;
    }

    // A timed rule for this title, even for a different screening, suppresses
    // the title-only fallback: the user has been explicit about which showing
    // they want.
    let has_timed_rule_for_title = config
        .films
        .iter()
        .any(|rule| normalize(&rule.title) == title && rule.screening_time.is_some());
    if has_timed_rule_for_title {
        return None;
    }

    config
        .films
        .iter()
        .find(|rule| rule.screening_time.is_none() && normalize(&rule.title) == title)
}

pub fn should_auto_purchase(title: &str, screening_time: &str, config: &PurchaseConfig) -> bool {
    resolve(title, screening_time, config).is_some_and(|rule| rule.auto_purchase)
}
