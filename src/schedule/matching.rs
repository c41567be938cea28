//! Whether a published event applies to this installation.

use super::event::FlagEvent;
use super::settings::SchedulerConfig;
use crate::common::constants::FEDERAL_FLAG_CODE;

/// Case-insensitive comparison of `subscribed` against the leading
/// `subscribed.len()` characters of `published`.
///
/// The comparison is asymmetric: an empty subscription matches
/// everything, and a subscription longer than the published code only
/// matches when the two are equal.
pub fn jurisdiction_matches(published: &str, subscribed: &str) -> bool {
    let width = subscribed.chars().count();
    let head: String = published.chars().take(width).collect();
    head.to_lowercase() == subscribed.to_lowercase()
}

/// Jurisdiction matches the federal or state code, and the flag is the
/// federal flag or this halyard's top flag.
pub fn event_applies(event: &FlagEvent, config: &SchedulerConfig) -> bool {
    let jurisdiction = jurisdiction_matches(&event.jurisdiction, &config.federal_jurisdiction)
        || jurisdiction_matches(&event.jurisdiction, &config.state_jurisdiction);
    let flag = event.flag_code == FEDERAL_FLAG_CODE || event.flag_code == config.top_flag;
    jurisdiction && flag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            federal_jurisdiction: "US".into(),
            state_jurisdiction: "US-TN".into(),
            top_flag: "TN".into(),
            ..Default::default()
        }
    }

    fn event(jurisdiction: &str, flag: &str) -> FlagEvent {
        let mut event = FlagEvent::new(1, 1);
        event.jurisdiction = jurisdiction.into();
        event.flag_code = flag.into();
        event
    }

    #[test]
    fn test_prefix_match_is_case_insensitive() {
        assert!(jurisdiction_matches("US-TN-SULLIVAN", "us-tn"));
        assert!(jurisdiction_matches("us", "US"));
        assert!(!jurisdiction_matches("US-VA", "US-TN"));
    }

    #[test]
    fn test_longer_subscription_needs_exact_match() {
        assert!(!jurisdiction_matches("US", "US-TN"));
        assert!(jurisdiction_matches("US-TN", "US-TN"));
    }

    #[test]
    fn test_empty_subscription_matches_anything() {
        assert!(jurisdiction_matches("CA-ON", ""));
    }

    #[test]
    fn test_both_clauses_required() {
        let config = config();
        assert!(event_applies(&event("US", "US"), &config));
        assert!(event_applies(&event("US-TN", "TN"), &config));
        // Federal-jurisdiction event lowering only another state's flag.
        assert!(!event_applies(&event("US", "VA"), &config));
        // Right flag, foreign jurisdiction.
        assert!(!event_applies(&event("CA", "US"), &config));
        // Flag codes compare exactly.
        assert!(!event_applies(&event("US", "us"), &config));
    }
}
