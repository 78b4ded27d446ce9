//! Duration grammar: a run of `<amount><unit>` terms, e.g. `5d`, `10m30s`.
//!
//! A unit is any abbreviation of its full name, matched against the table
//! in order, so `m` means minutes (not months) and `mo` means months.
//! Unrecognised abbreviations are ignored rather than rejected; the input
//! is invalid only when no term parsed at all. One month counts as exactly
//! 365/12 days.

use std::time::Duration;

/// Unit names and their length in seconds, in match-priority order.
const UNITS: &[(&str, u64)] = &[
    ("seconds", 1),
    ("minutes", 60),
    ("hours", 3_600),
    ("days", 86_400),
    ("weeks", 604_800),
    ("months", 2_628_000),
    ("years", 31_540_000),
];

/// Parse a duration string, `None` when nothing in it parsed.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut chars = input.chars().peekable();
    while chars.peek().is_some() {
        // Skip to the next digit run.
        while chars.peek().is_some_and(|c| !c.is_ascii_digit()) {
            chars.next();
        }
        let mut amount: u64 = 0;
        let mut saw_digit = false;
        while let Some(c) = chars.peek().copied() {
            let Some(d) = c.to_digit(10) else { break };
            saw_digit = true;
            amount = amount.saturating_mul(10).saturating_add(u64::from(d));
            chars.next();
        }
        if !saw_digit {
            continue;
        }
        let mut abbrev = String::new();
        while let Some(c) = chars.peek().copied() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            abbrev.push(c.to_ascii_lowercase());
            chars.next();
        }
        if abbrev.is_empty() {
            continue;
        }
        if let Some((_, secs)) = UNITS.iter().find(|(name, _)| name.starts_with(&abbrev)) {
            total = total.saturating_add(amount.saturating_mul(*secs));
        }
    }
    if total == 0 {
        None
    } else {
        Some(Duration::from_secs(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(input: &str) -> Option<u64> {
        parse_duration(input).map(|d| d.as_secs())
    }

    #[test]
    fn single_terms() {
        assert_eq!(secs("5d"), Some(5 * 86_400));
        assert_eq!(secs("1h"), Some(3_600));
        assert_eq!(secs("30s"), Some(30));
    }

    #[test]
    fn compound_terms_accumulate() {
        assert_eq!(secs("10m30s"), Some(630));
        assert_eq!(
            secs("1y1mo2w5d10h30m15s"),
            Some(31_540_000 + 2_628_000 + 1_209_600 + 432_000 + 36_000 + 1_800 + 15)
        );
    }

    #[test]
    fn m_means_minutes_mo_means_months() {
        assert_eq!(secs("5m"), Some(300));
        assert_eq!(secs("1mo"), Some(2_628_000));
        assert_eq!(secs("1min"), Some(60));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(secs("2H"), Some(7_200));
    }

    #[test]
    fn invalid_abbreviations_are_ignored() {
        assert_eq!(secs("5x10s"), Some(10));
        assert_eq!(secs("3q"), None);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(secs("soon"), None);
        assert_eq!(secs(""), None);
        assert_eq!(secs("0s"), None);
    }
}
