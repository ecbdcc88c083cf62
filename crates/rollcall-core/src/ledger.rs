//! Attendance reconciliation and roster ordering.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Integer key of arbitrary length, held as its digits without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericKey(String);

impl NumericKey {
    pub fn from_digits(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        Some(Self(if trimmed.is_empty() { "0".into() } else { trimmed.into() }))
    }
}

impl Ord for NumericKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for NumericKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Default extraction rule: every ASCII digit in the identifier, concatenated.
///
/// `"S10"` → 10, `"2024-B7"` → 20247, `"Unknown"` → none.
pub fn embedded_digits(identifier: &str) -> Option<NumericKey> {
    let digits: String = identifier.chars().filter(char::is_ascii_digit).collect();
    NumericKey::from_digits(&digits)
}

/// Order two identifiers by the key `extract` pulls out of them.
///
/// Identifiers without a key sort after those with one; equal keys fall back
/// to plain string order.
pub fn compare_by_key<F>(extract: F, a: &str, b: &str) -> Ordering
where
    F: Fn(&str) -> Option<NumericKey>,
{
    let by_key = match (extract(a), extract(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_key.then_with(|| a.cmp(b))
}

/// Sort identifiers with the default embedded-number rule.
pub fn sort_identifiers(names: &mut [String]) {
    names.sort_by(|a, b| compare_by_key(embedded_digits, a, b));
}

/// Outcome of comparing the detected set against the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub present: Vec<String>,
    pub absent: Vec<String>,
}

/// Split the roster into present and absent students.
///
/// `present` is `detected_present` and `absent` is `known − detected_present`,
/// both in identifier order.
pub fn reconcile(known_students: &BTreeSet<String>, detected_present: &BTreeSet<String>) -> Reconciliation {
    let mut present: Vec<String> = detected_present.iter().cloned().collect();
    let mut absent: Vec<String> = known_students.difference(detected_present).cloned().collect();
    sort_identifiers(&mut present);
    sort_identifiers(&mut absent);
    Reconciliation { present, absent }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        sort_identifiers(&mut v);
        v
    }

    #[test]
    fn test_numeric_order_with_non_numeric_last() {
        assert_eq!(sorted(&["S10", "S2", "Unknown"]), vec!["S2", "S10", "Unknown"]);
    }

    #[test]
    fn test_ties_fall_back_to_string_order() {
        assert_eq!(sorted(&["B7", "A7", "007"]), vec!["007", "A7", "B7"]);
        assert_eq!(sorted(&["zed", "Amy"]), vec!["Amy", "zed"]);
    }

    #[test]
    fn test_digits_are_concatenated() {
        assert_eq!(embedded_digits("2024-B7"), NumericKey::from_digits("20247"));
        assert_eq!(embedded_digits("abc"), None);
    }

    #[test]
    fn test_keys_longer_than_u64() {
        let big = "S123456789012345678901234567890";
        let small = "S99999999999999999999";
        assert_eq!(sorted(&[big, small]), vec![small, big]);
    }

    #[test]
    fn test_custom_extraction_rule() {
        let suffix = |s: &str| s.rsplit('-').next().and_then(NumericKey::from_digits);
        let mut names = vec!["9-3".to_string(), "1-20".to_string()];
        names.sort_by(|a, b| compare_by_key(suffix, a, b));
        assert_eq!(names, vec!["9-3", "1-20"]);
    }

    #[test]
    fn test_reconcile_partitions_roster() {
        let result = reconcile(&set(&["A1", "B2", "C3"]), &set(&["B2"]));
        assert_eq!(result.present, vec!["B2"]);
        assert_eq!(result.absent, vec!["A1", "C3"]);
    }

    #[test]
    fn test_reconcile_is_exhaustive_and_disjoint() {
        let known = set(&["S1", "S2", "S3", "S10", "Guest"]);
        for detected in [set(&[]), set(&["S10"]), set(&["S1", "Guest"]), known.clone()] {
            let result = reconcile(&known, &detected);
            let present: BTreeSet<String> = result.present.iter().cloned().collect();
            let absent: BTreeSet<String> = result.absent.iter().cloned().collect();
            assert_eq!(present, detected);
            assert!(present.is_disjoint(&absent));
            assert_eq!(present.union(&absent).cloned().collect::<BTreeSet<_>>(), known);
        }
    }

    #[test]
    fn test_reconcile_empty() {
        assert_eq!(reconcile(&BTreeSet::new(), &BTreeSet::new()), Reconciliation::default());
    }
}
