//! Merge records that share a natural key

use std::collections::HashMap;
use vellum_domain::ExtractedRecord;

/// Deduplicate by natural key
///
/// A later record replaces an earlier one only with strictly higher
/// confidence, so ties keep the first seen. Output follows the order in
/// which each key first appeared.
pub fn dedupe(records: Vec<ExtractedRecord>) -> Vec<ExtractedRecord> {
    let mut out: Vec<ExtractedRecord> = Vec::with_capacity(records.len());
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(records.len());

    for record in records {
        match slots.get(&record.natural_key) {
            Some(&slot) => {
                if record.confidence > out[slot].confidence {
                    out[slot] = record;
                }
            }
            None => {
                slots.insert(record.natural_key.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Number of distinct natural keys
pub fn distinct_keys(records: &[ExtractedRecord]) -> usize {
    records
        .iter()
        .map(|r| r.natural_key.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vellum_domain::{Provenance, ResultState};

    fn record(key: &str, confidence: f64, description: &str) -> ExtractedRecord {
        ExtractedRecord {
            natural_key: key.to_string(),
            area: String::new(),
            category: String::new(),
            description: description.to_string(),
            result_state: ResultState::Effective,
            procedure_note: None,
            location: None,
            confidence,
            provenance: Provenance::Verification,
        }
    }

    #[test]
    fn test_higher_confidence_wins() {
        let out = dedupe(vec![record("CC1.1", 0.80, "first"), record("CC1.1", 0.95, "second")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.95);
        assert_eq!(out[0].description, "second");

        let out = dedupe(vec![record("CC1.1", 0.95, "first"), record("CC1.1", 0.80, "second")]);
        assert_eq!(out[0].description, "first");
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let out = dedupe(vec![record("CC1.1", 0.9, "first"), record("CC1.1", 0.9, "second")]);
        assert_eq!(out[0].description, "first");
    }

    #[test]
    fn test_first_seen_key_order() {
        let out = dedupe(vec![
            record("B", 0.5, ""),
            record("A", 0.5, ""),
            record("B", 0.9, ""),
        ]);
        let keys: Vec<_> = out.iter().map(|r| r.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(out[0].confidence, 0.9);
    }

    fn records() -> impl Strategy<Value = Vec<ExtractedRecord>> {
        proptest::collection::vec(("[A-E]", 0u8..=4), 0..40).prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (key, c))| record(&key, c as f64 / 4.0, &i.to_string()))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn dedupe_is_idempotent(input in records()) {
            let once = dedupe(input);
            let twice = dedupe(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn dedupe_preserves_distinct_keys(input in records()) {
            let keys = distinct_keys(&input);
            let out = dedupe(input);
            prop_assert_eq!(out.len(), keys);
            prop_assert_eq!(distinct_keys(&out), keys);
        }

        #[test]
        fn dedupe_keeps_max_confidence(input in records()) {
            let out = dedupe(input.clone());
            for r in &out {
                let best = input
                    .iter()
                    .filter(|x| x.natural_key == r.natural_key)
                    .map(|x| x.confidence)
                    .fold(0.0, f64::max);
                prop_assert_eq!(r.confidence, best);
            }
        }
    }
}
