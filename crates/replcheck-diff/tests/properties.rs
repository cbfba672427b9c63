//! Merge properties over generated replica pairs.

use proptest::prelude::*;

use replcheck_diff::{compare, DiffRecord, DiffSummary, Side, VecSource};
use replcheck_testkit::generators::{entry_set, replica_pair};
use replcheck_core::DirectoryEntry;

fn run(first: Vec<DirectoryEntry>, second: Vec<DirectoryEntry>) -> (Vec<DiffRecord>, DiffSummary) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let mut records = Vec::new();
        let summary = compare(
            &mut VecSource::new(first),
            &mut VecSource::new(second),
            &mut records,
        )
        .await
        .unwrap();
        (records, summary)
    })
}

proptest! {
    #[test]
    fn classification_matches_placement(pair in replica_pair(60)) {
        let (records, summary) = run(pair.first.clone(), pair.second.clone());

        prop_assert_eq!(summary.matched, pair.matched);
        prop_assert_eq!(summary.mismatched, pair.mismatched);
        prop_assert_eq!(summary.missing_on_second, pair.only_on_first);
        prop_assert_eq!(summary.missing_on_first, pair.only_on_second);
        prop_assert_eq!(summary.first_entries, pair.first.len() as u64);
        prop_assert_eq!(summary.second_entries, pair.second.len() as u64);
        prop_assert_eq!(records.len() as u64, summary.differences());
    }

    #[test]
    fn records_come_out_in_key_order(pair in replica_pair(60)) {
        let (records, _) = run(pair.first, pair.second);
        prop_assert!(records.windows(2).all(|w| w[0].key() < w[1].key()));
    }

    #[test]
    fn comparing_a_side_with_itself_is_clean(entries in entry_set(60)) {
        let (records, summary) = run(entries.clone(), entries.clone());
        prop_assert!(records.is_empty());
        prop_assert_eq!(summary.matched, entries.len() as u64);
    }

    #[test]
    fn swapping_sides_mirrors_records(pair in replica_pair(40)) {
        let (forward, _) = run(pair.first.clone(), pair.second.clone());
        let (backward, _) = run(pair.second, pair.first);

        prop_assert_eq!(forward.len(), backward.len());
        for (a, b) in forward.iter().zip(&backward) {
            prop_assert_eq!(a.key(), b.key());
            match (a, b) {
                (
                    DiffRecord::Mismatch { first_timestamp: a1, second_timestamp: a2, .. },
                    DiffRecord::Mismatch { first_timestamp: b1, second_timestamp: b2, .. },
                ) => {
                    prop_assert_eq!(a1, b2);
                    prop_assert_eq!(a2, b1);
                }
                (
                    DiffRecord::Missing { missing_on: Side::First, .. },
                    DiffRecord::Missing { missing_on: Side::Second, .. },
                )
                | (
                    DiffRecord::Missing { missing_on: Side::Second, .. },
                    DiffRecord::Missing { missing_on: Side::First, .. },
                ) => {}
                other => prop_assert!(false, "records do not mirror: {:?}", other),
            }
        }
    }

    #[test]
    fn comparison_is_deterministic(pair in replica_pair(40)) {
        let once = run(pair.first.clone(), pair.second.clone());
        let twice = run(pair.first, pair.second);
        prop_assert_eq!(once, twice);
    }
}
