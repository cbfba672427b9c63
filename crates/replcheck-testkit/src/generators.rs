//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use replcheck_core::DirectoryEntry;

/// A DN-like key. Mixed case exercises byte ordering.
pub fn entry_key() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,3}=[A-Za-z0-9]{1,6}(,[A-Za-z]{1,2}=[A-Za-z0-9]{1,4}){0,2}"
}

/// Seconds into a fixed day.
fn second_of_day() -> impl Strategy<Value = u32> {
    0u32..86_400
}

/// A backing-store timestamp, `2024-01-01 HH:MM:SS.000000`.
pub fn render_timestamp(second: u32) -> String {
    let second = second % 86_400;
    format!(
        "2024-01-01 {:02}:{:02}:{:02}.000000",
        second / 3600,
        (second / 60) % 60,
        second % 60
    )
}

/// Entries sorted strictly ascending by key.
pub fn entry_set(max_len: usize) -> impl Strategy<Value = Vec<DirectoryEntry>> {
    prop::collection::btree_map(entry_key(), second_of_day(), 0..=max_len).prop_map(|map| {
        map.into_iter()
            .map(|(key, second)| DirectoryEntry::new(key, render_timestamp(second)))
            .collect()
    })
}

/// Where a generated key lives.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Both,
    Diverged,
    FirstOnly,
    SecondOnly,
}

fn placement() -> impl Strategy<Value = Placement> {
    prop_oneof![
        Just(Placement::Both),
        Just(Placement::Diverged),
        Just(Placement::FirstOnly),
        Just(Placement::SecondOnly),
    ]
}

/// Two sorted replicas and the classification the merge should produce.
#[derive(Debug, Clone)]
pub struct ReplicaPair {
    pub first: Vec<DirectoryEntry>,
    pub second: Vec<DirectoryEntry>,
    pub matched: u64,
    pub mismatched: u64,
    pub only_on_first: u64,
    pub only_on_second: u64,
}

/// Two replicas built from one key set, with every key placed on one or
/// both sides.
pub fn replica_pair(max_len: usize) -> impl Strategy<Value = ReplicaPair> {
    prop::collection::btree_map(entry_key(), (placement(), second_of_day()), 0..=max_len)
        .prop_map(build_pair)
}

fn build_pair(keys: BTreeMap<String, (Placement, u32)>) -> ReplicaPair {
    let mut pair = ReplicaPair {
        first: Vec::new(),
        second: Vec::new(),
        matched: 0,
        mismatched: 0,
        only_on_first: 0,
        only_on_second: 0,
    };

    for (key, (placement, second)) in keys {
        let ts = render_timestamp(second);
        match placement {
            Placement::Both => {
                pair.first.push(DirectoryEntry::new(key.clone(), ts.clone()));
                pair.second.push(DirectoryEntry::new(key, ts));
                pair.matched += 1;
            }
            Placement::Diverged => {
                pair.first.push(DirectoryEntry::new(key.clone(), ts));
                pair.second
                    .push(DirectoryEntry::new(key, render_timestamp(second + 1)));
                pair.mismatched += 1;
            }
            Placement::FirstOnly => {
                pair.first.push(DirectoryEntry::new(key, ts));
                pair.only_on_first += 1;
            }
            Placement::SecondOnly => {
                pair.second.push(DirectoryEntry::new(key, ts));
                pair.only_on_second += 1;
            }
        }
    }
    pair
}
