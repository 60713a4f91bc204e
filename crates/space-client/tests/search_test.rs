//! Tags and name/type/tag search.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use space_chain::MemoryNetwork;
use space_client::{NameFilter, SearchQuery, TagFilter, TypeFilter};
use space_core::{RecordHash, SpaceError};

use common::{party, LISTENER};

fn ids<T>(found: &[(space_chain::BlockEntry, T)]) -> BTreeSet<RecordHash> {
    found.iter().map(|(entry, _)| entry.record_hash).collect()
}

#[test]
fn tag_search_returns_exactly_the_tagged_files() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;

    let a = alice
        .add("a.txt", "text/plain", b"a".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let b = alice
        .add("b.txt", "text/plain", b"b".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let _c = alice
        .add("c.txt", "text/plain", b"c".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;

    alice.add_tag(&a, &["x", "y"], &LISTENER).unwrap();
    alice.add_tag(&b, &["y"], &LISTENER).unwrap();

    let found = alice.search_tag(&TagFilter::new(["x"])).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([a]));

    let found = alice.search_tag(&TagFilter::new(["y"])).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([a, b]));
    assert_eq!(found.len(), 2);

    assert!(alice.search_tag(&TagFilter::new(["z"])).unwrap().is_empty());
}

#[test]
fn tags_are_listed_oldest_first() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;

    let meta_id = alice
        .add("a.txt", "text/plain", b"a".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let outcome = alice
        .add_tag(&meta_id, &["first", "second"], &LISTENER)
        .unwrap();
    assert!(outcome.is_complete());
    alice.add_tag(&meta_id, &["third"], &LISTENER).unwrap();

    let values: Vec<String> = alice
        .tags_for_hash(&meta_id)
        .unwrap()
        .into_iter()
        .map(|(entry, tag)| {
            assert!(entry.record.references_hash(&meta_id));
            tag.value
        })
        .collect();
    assert_eq!(values, ["first", "second", "third"]);
}

#[test]
fn empty_tag_fails_alone() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;

    let meta_id = alice
        .add("a.txt", "text/plain", b"a".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let outcome = alice
        .add_tag(&meta_id, &["keep", "  "], &LISTENER)
        .unwrap();

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(alice.tags_for_hash(&meta_id).unwrap().len(), 1);
}

#[test]
fn tagging_unknown_file_is_not_found() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;

    let err = alice
        .add_tag(&RecordHash::from_bytes([3u8; 32]), &["x"], &LISTENER)
        .unwrap_err();
    assert!(matches!(err, SpaceError::NotFound(_)), "got {err}");
}

#[test]
fn tags_on_shared_files_stay_private() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let meta_id = alice
        .add("a.txt", "text/plain", b"a".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    alice.add_tag(&meta_id, &["mine"], &LISTENER).unwrap();
    alice.share(&meta_id, &["bob"], &LISTENER).unwrap();

    bob.add_tag(&meta_id, &["theirs"], &LISTENER).unwrap();

    let alice_tags: Vec<String> = alice
        .tags_for_hash(&meta_id)
        .unwrap()
        .into_iter()
        .map(|(_, t)| t.value)
        .collect();
    assert_eq!(alice_tags, ["mine"]);

    let bob_tags: Vec<String> = bob
        .tags_for_hash(&meta_id)
        .unwrap()
        .into_iter()
        .map(|(_, t)| t.value)
        .collect();
    assert_eq!(bob_tags, ["theirs"]);

    let (entry, _) = &bob.tags_for_hash(&meta_id).unwrap()[0];
    assert_eq!(entry.record.references[0].channel_name, "Space-Meta-alice");
}

#[test]
fn name_and_type_filters() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;

    let report = alice
        .add("Q3-Report.txt", "text/plain", b"numbers".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let photo = alice
        .add("holiday.png", "image/png", b"pixels".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;

    let found = alice.search_meta(&NameFilter::new(["report"])).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([report]));

    let found = alice.search_meta(&TypeFilter::new(["image/png"])).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([photo]));

    let found = alice.search_meta(&TypeFilter::new(["image"])).unwrap();
    assert!(found.is_empty());
}

#[test]
fn ranked_search_orders_by_matches_then_recency() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;

    let old_report = alice
        .add("report-2023.txt", "text/plain", b"old".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let new_report = alice
        .add("report-2024.txt", "text/plain", b"new".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let chart = alice
        .add("chart.png", "image/png", b"png".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let unrelated = alice
        .add("notes.md", "text/markdown", b"md".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    alice.add_tag(&old_report, &["work"], &LISTENER).unwrap();
    alice.add_tag(&chart, &["work"], &LISTENER).unwrap();

    let query = SearchQuery::parse(["report", "type:text/plain", "tag:work"]);
    let hits = alice.search(&query).unwrap();
    let order: Vec<RecordHash> = hits.iter().map(|h| h.meta_id()).collect();

    assert_eq!(order, vec![old_report, new_report, chart]);
    assert_eq!(hits[0].matches, 3);
    assert_eq!(hits[1].matches, 2);
    assert_eq!(hits[2].matches, 1);
    assert!(!order.contains(&unrelated));

    assert!(alice.search(&SearchQuery::default()).unwrap().is_empty());
}

#[test]
fn search_covers_files_shared_with_the_caller() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let shared = alice
        .add("budget.csv", "text/csv", b"1,2".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    let private = alice
        .add("budget-draft.csv", "text/csv", b"3,4".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    alice.share(&shared, &["bob"], &LISTENER).unwrap();
    bob.add_tag(&shared, &["finance"], &LISTENER).unwrap();
    let own = bob
        .add("ledger.csv", "text/csv", b"5".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    bob.add_tag(&own, &["finance"], &LISTENER).unwrap();

    let found = bob.search_tag(&TagFilter::new(["finance"])).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([shared, own]));

    let found = bob.search_meta(&NameFilter::new(["budget"])).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([shared]));
    assert!(!ids(&found).contains(&private));

    let hits = bob
        .search(&SearchQuery::parse(["budget", "tag:finance"]))
        .unwrap();
    assert_eq!(hits[0].meta_id(), shared);
    assert_eq!(hits[0].matches, 2);
    assert_eq!(hits[0].shared_by.as_deref(), Some("alice"));
    assert_eq!(hits[1].meta_id(), own);
    assert_eq!(hits[1].shared_by, None);

    // Bob's tag on the shared file is not alice's.
    assert!(alice.search_tag(&TagFilter::new(["finance"])).unwrap().is_empty());
}
