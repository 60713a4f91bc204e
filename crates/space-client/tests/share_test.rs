//! Delegating read access without re-uploading content.

mod common;

use std::sync::Arc;

use space_chain::{MemoryCache, MemoryNetwork, Network, Node};
use space_core::channels::{delta_channel, meta_channel, share_channel};
use space_core::{timestamp_now, Delta, Meta, SpaceError, SpaceResult};
use space_crypto::{Acl, KeyPair};

use common::{content, party, LISTENER};

#[test]
fn recipient_reads_shared_file() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;
    let carol = party("carol", &network).client;
    let data = content(4000);

    let meta_ref = alice
        .add("report.pdf", "application/pdf", data.as_slice(), &LISTENER)
        .unwrap();
    let meta_id = meta_ref.record_hash;
    let (entry, _) = alice.meta_for_hash(&meta_id).unwrap();
    assert!(entry.record.references.len() > 1);

    let outcome = alice.share(&meta_id, &["bob"], &LISTENER).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.succeeded.len(), 1);

    assert_eq!(bob.read_file_to_vec(&meta_id).unwrap(), data);

    let shared = bob.shared_metas().unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].owner, "alice");
    assert_eq!(shared[0].meta.name, "report.pdf");
    assert_eq!(shared[0].share.chunk_keys.len(), entry.record.references.len());

    assert!(carol.read_file_to_vec(&meta_id).unwrap_err().is_not_found());
}

#[test]
fn share_record_is_sealed_for_recipient_and_owner() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;
    let carol = party("carol", &network).client;

    let meta_ref = alice
        .add("a.txt", "text/plain", b"hello bob".as_slice(), &LISTENER)
        .unwrap();
    alice.share(&meta_ref.record_hash, &["bob"], &LISTENER).unwrap();

    let channel = carol.node().open_channel(share_channel("bob")).unwrap();
    let entries: Vec<_> = channel
        .entries(carol.node().cache(), carol.node().network())
        .collect::<SpaceResult<_>>()
        .unwrap();
    assert_eq!(entries.len(), 1);

    let grants: Vec<&str> = entries[0]
        .record
        .access
        .iter()
        .map(|g| g.alias.as_str())
        .collect();
    assert_eq!(grants.len(), 2);
    assert!(grants.contains(&"alice") && grants.contains(&"bob"));

    assert!(carol.node().decrypt_entry(&entries[0]).unwrap_err().is_access_denied());
    assert!(bob.node().decrypt_entry(&entries[0]).is_ok());
    assert!(alice.node().decrypt_entry(&entries[0]).is_ok());
}

#[test]
fn unknown_recipient_fails_alone() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let meta_ref = alice
        .add("a.txt", "text/plain", b"for bob only".as_slice(), &LISTENER)
        .unwrap();
    let outcome = alice
        .share(&meta_ref.record_hash, &["nobody", "bob"], &LISTENER)
        .unwrap();

    assert_eq!(outcome.total(), 2);
    assert_eq!(outcome.succeeded[0].0, "bob");
    let (recipient, err) = &outcome.failed[0];
    assert_eq!(recipient, "nobody");
    assert!(matches!(err, SpaceError::UnknownAlias(_)), "got {err}");

    assert_eq!(
        bob.read_file_to_vec(&meta_ref.record_hash).unwrap(),
        b"for bob only"
    );
    assert!(matches!(
        outcome.into_result().unwrap_err(),
        SpaceError::Batch { failed: 1, total: 2, .. }
    ));
}

#[test]
fn only_the_owner_can_share() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;
    let _carol = party("carol", &network);

    let meta_ref = alice
        .add("a.txt", "text/plain", b"alice's".as_slice(), &LISTENER)
        .unwrap();
    alice.share(&meta_ref.record_hash, &["bob"], &LISTENER).unwrap();

    let err = bob
        .share(&meta_ref.record_hash, &["carol"], &LISTENER)
        .unwrap_err();
    assert!(err.is_not_found(), "got {err}");
}

#[test]
fn later_edits_need_a_new_share() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let meta_ref = alice
        .add("test", "text/plain", b"testing".as_slice(), &LISTENER)
        .unwrap();
    let meta_id = meta_ref.record_hash;
    alice
        .amend(&meta_id, Delta::new(4, 3, "foobar"), &LISTENER)
        .unwrap();

    alice.share(&meta_id, &["bob"], &LISTENER).unwrap();
    assert_eq!(bob.read_file_to_vec(&meta_id).unwrap(), b"testfoobar");

    alice.amend(&meta_id, Delta::new(0, 7, ""), &LISTENER).unwrap();
    let err = bob.read_file_to_vec(&meta_id).unwrap_err();
    assert!(err.is_access_denied(), "got {err}");

    alice.share(&meta_id, &["bob"], &LISTENER).unwrap();
    assert_eq!(bob.read_file_to_vec(&meta_id).unwrap(), b"bar");
    assert_eq!(bob.shared_metas().unwrap().len(), 1);
}

#[test]
fn deltas_from_other_writers_are_ignored() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let meta_ref = alice
        .add("test", "text/plain", b"testing".as_slice(), &LISTENER)
        .unwrap();
    let meta_id = meta_ref.record_hash;
    alice.share(&meta_id, &["bob"], &LISTENER).unwrap();

    let err = bob
        .amend(&meta_id, Delta::insert(0, "evil"), &LISTENER)
        .unwrap_err();
    assert!(err.is_not_found(), "got {err}");

    // a record written straight onto the delta channel by a non-owner
    let node = bob.node();
    let mut channel = node.open_channel(delta_channel(&meta_id)).unwrap();
    let payload = serde_json::to_vec(&Delta::insert(0, "evil")).unwrap();
    node.write(
        timestamp_now(),
        &channel,
        Some(&node.owner_acl()),
        Vec::new(),
        &payload,
    )
    .unwrap();
    node.mine(&mut channel, &LISTENER).unwrap();
    node.push(&channel);

    assert_eq!(alice.read_file_to_vec(&meta_id).unwrap(), b"testing");
    assert_eq!(bob.read_file_to_vec(&meta_id).unwrap(), b"testing");
}

#[test]
fn deltas_under_a_borrowed_alias_are_ignored() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let meta_id = alice
        .add("test", "text/plain", b"testing".as_slice(), &LISTENER)
        .unwrap()
        .record_hash;
    alice.share(&meta_id, &["bob"], &LISTENER).unwrap();

    // Fresh keys claiming alice's alias, sealing for alice's real key.
    let net: Arc<dyn Network> = network.clone();
    let mallory = Node::new("alice", KeyPair::generate(), Arc::new(MemoryCache::new()), Some(net));
    let acl = Acl::new("alice", alice.node().public_key());
    let mut channel = mallory.open_channel(delta_channel(&meta_id)).unwrap();
    let payload = serde_json::to_vec(&Delta::new(0, 7, "pwned")).unwrap();
    mallory
        .write(timestamp_now(), &channel, Some(&acl), Vec::new(), &payload)
        .unwrap();
    mallory.mine(&mut channel, &LISTENER).unwrap();
    mallory.push(&channel);

    assert_eq!(alice.read_file_to_vec(&meta_id).unwrap(), b"testing");
    assert_eq!(bob.read_file_to_vec(&meta_id).unwrap(), b"testing");

    // Owner edits still apply on top.
    alice.amend(&meta_id, Delta::insert(7, "!"), &LISTENER).unwrap();
    assert_eq!(alice.read_file_to_vec(&meta_id).unwrap(), b"testing!");
}

#[test]
fn shared_meta_with_wrong_size_reads_its_real_content() {
    let network = Arc::new(MemoryNetwork::new());
    let alice = party("alice", &network).client;
    let bob = party("bob", &network).client;

    let node = alice.node();
    let mut metas = node.open_channel(meta_channel("alice")).unwrap();
    let meta = Meta {
        name: "huge.txt".into(),
        mime: "text/plain".into(),
        size: u64::MAX,
    };
    let meta_id = node
        .write(
            timestamp_now(),
            &metas,
            Some(&node.owner_acl()),
            Vec::new(),
            &serde_json::to_vec(&meta).unwrap(),
        )
        .unwrap()
        .record_hash;
    node.mine(&mut metas, &LISTENER).unwrap();
    node.push(&metas);

    alice.amend(&meta_id, Delta::insert(0, "small"), &LISTENER).unwrap();
    alice.share(&meta_id, &["bob"], &LISTENER).unwrap();

    assert_eq!(bob.shared_metas().unwrap()[0].meta.size, u64::MAX);
    assert_eq!(bob.read_file_to_vec(&meta_id).unwrap(), b"small");
    assert_eq!(alice.read_file_to_vec(&meta_id).unwrap(), b"small");
}
