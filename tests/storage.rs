mod common;

use std::io::{Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::sync::Arc;

use assetvault::error::ErrorKind;
use assetvault::shard::{BUCKET_NUMBER, ShardRouter, create_intervals};

use common::{SHARDS, TestVault, sample};

#[test]
fn test_intervals_cover_bucket_space_for_many_factors() {
    for factor in [1, 2, 3, 4, 7, 10, 64, 1000, 65536] {
        let intervals = create_intervals(NonZeroUsize::new(factor).unwrap());
        assert_eq!(intervals.len(), factor);
        assert_eq!(intervals[0].from, 0);
        assert_eq!(intervals.last().unwrap().to, BUCKET_NUMBER);
        for pair in intervals.windows(2) {
            assert_eq!(pair[0].to, pair[1].from, "gap or overlap at factor {factor}");
        }
    }
}

#[test]
fn test_routing_is_stable_across_routers() {
    let factor = NonZeroUsize::new(SHARDS).unwrap();
    let first = ShardRouter::new(factor);
    let second = ShardRouter::new(factor);

    for i in 0..500 {
        let key = format!("user-{i}");
        assert_eq!(first.shard_for_key(&key), second.shard_for_key(&key));
        assert_eq!(first.shard_for_key(&key), first.shard_for_key(&key));
    }
    assert_eq!(first.shard_for_bucket(50000), 3);
}

#[test]
fn test_round_trip_from_empty_to_multi_megabyte() {
    let vault = TestVault::open();
    let owner = vault.user("alice");
    let assets = &vault.services.assets;

    for len in [0, 1, 8191, 8192, 8193, 100_000, 3 * 1024 * 1024 + 7] {
        let name = format!("blob-{len}");
        let data = sample(len);
        assert_eq!(assets.create(&name, &owner, data.as_slice()).unwrap(), len as u64);
        assert_eq!(assets.read_to_vec(&name, &owner).unwrap(), data, "length {len}");
    }
}

#[test]
fn test_streaming_reader_seeks_within_transaction() {
    let vault = TestVault::open();
    let owner = vault.user("alice");
    let data = sample(1024 * 1024);
    vault.services.assets.create("big", &owner, data.as_slice()).unwrap();

    let middle = vault
        .services
        .assets
        .get("big", &owner, |reader| {
            reader.seek(SeekFrom::Start(500_000))?;
            let mut buf = vec![0u8; 70_000];
            reader.read_exact(&mut buf)?;
            Ok(buf)
        })
        .unwrap();
    assert_eq!(middle, &data[500_000..570_000]);
}

#[test]
fn test_duplicate_create_keeps_first_content() {
    let vault = TestVault::open();
    let owner = vault.user("alice");
    let assets = &vault.services.assets;

    assets.create("a.txt", &owner, &b"first"[..]).unwrap();
    let err = assets.create("a.txt", &owner, &b"second version"[..]).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateAsset);
    assert_eq!(assets.read_to_vec("a.txt", &owner).unwrap(), b"first");
    assert_eq!(assets.list(&owner).unwrap(), vec!["a.txt"]);
}

#[test]
fn test_delete_missing_asset_mutates_nothing() {
    let vault = TestVault::open();
    let owner = vault.user("alice");
    let assets = &vault.services.assets;
    assets.create("keep", &owner, &b"data"[..]).unwrap();

    let err = assets.delete("missing", &owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFoundAsset);
    assert_eq!(assets.list(&owner).unwrap(), vec!["keep"]);
    assert_eq!(assets.read_to_vec("keep", &owner).unwrap(), b"data");
}

#[test]
fn test_owners_are_isolated() {
    let vault = TestVault::open();
    let alice = vault.user("alice");
    let bob = vault.user("bob");
    let assets = &vault.services.assets;

    assets.create("shared-name", &alice, &b"alice"[..]).unwrap();
    assets.create("shared-name", &bob, &b"bob"[..]).unwrap();

    assert_eq!(assets.read_to_vec("shared-name", &alice).unwrap(), b"alice");
    assert_eq!(assets.read_to_vec("shared-name", &bob).unwrap(), b"bob");

    assets.delete("shared-name", &alice).unwrap();
    assert!(assets.list(&alice).unwrap().is_empty());
    assert_eq!(assets.list(&bob).unwrap(), vec!["shared-name"]);
}

#[test]
fn test_token_renewal_invalidates_previous_value() {
    let vault = TestVault::open();
    vault.user("alice");
    let auth = &vault.services.auth;

    let first = auth.issue_token("alice", "password", "10.0.0.1").unwrap();
    let second = auth.issue_token("alice", "password", "10.0.0.2").unwrap();

    assert_ne!(first, second);
    assert_eq!(auth.get_token(&first).unwrap_err().kind(), ErrorKind::NotFoundAccessToken);

    let token = auth.get_token(&second).unwrap();
    assert_eq!(token.issuing_ip, "10.0.0.2");
    assert!(!token.is_expired(auth.ttl()));
}

#[test]
fn test_bad_credentials_are_terminal() {
    let vault = TestVault::open();
    vault.user("alice");
    let auth = &vault.services.auth;

    assert_eq!(
        auth.issue_token("nobody", "password", "ip").unwrap_err().kind(),
        ErrorKind::UserNotFound
    );
    assert_eq!(
        auth.issue_token("alice", "wrong", "ip").unwrap_err().kind(),
        ErrorKind::InvalidPassword
    );
}

#[test]
fn test_concurrent_users_across_shards() {
    let vault = TestVault::open();
    let owners: Vec<String> = (0..16).map(|i| vault.user(&format!("user-{i}"))).collect();
    let services = vault.services.clone();

    let handles: Vec<_> = owners
        .iter()
        .cloned()
        .map(|owner| {
            let services = Arc::clone(&services);
            std::thread::spawn(move || {
                for i in 0..5 {
                    let data = sample(10_000 + i);
                    services
                        .assets
                        .create(&format!("file-{i}"), &owner, data.as_slice())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for owner in &owners {
        let names = services.assets.list(owner).unwrap();
        assert_eq!(names.len(), 5);
        assert_eq!(services.assets.read_to_vec("file-4", owner).unwrap(), sample(10_004));
    }
}

#[test]
fn test_duplicate_user_is_rejected() {
    let vault = TestVault::open();
    vault.user("alice");
    let err = vault.services.users.create_user("alice", "other").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateUser);
    assert!(vault.services.users.check_user_existence("alice").unwrap());
    assert!(!vault.services.users.check_user_existence("bob").unwrap());
}
