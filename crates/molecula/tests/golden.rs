//! Golden and end-to-end tests.
//!
//! Every implementation of Molecula must derive identical:
//! - secrets and bundle hashes from a seed phrase
//! - private keys and addresses from (secret, token, position)
//! - molecular hashes from the same atoms
//!
//! and must reject any molecule whose hash, signature or balances were
//! tampered with.

use molecula::core::{
    meta_from_pairs, Atom, Callback, Comparison, Condition, CoreError, Isotope, Molecule, PolicyMeta,
    Rule, Secret, SignOptions, SignatureError, TransferError, Wallet, AUTH_TOKEN, IDENTITY_TOKEN,
};
use molecula::{Composer, ComposerConfig, MemorySink, SdkError, SubmitResult};
use molecula_testkit::vectors::{
    golden_transfer, verify_all_vectors, GOLDEN_BUNDLE, GOLDEN_SEED, GOLDEN_TRANSFER_HASH,
};
use molecula_testkit::{signed_transfer_from_params, TestFixture, TransferParams};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

fn signed_golden_transfer(compressed: bool) -> Molecule {
    let mut molecule = golden_transfer().unwrap();
    molecule
        .sign(SignOptions {
            anonymous: false,
            compressed,
        })
        .unwrap();
    molecule
}

#[test]
fn test_golden_wallet_vectors() {
    for (name, matches, address) in verify_all_vectors() {
        assert!(matches, "vector '{}' derived {}", name, address);
    }
    assert_eq!(Secret::from_seed(GOLDEN_SEED).bundle_hash(), GOLDEN_BUNDLE);
}

#[test]
fn test_full_balance_transfer_passes() {
    let molecule = signed_golden_transfer(true);
    assert_eq!(molecule.molecular_hash.as_deref(), Some(GOLDEN_TRANSFER_HASH));
    assert_eq!(molecule.bundle.as_deref(), Some(GOLDEN_BUNDLE));

    let sender = molecule.source_wallet.clone().unwrap();
    molecule.check(Some(&sender)).unwrap();
}

#[test]
fn test_overwritten_hash_fails() {
    let mut molecule = signed_golden_transfer(true);
    molecule.molecular_hash = Some("1".repeat(64));
    assert!(matches!(
        molecule.check(None).unwrap_err(),
        CoreError::Signature(SignatureError::HashMismatch { .. })
    ));
}

#[test]
fn test_tampered_fragment_fails() {
    let molecule = signed_golden_transfer(false);
    let mut json: serde_json::Value = serde_json::from_str(&molecule.to_json(true).unwrap()).unwrap();

    let fragment = json["atoms"][0]["otsFragment"].as_str().unwrap().to_string();
    let flipped = if fragment.starts_with('0') { '1' } else { '0' };
    let tampered = format!("{}{}", flipped, &fragment[1..]);
    json["atoms"][0]["otsFragment"] = json!(tampered);

    let restored = Molecule::from_json(&json.to_string()).unwrap();
    assert!(matches!(
        restored.check(None).unwrap_err(),
        CoreError::Signature(SignatureError::Mismatch { .. })
    ));
}

#[test]
fn test_unbalanced_transfer_fails() {
    let secret = Secret::from_seed(GOLDEN_SEED);
    let source = Wallet::new(&secret, "TEST", Some("1".repeat(64).as_str()))
        .unwrap()
        .with_balance(Decimal::new(1000, 0));
    let recipient = Wallet::new(&Secret::from_seed("RECIPIENT"), "TEST", Some("2".repeat(64).as_str())).unwrap();
    let remainder = Wallet::new(&secret, "TEST", Some("3".repeat(64).as_str())).unwrap();

    let mut molecule = Molecule::new(secret, source.clone()).unwrap();
    molecule
        .add_atom(Atom::create(Isotope::V, &source, Some(Decimal::new(-1000, 0)), None, None, vec![], None))
        .add_atom(Atom::create(Isotope::V, &recipient, Some(Decimal::new(500, 0)), None, None, vec![], None))
        .add_atom(Atom::create(Isotope::V, &remainder, Some(Decimal::ZERO), None, None, vec![], None));
    molecule.sign(SignOptions::default()).unwrap();

    match molecule.check(Some(&source)).unwrap_err() {
        CoreError::Transfer(TransferError::Unbalanced { sum }) => {
            assert_eq!(sum, Decimal::new(-500, 0))
        }
        other => panic!("expected Unbalanced, got {:?}", other),
    }
}

#[test]
fn test_json_roundtrip_keeps_validity() {
    let molecule = signed_golden_transfer(true);
    let json = molecule.to_json(true).unwrap();
    assert!(!json.contains(Secret::from_seed(GOLDEN_SEED).as_str()));

    let restored = Molecule::from_json(&json).unwrap();
    assert_eq!(restored.atoms(), molecule.atoms());
    restored.check(restored.source_wallet.as_ref()).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_exported_transfers_validate(params: TransferParams) {
        let molecule = signed_transfer_from_params(&params);
        let restored = Molecule::from_json(&molecule.to_json(true).unwrap()).unwrap();
        prop_assert_eq!(restored.molecular_hash.clone(), molecule.molecular_hash.clone());
        prop_assert!(restored.check(Some(&params.source())).is_ok());
    }
}

// =============================================================================
// COMPOSER FLOWS
// =============================================================================

#[tokio::test]
async fn test_identity_flows_are_accepted() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let fixture = TestFixture::with_seed("FLOWS");
    let composer = fixture.composer();

    composer
        .write_meta(
            fixture.wallet(IDENTITY_TOKEN, "meta"),
            "profile",
            "flows",
            meta_from_pairs([("name", "Flows"), ("pubkey", "pk")]),
            Some(&PolicyMeta::default()),
        )
        .await
        .unwrap();

    composer
        .create_token(
            fixture.wallet(IDENTITY_TOKEN, "token"),
            &fixture.wallet("FLOW", "issued"),
            Decimal::new(1_000_000, 0),
            meta_from_pairs([("name", "Flow token")]),
        )
        .await
        .unwrap();

    composer
        .create_wallet(fixture.wallet(IDENTITY_TOKEN, "wallet"), &fixture.wallet("FLOW", "second"))
        .await
        .unwrap();

    let meta = meta_from_pairs([("position", "5".repeat(64)), ("bundle", fixture.bundle())]);
    composer
        .request_tokens(fixture.wallet(IDENTITY_TOKEN, "request"), "FLOW", Decimal::new(10, 0), "wallet", "w1", meta)
        .await
        .unwrap();

    let rule = Rule::new(
        vec![Condition {
            key: "score".into(),
            value: json!(90),
            comparison: Comparison::GreaterOrEqual,
        }],
        vec![Callback::new("reject")],
    )
    .unwrap();
    composer
        .create_rule(fixture.wallet(IDENTITY_TOKEN, "rule"), &[rule], "profile", "flows", None)
        .await
        .unwrap();

    composer
        .request_authorization(fixture.wallet(AUTH_TOKEN, "auth"), meta_from_pairs([("pubkey", "pk")]))
        .await
        .unwrap();

    let submitted = composer.list_molecules().await.unwrap();
    assert_eq!(submitted.len(), 6);
    for molecule in &submitted {
        molecule.check(None).unwrap();
    }
}

#[tokio::test]
async fn test_transfer_chain_through_remainders() {
    let alice = TestFixture::with_seed("ALICE");
    let bob = TestFixture::with_seed("BOB");
    let composer = alice.composer();

    let first = composer
        .transfer(alice.funded_wallet("TEST", "main", 100), &bob.wallet("TEST", "a"), Decimal::new(30, 0))
        .await
        .unwrap();

    // The remainder wallet is the next source; its balance is what was left.
    let next = first.remainder_wallet.clone().unwrap().with_balance(Decimal::new(70, 0));
    composer
        .transfer(next, &bob.wallet("TEST", "b"), Decimal::new(70, 0))
        .await
        .unwrap();

    assert_eq!(composer.list_molecules().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ingest_detects_position_reuse() {
    let alice = TestFixture::with_seed("ALICE");
    let bob = TestFixture::with_seed("BOB");
    let source = alice.funded_wallet("TEST", "main", 100);

    let honest = alice.make_transfer(source.clone(), &bob.wallet("TEST", "a"), Decimal::new(10, 0));
    let reuse = alice.make_transfer(source.clone(), &bob.wallet("TEST", "b"), Decimal::new(20, 0));

    let node = Composer::new(Secret::random(), MemorySink::new(), ComposerConfig::default());
    assert!(matches!(
        node.ingest(&honest, Some(&source)).await.unwrap(),
        SubmitResult::Accepted(_)
    ));
    match node.ingest(&reuse, Some(&source)).await.unwrap() {
        SubmitResult::PositionSpent { existing, .. } => {
            assert_eq!(Some(existing), honest.molecular_hash)
        }
        other => panic!("expected PositionSpent, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ingest_without_validation() {
    let config = ComposerConfig {
        validate_on_ingest: false,
        ..ComposerConfig::default()
    };
    let node = Composer::new(Secret::random(), MemorySink::new(), config);

    let mut molecule = signed_golden_transfer(true);
    molecule.molecular_hash = Some("1".repeat(64));
    assert!(matches!(
        node.ingest(&molecule, None).await.unwrap(),
        SubmitResult::Accepted(_)
    ));

    let strict = Composer::new(Secret::random(), MemorySink::new(), ComposerConfig::default());
    assert!(matches!(
        strict.ingest(&molecule, None).await.unwrap_err(),
        SdkError::Core(CoreError::Signature(_))
    ));
}

#[tokio::test]
async fn test_missing_molecule() {
    let composer = TestFixture::with_seed("EMPTY").composer();
    assert!(matches!(
        composer.get_molecule(GOLDEN_TRANSFER_HASH).await.unwrap_err(),
        SdkError::NotFound(_)
    ));
}
