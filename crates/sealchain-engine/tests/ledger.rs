//! End-to-end ledger scenarios: genesis, append, validation, revocation,
//! rollback, and the transaction-aware tip discipline.
//!
//! Run with:
//!   cargo test -p sealchain-engine --test ledger

use sealchain_engine::{
    AppendOptions, KeyRole, Ledger, LedgerConfig, SealError, SignerKeyPair, ValidationOptions,
};

fn open_ledger() -> (tempfile::TempDir, Ledger, SignerKeyPair) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().unwrap()),
        )
        .try_init();
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(LedgerConfig::new(dir.path())).unwrap();
    let signer = SignerKeyPair::generate();
    ledger
        .register_key(signer.public_key(), "ledger-tests", KeyRole::User, "tests")
        .unwrap();
    (dir, ledger, signer)
}

// ── Genesis and basic appends ────────────────────────────────────────────────

#[test]
fn genesis_plus_two_blocks() {
    let (_dir, ledger, signer) = open_ledger();

    let first = ledger.append(Some("hello"), &signer, &AppendOptions::default()).unwrap();
    let second = ledger.append(Some("world"), &signer, &AppendOptions::default()).unwrap();

    // Implicit genesis + the two user blocks.
    assert_eq!(ledger.block_count(), 3);
    assert_eq!(first.block_number, 1);
    assert_eq!(second.block_number, 2);
    assert_eq!(second.previous_hash, first.hash);
    assert!(second.timestamp >= first.timestamp);

    let genesis = ledger.get_block(0).unwrap().unwrap();
    assert_eq!(genesis.previous_hash, "0".repeat(64));
    assert_eq!(first.previous_hash, genesis.hash);

    let result = ledger.validate_chain(&ValidationOptions::default()).unwrap();
    assert!(result.structurally_intact, "{}", result.report);
    assert!(result.fully_compliant, "{}", result.report);
}

#[test]
fn empty_string_is_a_system_block_null_is_rejected() {
    let (_dir, ledger, signer) = open_ledger();
    assert!(ledger.append(Some(""), &signer, &AppendOptions::default()).is_ok());
    let err = ledger.append(None, &signer, &AppendOptions::default()).unwrap_err();
    assert!(matches!(err, SealError::InvalidInput(_)));
}

#[test]
fn sequential_appends_are_dense_and_ordered() {
    let (_dir, ledger, signer) = open_ledger();
    for _ in 0..20 {
        ledger.append(Some("entry"), &signer, &AppendOptions::default()).unwrap();
    }
    let blocks = ledger.blocks_page(0, 100).unwrap();
    assert_eq!(blocks.len(), 21);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block.block_number, i as i64);
        if i > 0 {
            assert_eq!(block.previous_hash, blocks[i - 1].hash);
            assert!(block.timestamp >= blocks[i - 1].timestamp);
        }
    }
}

// ── Authorization ────────────────────────────────────────────────────────────

#[test]
fn unregistered_signer_is_denied_and_audited() {
    let (_dir, ledger, _signer) = open_ledger();
    let rogue = SignerKeyPair::generate();
    let err = ledger.append(Some("nope"), &rogue, &AppendOptions::default()).unwrap_err();
    assert!(matches!(err, SealError::AuthorizationDenied(_)));
    assert_eq!(ledger.block_count(), 0);

    let ops: Vec<String> = ledger
        .audit_records()
        .unwrap()
        .into_iter()
        .map(|r| r.operation)
        .collect();
    assert!(ops.contains(&"DENY_APPEND".to_string()));
}

#[test]
fn revoked_key_blocks_classified_not_invalid() {
    let (_dir, ledger, signer) = open_ledger();
    let second = SignerKeyPair::generate();
    ledger
        .register_key(second.public_key(), "second", KeyRole::User, "tests")
        .unwrap();

    // Signed while authorized.
    ledger.append(Some("while active"), &signer, &AppendOptions::default()).unwrap();
    let authorized_block = ledger
        .append(Some("also active"), &second, &AppendOptions::default())
        .unwrap();

    // Force-date the revocation *before* a fresh block's timestamp by
    // revoking now and appending after.
    ledger.revoke_key(second.public_key(), "tests", Some("rotation")).unwrap();
    let err = ledger
        .append(Some("after revocation"), &second, &AppendOptions::default())
        .unwrap_err();
    assert!(matches!(err, SealError::AuthorizationDenied(_)));

    // Historical block remains compliant.
    let result = ledger.validate_chain(&ValidationOptions::default()).unwrap();
    assert!(result.is_fully_valid(), "{}", result.report);
    assert!(ledger
        .was_key_authorized_at(second.public_key(), authorized_block.timestamp)
        .unwrap());
}

// ── Encrypted inline payloads ────────────────────────────────────────────────

#[test]
fn password_encrypted_payload_round_trip() {
    let (_dir, ledger, signer) = open_ledger();
    let options = AppendOptions {
        password: Some("correct horse"),
        ..AppendOptions::default()
    };
    let block = ledger.append(Some("the real payload"), &signer, &options).unwrap();
    assert!(block.is_encrypted);
    assert_eq!(block.data, "[ENCRYPTED]");
    assert!(block.encryption_metadata.is_some());

    let plain = ledger
        .decrypt_block_payload(block.block_number, "correct horse")
        .unwrap();
    assert_eq!(plain, "the real payload");

    let err = ledger
        .decrypt_block_payload(block.block_number, "wrong password")
        .unwrap_err();
    assert!(matches!(err, SealError::IntegrityCheckFailed(_)));

    // The chain still validates: the hash commits to the placeholder.
    let result = ledger.validate_chain(&ValidationOptions::default()).unwrap();
    assert!(result.is_fully_valid(), "{}", result.report);
}

// ── Search metadata ──────────────────────────────────────────────────────────

#[test]
fn keyword_caps_reject_before_any_write() {
    let (_dir, ledger, signer) = open_ledger();
    let oversize = "k".repeat(1_025);
    let options = AppendOptions {
        manual_keywords: Some(&oversize),
        ..AppendOptions::default()
    };
    let err = ledger.append(Some("data"), &signer, &options).unwrap_err();
    assert!(matches!(err, SealError::FieldTooLong { field: "manual_keywords", .. }));
    // Nothing was written, not even genesis.
    assert_eq!(ledger.block_count(), 0);

    // Exactly at the limit succeeds.
    let at_limit = "k".repeat(1_024);
    let options = AppendOptions {
        manual_keywords: Some(&at_limit),
        ..AppendOptions::default()
    };
    assert!(ledger.append(Some("data"), &signer, &options).is_ok());
}

#[test]
fn searchable_content_is_derived_and_capped() {
    let (_dir, ledger, signer) = open_ledger();
    let options = AppendOptions {
        manual_keywords: Some("alpha beta"),
        auto_keywords: Some("gamma"),
        content_category: Some("finance"),
        ..AppendOptions::default()
    };
    let block = ledger.append(Some("data"), &signer, &options).unwrap();
    assert_eq!(block.searchable_content.as_deref(), Some("alpha beta gamma"));

    // 1024 + 1 + 1024 = 2049 > 2048: the derived field overflows even though
    // both inputs are individually legal.
    let manual = "m".repeat(1_024);
    let auto = "a".repeat(1_024);
    let options = AppendOptions {
        manual_keywords: Some(&manual),
        auto_keywords: Some(&auto),
        ..AppendOptions::default()
    };
    let err = ledger.append(Some("data"), &signer, &options).unwrap_err();
    assert!(matches!(err, SealError::FieldTooLong { field: "searchable_content", .. }));
}

#[test]
fn metadata_update_touches_only_search_fields() {
    let (_dir, ledger, signer) = open_ledger();
    let block = ledger.append(Some("payload"), &signer, &AppendOptions::default()).unwrap();

    let updated = ledger
        .update_block_metadata(block.block_number, Some("new"), Some("keywords"), Some("ops"))
        .unwrap();
    assert_eq!(updated.searchable_content.as_deref(), Some("new keywords"));
    assert_eq!(updated.hash, block.hash);
    assert_eq!(updated.data, block.data);

    // The hash does not cover search metadata, so the chain still validates.
    let result = ledger.validate_chain(&ValidationOptions::default()).unwrap();
    assert!(result.is_fully_valid(), "{}", result.report);
}

// ── Recipient scope ──────────────────────────────────────────────────────────

#[test]
fn recipient_query_and_validation() {
    let (_dir, ledger, signer) = open_ledger();
    let recipient = SignerKeyPair::generate();

    let options = AppendOptions {
        recipient_public_key: Some(recipient.public_key()),
        ..AppendOptions::default()
    };
    ledger.append(Some("for recipient"), &signer, &options).unwrap();
    ledger.append(Some("broadcast"), &signer, &AppendOptions::default()).unwrap();

    let scoped = ledger.blocks_for_recipient(recipient.public_key()).unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].data, "for recipient");

    let err = ledger
        .append(
            Some("bad recipient"),
            &signer,
            &AppendOptions { recipient_public_key: Some("garbage"), ..AppendOptions::default() },
        )
        .unwrap_err();
    assert!(matches!(err, SealError::InvalidInput(_)));
}

// ── Rollback ─────────────────────────────────────────────────────────────────

#[test]
fn rollback_restores_tip_and_numbering() {
    let (_dir, ledger, signer) = open_ledger();
    for i in 0..10 {
        ledger.append(Some(&format!("entry {i}")), &signer, &AppendOptions::default()).unwrap();
    }
    assert_eq!(ledger.get_last_block().unwrap().unwrap().block_number, 10);

    let removed = ledger.rollback_to_block(5).unwrap();
    assert_eq!(removed, 5);
    assert_eq!(ledger.get_last_block().unwrap().unwrap().block_number, 5);
    assert!(ledger.get_block(6).unwrap().is_none());

    let result = ledger.validate_chain(&ValidationOptions::default()).unwrap();
    assert!(result.is_fully_valid(), "{}", result.report);

    // The next append continues from the new tip.
    let next = ledger.append(Some("after rollback"), &signer, &AppendOptions::default()).unwrap();
    assert_eq!(next.block_number, 6);
}

#[test]
fn rollback_blocks_counts_from_tip() {
    let (_dir, ledger, signer) = open_ledger();
    for _ in 0..5 {
        ledger.append(Some("x"), &signer, &AppendOptions::default()).unwrap();
    }
    assert_eq!(ledger.rollback_blocks(2).unwrap(), 2);
    assert_eq!(ledger.get_last_block().unwrap().unwrap().block_number, 3);
    assert!(matches!(
        ledger.rollback_blocks(99).unwrap_err(),
        SealError::InvalidInput(_)
    ));
}

#[test]
fn clear_chain_preserves_registry() {
    let (_dir, ledger, signer) = open_ledger();
    for _ in 0..3 {
        ledger.append(Some("x"), &signer, &AppendOptions::default()).unwrap();
    }
    ledger.clear_chain().unwrap();
    assert_eq!(ledger.block_count(), 0);
    assert_eq!(ledger.authorized_keys().unwrap().len(), 1);

    // A fresh chain grows from a fresh genesis.
    let block = ledger.append(Some("new era"), &signer, &AppendOptions::default()).unwrap();
    assert_eq!(block.block_number, 1);
}

// ── Streaming vs detailed validation ─────────────────────────────────────────

#[test]
fn streaming_matches_detailed_on_real_chain() {
    let (_dir, ledger, signer) = open_ledger();
    for _ in 0..25 {
        ledger.append(Some("entry"), &signer, &AppendOptions::default()).unwrap();
    }
    let detailed = ledger.validate_chain(&ValidationOptions::default()).unwrap();
    let streaming = ledger.validate_chain_streaming(&ValidationOptions::default()).unwrap();
    assert_eq!(detailed.structurally_intact, streaming.structurally_intact);
    assert_eq!(detailed.fully_compliant, streaming.fully_compliant);
    assert_eq!(detailed.invalid_blocks, streaming.invalid_blocks);
    assert_eq!(detailed.revoked_blocks, streaming.revoked_blocks);
    assert_eq!(detailed.blocks_checked, streaming.blocks_checked);
}
