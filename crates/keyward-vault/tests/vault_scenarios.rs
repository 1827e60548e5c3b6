//! End-to-end vault behaviour over a shared store.

use std::sync::Arc;

use chrono::DateTime;
use keyward_store::{KvStore, MemoryStore, SqliteStore};
use keyward_vault::audit::AuditCategory;
use keyward_vault::{
    AuditLog, Cipher, Credential, KeyMaterial, MemoryAuditSink, OwnershipValidator, TenantIdentity,
    TokenGrant, Vault, VaultError, VaultOptions,
};

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";

struct Harness {
    vault: Arc<Vault>,
    keys: Arc<KeyMaterial>,
    store: Arc<dyn KvStore>,
    sink: Arc<MemoryAuditSink>,
}

fn harness_over(store: Arc<dyn KvStore>) -> Harness {
    let keys = Arc::new(KeyMaterial::from_bytes(&[11u8; 32], &[22u8; 32]).unwrap());
    let sink = Arc::new(MemoryAuditSink::new());
    let vault = Vault::new(
        Arc::clone(&keys),
        Arc::clone(&store),
        AuditLog::new(sink.clone()),
        VaultOptions::default(),
    )
    .unwrap();
    Harness {
        vault: Arc::new(vault),
        keys,
        store,
        sink,
    }
}

fn harness() -> Harness {
    harness_over(Arc::new(MemoryStore::new()))
}

fn credential_for(owner: &str) -> Credential {
    let grant = TokenGrant {
        access_token: format!("ya29.access-for-{owner}"),
        refresh_token: format!("1//refresh-for-{owner}"),
        expires_at: DateTime::from_timestamp_millis(1_760_003_600_123).unwrap(),
        scope: "https://www.googleapis.com/auth/gmail.readonly".into(),
    };
    Credential::from_grant(grant, &TenantIdentity::from(owner), owner)
}

async fn raw_record(h: &Harness, identity: &TenantIdentity) -> serde_json::Value {
    let address = h.vault.address_of(identity).unwrap();
    let raw = h.store.get(address.as_str()).await.unwrap().unwrap();
    serde_json::from_str(&raw).unwrap()
}

async fn overwrite_record(h: &Harness, identity: &TenantIdentity, record: &serde_json::Value) {
    let address = h.vault.address_of(identity).unwrap();
    h.store
        .put(address.as_str(), record.to_string(), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn store_then_retrieve_returns_identical_credential() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    let credential = credential_for(ALICE);

    h.vault.store(&alice, &credential).await.unwrap();
    let restored = h.vault.retrieve(&alice).await.unwrap();

    assert_eq!(restored, credential);
    assert_eq!(restored.expires_at.timestamp_millis(), 1_760_003_600_123);
}

#[tokio::test]
async fn garbage_owner_hash_fails_session_validation() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    h.vault.store(&alice, &credential_for(ALICE)).await.unwrap();

    let mut record = raw_record(&h, &alice).await;
    record["user_id_hash"] = serde_json::Value::from("f".repeat(64));
    overwrite_record(&h, &alice, &record).await;

    let err = h.vault.retrieve(&alice).await.unwrap_err();
    assert!(matches!(err, VaultError::SessionValidation), "{err:?}");
}

#[tokio::test]
async fn tampered_ciphertext_fails_decryption() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    h.vault.store(&alice, &credential_for(ALICE)).await.unwrap();

    let mut record = raw_record(&h, &alice).await;
    let ciphertext = record["ciphertext"].as_str().unwrap().to_string();
    let mut chars: Vec<char> = ciphertext.chars().collect();
    chars[4] = if chars[4] == 'A' { 'B' } else { 'A' };
    record["ciphertext"] = serde_json::Value::from(chars.into_iter().collect::<String>());
    overwrite_record(&h, &alice, &record).await;

    let err = h.vault.retrieve(&alice).await.unwrap_err();
    assert!(matches!(err, VaultError::Decryption { .. }), "{err:?}");
    assert_eq!(
        h.sink.events_in(AuditCategory::SecurityViolation)[0].text("reason"),
        Some("decryption failed")
    );
}

#[tokio::test]
async fn tenants_are_isolated() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    let bob = TenantIdentity::from(BOB);
    h.vault.store(&alice, &credential_for(ALICE)).await.unwrap();
    h.vault.store(&bob, &credential_for(BOB)).await.unwrap();

    assert_eq!(h.vault.retrieve(&alice).await.unwrap().owner_id, alice);
    assert_eq!(h.vault.retrieve(&bob).await.unwrap().owner_id, bob);

    let bob_record = raw_record(&h, &bob).await;
    let bob_envelope = keyward_vault::Envelope::from_json(&bob_record.to_string()).unwrap();
    let validator = OwnershipValidator::new(Arc::clone(&h.keys), AuditLog::noop());
    assert!(!validator.validate_stored_hash(&alice, &bob_envelope));
}

#[tokio::test]
async fn copied_record_is_rejected_before_decryption() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    let bob = TenantIdentity::from(BOB);
    h.vault.store(&bob, &credential_for(BOB)).await.unwrap();

    // Replay bob's record at alice's address.
    let bob_record = raw_record(&h, &bob).await;
    overwrite_record(&h, &alice, &bob_record).await;

    let err = h.vault.retrieve(&alice).await.unwrap_err();
    assert!(matches!(err, VaultError::SessionValidation), "{err:?}");
}

#[tokio::test]
async fn reencrypted_foreign_plaintext_fails_ownership() {
    let h = harness();
    let bob = TenantIdentity::from(BOB);

    // Alice's plaintext sealed under bob's owner hash and placed at bob's
    // address passes the hash and tag checks.
    let cipher = Cipher::new(Arc::clone(&h.keys));
    let forged = cipher.encrypt(&credential_for(ALICE), &bob).unwrap();
    let address = h.vault.address_of(&bob).unwrap();
    h.store
        .put(address.as_str(), forged.to_json().unwrap(), None)
        .await
        .unwrap();

    let err = h.vault.retrieve(&bob).await.unwrap_err();
    match err {
        VaultError::Ownership { expected, actual } => {
            assert_eq!(expected, BOB);
            assert_eq!(actual, ALICE);
        }
        other => panic!("expected ownership error, got {other:?}"),
    }

    let violation = &h.sink.events_in(AuditCategory::SecurityViolation)[0];
    assert_eq!(violation.text("reason"), Some("ownership mismatch"));
    assert_eq!(violation.text("embedded_owner"), Some(ALICE));
}

#[tokio::test]
async fn foreign_credential_stored_through_vault_fails_ownership() {
    let h = harness();
    let bob = TenantIdentity::from(BOB);
    h.vault.store(&bob, &credential_for(ALICE)).await.unwrap();

    assert!(matches!(
        h.vault.retrieve(&bob).await,
        Err(VaultError::Ownership { .. })
    ));
}

#[tokio::test]
async fn concurrent_stores_for_distinct_tenants() {
    let h = harness();

    let mut handles = Vec::new();
    for i in 0..100 {
        let vault = Arc::clone(&h.vault);
        handles.push(tokio::spawn(async move {
            let owner = format!("user{i}@example.com");
            vault
                .store(&TenantIdentity::from(owner.as_str()), &credential_for(&owner))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut nonces = std::collections::HashSet::new();
    for i in 0..100 {
        let owner = format!("user{i}@example.com");
        let identity = TenantIdentity::from(owner.as_str());
        let restored = h.vault.retrieve(&identity).await.unwrap();
        assert_eq!(restored, credential_for(&owner));

        let record = raw_record(&h, &identity).await;
        nonces.insert(record["iv"].as_str().unwrap().to_string());
    }
    assert_eq!(nonces.len(), 100);
}

#[tokio::test]
async fn storage_reveals_no_identity_or_secret() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    let credential = credential_for(ALICE);
    h.vault.store(&alice, &credential).await.unwrap();

    let address = h.vault.address_of(&alice).unwrap();
    assert!(!address.as_str().contains("alice"));

    let raw = h.store.get(address.as_str()).await.unwrap().unwrap();
    assert!(!raw.contains("alice"));
    assert!(!raw.contains(&credential.access_token));
    assert!(!raw.contains(&credential.refresh_token));
}

#[tokio::test]
async fn audit_trail_never_carries_tokens() {
    let h = harness();
    let alice = TenantIdentity::from(ALICE);
    let bob = TenantIdentity::from(BOB);
    let credential = credential_for(ALICE);

    h.vault.complete_authorization(&alice, &credential).await.unwrap();
    h.vault.store_refreshed(&alice, &credential).await.unwrap();
    h.vault.retrieve(&alice).await.unwrap();
    let _ = h.vault.retrieve(&bob).await;
    h.vault.revoke(&alice).await.unwrap();

    let events = h.sink.events();
    assert!(events.len() >= 5);
    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains(&credential.access_token), "{json}");
        assert!(!json.contains(&credential.refresh_token), "{json}");
    }
}

#[tokio::test]
async fn sqlite_backed_vault_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");
    let alice = TenantIdentity::from(ALICE);
    let credential = credential_for(ALICE);

    {
        let h = harness_over(Arc::new(SqliteStore::open(&path).unwrap()));
        h.vault.store(&alice, &credential).await.unwrap();
    }

    let h = harness_over(Arc::new(SqliteStore::open(&path).unwrap()));
    assert_eq!(h.vault.retrieve(&alice).await.unwrap(), credential);
}

#[tokio::test]
async fn different_keys_cannot_find_record() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let h = harness_over(Arc::clone(&store));
    let alice = TenantIdentity::from(ALICE);
    h.vault.store(&alice, &credential_for(ALICE)).await.unwrap();

    let other = Vault::new(
        Arc::new(KeyMaterial::generate().unwrap()),
        store,
        AuditLog::noop(),
        VaultOptions::default(),
    )
    .unwrap();
    assert!(matches!(
        other.retrieve(&alice).await,
        Err(VaultError::NotFound)
    ));
}
