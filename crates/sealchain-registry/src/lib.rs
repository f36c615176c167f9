//! Key registry: the authorized-signer lifecycle.
//!
//! Entries are never edited destructively by normal operation; revocation
//! is soft, preserving the historical window so old blocks keep validating.
//! Permanent removal exists only through the three-level deletion path:
//! impact analysis (read-only), safe delete (refuses when blocks reference
//! the key), and the engine's authorized force delete (admin-signed, may
//! knowingly orphan blocks).
//!
//! Callers serialize mutations through the engine's writer lock; this
//! service itself only validates and persists.

use std::sync::Arc;

use tracing::{info, warn};

use sealchain_catalog::CatalogStore;
use sealchain_core::{
    key_fingerprint, require_max_chars, AuditRecord, AuthorizedKey, KeyRole, SealError,
    Timestamp, MAX_AUDIT_REASON_CHARS, MAX_OWNER_NAME_CHARS,
};
use sealchain_crypto::decode_public_key;

/// Read-only answer to "what would deleting this key break?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeletionImpact {
    /// Registry entries (across all active windows) for the key.
    pub registry_entries: u64,
    /// Blocks whose `signer_public_key` is this key.
    pub blocks_signed: u64,
    /// True when deletion would leave no block without a registry entry.
    pub can_delete_safely: bool,
}

pub struct KeyRegistry {
    store: Arc<CatalogStore>,
}

impl KeyRegistry {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }

    // ── Registration and revocation ──────────────────────────────────────────

    /// Register a public key as an authorized signer from `now` onwards.
    pub fn register_key(
        &self,
        public_key: &str,
        owner_name: &str,
        role: KeyRole,
        created_by: &str,
        now: Timestamp,
    ) -> Result<AuthorizedKey, SealError> {
        decode_public_key(public_key)?;
        require_max_chars("owner_name", owner_name, MAX_OWNER_NAME_CHARS)?;

        if self.active_entry(public_key)?.is_some() {
            return Err(SealError::StateConflict(format!(
                "key {} already has an active registration",
                key_fingerprint(public_key)
            )));
        }

        let entry = AuthorizedKey {
            public_key: public_key.to_string(),
            owner_name: owner_name.to_string(),
            role,
            created_by: created_by.to_string(),
            created_at: now,
            is_active: true,
            revoked_at: None,
        };
        self.store.put_key(&entry)?;
        self.audit(created_by, public_key, "REGISTER", None, now)?;
        info!(
            key = %key_fingerprint(public_key),
            owner = owner_name,
            ?role,
            "authorized key registered"
        );
        Ok(entry)
    }

    /// Soft-revoke the active registration. Blocks signed inside the closed
    /// window keep validating.
    pub fn revoke_key(
        &self,
        public_key: &str,
        actor: &str,
        reason: Option<&str>,
        now: Timestamp,
    ) -> Result<AuthorizedKey, SealError> {
        if let Some(reason) = reason {
            require_max_chars("change_reason", reason, MAX_AUDIT_REASON_CHARS)?;
        }
        let mut entry = self
            .active_entry(public_key)?
            .ok_or_else(|| SealError::KeyNotFound(key_fingerprint(public_key)))?;
        entry.is_active = false;
        entry.revoked_at = Some(now);
        self.store.put_key(&entry)?;
        self.audit(actor, public_key, "REVOKE", reason, now)?;
        info!(key = %key_fingerprint(public_key), "authorized key revoked");
        Ok(entry)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// The currently-active registration for `public_key`, if any.
    pub fn active_entry(&self, public_key: &str) -> Result<Option<AuthorizedKey>, SealError> {
        Ok(self
            .store
            .keys_for_public_key(public_key)?
            .into_iter()
            .find(|e| e.is_active))
    }

    /// Temporal authorization: did any registration window for `public_key`
    /// cover the instant `t`?
    pub fn was_key_authorized_at(&self, public_key: &str, t: Timestamp) -> Result<bool, SealError> {
        Ok(self
            .store
            .keys_for_public_key(public_key)?
            .iter()
            .any(|e| e.was_authorized_at(t)))
    }

    pub fn all_keys(&self) -> Result<Vec<AuthorizedKey>, SealError> {
        self.store.all_keys()
    }

    // ── Three-level deletion ─────────────────────────────────────────────────

    /// Level 1: read-only impact analysis.
    pub fn deletion_impact(&self, public_key: &str) -> Result<KeyDeletionImpact, SealError> {
        let registry_entries = self.store.keys_for_public_key(public_key)?.len() as u64;
        let blocks_signed = self.store.blocks_signed_by(public_key)?;
        Ok(KeyDeletionImpact {
            registry_entries,
            blocks_signed,
            can_delete_safely: blocks_signed == 0,
        })
    }

    /// Level 2: safe delete. Refuses when any historical block references
    /// the key; use the engine's authorized force delete to override.
    pub fn delete_key_safe(
        &self,
        public_key: &str,
        actor: &str,
        now: Timestamp,
    ) -> Result<u64, SealError> {
        let impact = self.deletion_impact(public_key)?;
        if impact.registry_entries == 0 {
            return Err(SealError::KeyNotFound(key_fingerprint(public_key)));
        }
        if !impact.can_delete_safely {
            return Err(SealError::StateConflict(format!(
                "key {} signed {} block(s); deleting it would orphan them. Revoke instead, \
                 or use the authorized force delete",
                key_fingerprint(public_key),
                impact.blocks_signed
            )));
        }
        let removed = self.remove_entries(public_key)?;
        self.audit(actor, public_key, "DELETE", None, now)?;
        info!(key = %key_fingerprint(public_key), entries = removed, "authorized key deleted");
        Ok(removed)
    }

    /// Level 3 support: unconditional removal. Only the engine's
    /// authorized-deletion path may call this, after verifying the admin
    /// mandate and taking an emergency snapshot.
    pub fn delete_key_unchecked(
        &self,
        public_key: &str,
        actor: &str,
        reason: &str,
        now: Timestamp,
    ) -> Result<u64, SealError> {
        let impact = self.deletion_impact(public_key)?;
        if impact.registry_entries == 0 {
            return Err(SealError::KeyNotFound(key_fingerprint(public_key)));
        }
        if impact.blocks_signed > 0 {
            warn!(
                key = %key_fingerprint(public_key),
                blocks = impact.blocks_signed,
                "force delete is orphaning signed blocks"
            );
        }
        let removed = self.remove_entries(public_key)?;
        self.audit(actor, public_key, "FORCE_DELETE", Some(reason), now)?;
        Ok(removed)
    }

    fn remove_entries(&self, public_key: &str) -> Result<u64, SealError> {
        let entries = self.store.keys_for_public_key(public_key)?;
        let removed = entries.len() as u64;
        for entry in entries {
            self.store.remove_key(&entry.public_key, entry.created_at)?;
        }
        Ok(removed)
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    fn audit(
        &self,
        actor: &str,
        target_public_key: &str,
        operation: &str,
        reason: Option<&str>,
        now: Timestamp,
    ) -> Result<(), SealError> {
        self.store.append_audit(AuditRecord {
            seq: 0,
            actor: actor.to_string(),
            target_fingerprint: key_fingerprint(target_public_key),
            operation: operation.to_string(),
            reason: reason.map(String::from),
            timestamp: now,
        })?;
        Ok(())
    }
}
