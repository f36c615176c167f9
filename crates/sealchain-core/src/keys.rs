use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::block::Timestamp;

/// Role attached to a registry entry. Admins may authorize force deletions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyRole {
    Admin,
    User,
}

/// One entry in the key registry.
///
/// Revocation is soft: the entry stays forever so that blocks signed inside
/// its active window keep validating. The same public key may appear in
/// several entries with disjoint active windows (re-registration after
/// revocation).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedKey {
    /// Base64 text form of the Dilithium5 public key.
    pub public_key: String,
    pub owner_name: String,
    pub role: KeyRole,
    /// Fingerprint or name of the caller that registered this key.
    pub created_by: String,
    pub created_at: Timestamp,
    pub is_active: bool,
    pub revoked_at: Option<Timestamp>,
}

impl AuthorizedKey {
    /// Temporal authorization: was this entry's window open at `t`?
    pub fn was_authorized_at(&self, t: Timestamp) -> bool {
        self.created_at <= t && self.revoked_at.map_or(true, |revoked| revoked > t)
    }
}

/// Short, log-safe identifier for a public key: base58 of SHA3-256 over the
/// key text, truncated to 12 characters. Used in audit records so that full
/// keys never appear in the audit trail.
pub fn key_fingerprint(public_key: &str) -> String {
    let digest = Sha3_256::digest(public_key.as_bytes());
    let encoded = bs58::encode(&digest[..]).into_string();
    encoded[..12.min(encoded.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: Timestamp, revoked_at: Option<Timestamp>) -> AuthorizedKey {
        AuthorizedKey {
            public_key: "pk".to_string(),
            owner_name: "owner".to_string(),
            role: KeyRole::User,
            created_by: "tests".to_string(),
            created_at,
            is_active: revoked_at.is_none(),
            revoked_at,
        }
    }

    #[test]
    fn active_entry_covers_creation_onwards() {
        let k = entry(100, None);
        assert!(!k.was_authorized_at(99));
        assert!(k.was_authorized_at(100));
        assert!(k.was_authorized_at(i64::MAX));
    }

    #[test]
    fn revoked_entry_window_is_half_open() {
        let k = entry(100, Some(200));
        assert!(k.was_authorized_at(100));
        assert!(k.was_authorized_at(199));
        // Revocation instant itself is outside the window.
        assert!(!k.was_authorized_at(200));
        assert!(!k.was_authorized_at(201));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = key_fingerprint("some-public-key");
        let b = key_fingerprint("some-public-key");
        let c = key_fingerprint("another-key");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 12);
    }
}
