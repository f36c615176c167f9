use serde::{Deserialize, Serialize};

use crate::block::Timestamp;

/// One append-only audit entry. Every key-registry mutation (register,
/// revoke, delete, force delete) emits one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Monotonic sequence number assigned by the catalog.
    pub seq: u64,
    /// Who performed the mutation (owner name or key fingerprint).
    pub actor: String,
    /// Fingerprint of the key the mutation targeted; full keys are never
    /// written to the audit trail.
    pub target_fingerprint: String,
    /// Short verb, e.g. `REGISTER`, `REVOKE`, `DELETE`, `FORCE_DELETE`.
    pub operation: String,
    pub reason: Option<String>,
    pub timestamp: Timestamp,
}
