use thiserror::Error;

/// The one error type crossing every public sealchain boundary.
///
/// Variants map onto the operational taxonomy: invalid input, authorization
/// denied, security violation, integrity failure, constraint violation,
/// overflow, I/O, timeout, state conflict, plus the storage/serialization
/// transport failures of the catalog layer.
#[derive(Debug, Error)]
pub enum SealError {
    // ── Input validation ─────────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("field `{field}` exceeds {max} characters (got {got})")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        got: usize,
    },

    #[error("block data exceeds maximum size of {max} bytes (got {got})")]
    DataTooLarge { max: usize, got: usize },

    // ── Authorization / security ─────────────────────────────────────────────
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("security violation: {0}")]
    SecurityViolation(String),

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    // ── Constraints / overflow ───────────────────────────────────────────────
    #[error("constraint violation: duplicate block number {0}")]
    DuplicateBlockNumber(i64),

    #[error("block number space exhausted (i64::MAX reached)")]
    BlockNumberOverflow,

    #[error("chain too large for detailed validation ({count} blocks); use streaming validation")]
    ChainTooLarge { count: u64 },

    // ── Lookups ──────────────────────────────────────────────────────────────
    #[error("block not found: {0}")]
    BlockNotFound(i64),

    #[error("authorized key not found: {0}")]
    KeyNotFound(String),

    // ── State conflicts ──────────────────────────────────────────────────────
    #[error("state conflict: {0}")]
    StateConflict(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
