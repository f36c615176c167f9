use sha3::{Digest, Sha3_256};

/// SHA3-256 of arbitrary bytes as 64-char lowercase hex.
pub fn sha3_hex(data: &[u8]) -> String {
    hex::encode(Sha3_256::digest(data))
}

/// Incremental SHA3-256 for streaming paths (off-chain files are hashed in
/// chunks while being encrypted or decrypted).
pub struct Sha3Stream {
    hasher: Sha3_256,
}

impl Sha3Stream {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl Default for Sha3Stream {
    fn default() -> Self {
        Self::new()
    }
}
