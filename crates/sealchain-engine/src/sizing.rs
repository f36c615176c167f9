//! Payload disposition: inline on-chain, spilled off-chain, or rejected.

use sealchain_core::SealError;

use crate::engine::LedgerConfig;

/// Where a payload will live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageDisposition {
    OnChain,
    OffChain,
}

/// Validate a payload and decide its disposition.
///
/// `None` is rejected; absent data and empty data are different things, and an
/// empty string is a legitimate system block. Data over the byte ceiling is
/// rejected outright. Data at or above the off-chain threshold, or over the
/// inline character ceiling, spills off-chain.
pub fn validate_and_determine_storage(
    data: Option<&str>,
    config: &LedgerConfig,
) -> Result<StorageDisposition, SealError> {
    let data = data.ok_or_else(|| {
        SealError::InvalidInput(
            "block data must not be null; use an empty string for a system block".into(),
        )
    })?;

    let bytes = data.len();
    if bytes > config.max_block_data_bytes {
        return Err(SealError::DataTooLarge {
            max: config.max_block_data_bytes,
            got: bytes,
        });
    }
    if bytes >= config.off_chain_threshold_bytes {
        return Ok(StorageDisposition::OffChain);
    }
    if data.chars().count() > config.max_inline_chars {
        return Ok(StorageDisposition::OffChain);
    }
    Ok(StorageDisposition::OnChain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LedgerConfig {
        let mut config = LedgerConfig::new("/tmp/sealchain-sizing-tests");
        config.off_chain_threshold_bytes = 1_024;
        config.max_block_data_bytes = 4_096;
        config.max_inline_chars = 500;
        config
    }

    #[test]
    fn null_data_rejected_empty_allowed() {
        let config = config();
        assert!(matches!(
            validate_and_determine_storage(None, &config),
            Err(SealError::InvalidInput(_))
        ));
        assert_eq!(
            validate_and_determine_storage(Some(""), &config).unwrap(),
            StorageDisposition::OnChain
        );
    }

    #[test]
    fn byte_threshold_spills() {
        let config = config();
        let just_under = "x".repeat(500);
        assert_eq!(
            validate_and_determine_storage(Some(&just_under), &config).unwrap(),
            StorageDisposition::OnChain
        );
        let at_threshold = "x".repeat(1_024);
        assert_eq!(
            validate_and_determine_storage(Some(&at_threshold), &config).unwrap(),
            StorageDisposition::OffChain
        );
    }

    #[test]
    fn char_ceiling_spills_multibyte_text() {
        let config = config();
        // 501 two-byte characters = 1002 bytes: under the byte threshold,
        // over the character ceiling.
        let text = "é".repeat(501);
        assert!(text.len() < config.off_chain_threshold_bytes);
        assert_eq!(
            validate_and_determine_storage(Some(&text), &config).unwrap(),
            StorageDisposition::OffChain
        );
    }

    #[test]
    fn oversize_data_rejected() {
        let config = config();
        let too_big = "x".repeat(4_097);
        assert!(matches!(
            validate_and_determine_storage(Some(&too_big), &config),
            Err(SealError::DataTooLarge { .. })
        ));
    }
}
