//! Strict filename discipline for the off-chain directory.
//!
//! The store creates only `offchain_<epoch_millis>_<8 hex>.dat`. Anything
//! else found in the directory is treated as external and never touched by
//! deletion or cleanup.

/// Does `name` match `offchain_<digits>_<8 lowercase hex>.dat` exactly?
pub fn is_valid_offchain_filename(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("offchain_") else {
        return false;
    };
    let Some(rest) = rest.strip_suffix(".dat") else {
        return false;
    };
    let Some((millis, entropy)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.len() <= 19
        && millis.bytes().all(|b| b.is_ascii_digit())
        && entropy.len() == 8
        && entropy
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Basename without the `.dat` suffix: the form used for membership tests
/// against the referenced-file set during orphan cleanup.
pub fn offchain_file_stem(path: &str) -> Option<&str> {
    let name = path.rsplit(['/', '\\']).next()?;
    if !is_valid_offchain_filename(name) {
        return None;
    }
    name.strip_suffix(".dat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_store_produced_names() {
        assert!(is_valid_offchain_filename("offchain_1700000000000_0a1b2c3d.dat"));
        assert!(is_valid_offchain_filename("offchain_1_00000000.dat"));
    }

    #[test]
    fn rejects_everything_else() {
        for name in [
            "offchain_1700000000000_0a1b2c3d.tmp",
            "offchain_1700000000000.dat",
            "offchain__0a1b2c3d.dat",
            "offchain_17x0_0a1b2c3d.dat",
            "offchain_1700_0A1B2C3D.dat",
            "offchain_1700_0a1b2c.dat",
            "notes.txt",
            "offchain_1700_0a1b2c3d.dat.bak",
            "../offchain_1700_0a1b2c3d.dat",
        ] {
            assert!(!is_valid_offchain_filename(name), "{name}");
        }
    }

    #[test]
    fn stem_strips_directory_and_extension() {
        assert_eq!(
            offchain_file_stem("/data/off-chain-data/offchain_1700_0a1b2c3d.dat"),
            Some("offchain_1700_0a1b2c3d")
        );
        assert_eq!(offchain_file_stem("/data/off-chain-data/readme.md"), None);
    }
}
