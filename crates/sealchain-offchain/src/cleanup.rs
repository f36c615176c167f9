//! Orphan reconciliation for the off-chain directory.
//!
//! An orphan is a store-produced file whose basename is no longer referenced
//! by any catalog row: the leftover of a crash between file write and
//! transaction rollback, or of a delete whose unlink failed. Cleanup is
//! idempotent and never touches external files.

use std::collections::HashSet;
use std::fs;

use tracing::{debug, info, warn};

use sealchain_core::{
    SealError, CLEANUP_MAX_DELETES_PER_CYCLE, CLEANUP_MIN_FREE_DISK_BYTES,
    CLEANUP_WARN_TRACKED_ITEMS,
};

use crate::filename::is_valid_offchain_filename;
use crate::store::OffChainStore;

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Unlink at most this many files per cycle to bound I/O.
    pub max_deletes_per_cycle: usize,
    /// Skip the cycle entirely below this much free disk space.
    pub min_free_disk_bytes: u64,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            max_deletes_per_cycle: CLEANUP_MAX_DELETES_PER_CYCLE,
            min_free_disk_bytes: CLEANUP_MIN_FREE_DISK_BYTES,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// False when the cycle was skipped (low disk space).
    pub ran: bool,
    pub scanned: u64,
    pub ignored_external: u64,
    pub deleted: u64,
    /// True when the per-cycle cap stopped the sweep early.
    pub capped: bool,
}

/// Sweep the store directory, unlinking store-produced files whose stem is
/// absent from `referenced` (basenames without the `.dat` suffix, as
/// produced from the catalog's recorded file paths).
pub fn cleanup_orphans(
    store: &OffChainStore,
    referenced: &HashSet<String>,
    options: &CleanupOptions,
) -> Result<CleanupReport, SealError> {
    let mut report = CleanupReport::default();

    let free = fs2::available_space(store.dir())?;
    if free < options.min_free_disk_bytes {
        warn!(
            free_bytes = free,
            required = options.min_free_disk_bytes,
            "skipping orphan cleanup: insufficient free disk space"
        );
        return Ok(report);
    }
    report.ran = true;

    if referenced.len() > CLEANUP_WARN_TRACKED_ITEMS {
        warn!(
            tracked = referenced.len(),
            "orphan cleanup tracking an unusually large referenced set"
        );
    }

    let canonical_dir = store.dir().canonicalize()?;
    for entry in fs::read_dir(store.dir())? {
        let entry = entry?;
        report.scanned += 1;

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            report.ignored_external += 1;
            continue;
        };
        if !is_valid_offchain_filename(name) {
            report.ignored_external += 1;
            continue;
        }
        let Ok(canonical) = entry.path().canonicalize() else {
            report.ignored_external += 1;
            continue;
        };
        if !canonical.starts_with(&canonical_dir) {
            report.ignored_external += 1;
            continue;
        }

        let stem = name.trim_end_matches(".dat");
        if referenced.contains(stem) {
            continue;
        }

        if report.deleted as usize >= options.max_deletes_per_cycle {
            report.capped = true;
            debug!(cap = options.max_deletes_per_cycle, "orphan cleanup cap reached");
            break;
        }
        match fs::remove_file(&canonical) {
            Ok(()) => {
                report.deleted += 1;
                debug!(file = name, "orphan off-chain file removed");
            }
            Err(e) => warn!(file = name, error = %e, "failed to remove orphan file"),
        }
    }

    info!(
        scanned = report.scanned,
        deleted = report.deleted,
        ignored = report.ignored_external,
        capped = report.capped,
        "orphan cleanup cycle complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn setup() -> (tempfile::TempDir, OffChainStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = OffChainStore::open(dir.path().join("off-chain-data")).unwrap();
        (dir, store)
    }

    #[test]
    fn removes_orphans_keeps_referenced_and_external() {
        let (_dir, store) = setup();
        let referenced_file = store.dir().join("offchain_100_aaaaaaaa.dat");
        let orphan_file = store.dir().join("offchain_200_bbbbbbbb.dat");
        let external_file = store.dir().join("notes.txt");
        touch(&referenced_file);
        touch(&orphan_file);
        touch(&external_file);

        let referenced: HashSet<String> = ["offchain_100_aaaaaaaa".to_string()].into();
        let report = cleanup_orphans(&store, &referenced, &CleanupOptions::default()).unwrap();

        assert!(report.ran);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.ignored_external, 1);
        assert!(referenced_file.exists());
        assert!(!orphan_file.exists());
        assert!(external_file.exists());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (_dir, store) = setup();
        touch(&store.dir().join("offchain_300_cccccccc.dat"));

        let referenced = HashSet::new();
        let first = cleanup_orphans(&store, &referenced, &CleanupOptions::default()).unwrap();
        let second = cleanup_orphans(&store, &referenced, &CleanupOptions::default()).unwrap();
        assert_eq!(first.deleted, 1);
        assert_eq!(second.deleted, 0);
    }

    #[test]
    fn per_cycle_cap_bounds_deletions() {
        let (_dir, store) = setup();
        for i in 0..5 {
            touch(&store.dir().join(format!("offchain_{i}_dddddddd.dat")));
        }
        let options = CleanupOptions {
            max_deletes_per_cycle: 2,
            ..CleanupOptions::default()
        };
        let report = cleanup_orphans(&store, &HashSet::new(), &options).unwrap();
        assert_eq!(report.deleted, 2);
        assert!(report.capped);

        // The next cycles finish the job.
        let report = cleanup_orphans(&store, &HashSet::new(), &options).unwrap();
        assert_eq!(report.deleted, 2);
        let report = cleanup_orphans(&store, &HashSet::new(), &options).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(!report.capped);
    }

    #[test]
    fn low_disk_space_skips_cycle() {
        let (_dir, store) = setup();
        touch(&store.dir().join("offchain_1_eeeeeeee.dat"));
        let options = CleanupOptions {
            min_free_disk_bytes: u64::MAX,
            ..CleanupOptions::default()
        };
        let report = cleanup_orphans(&store, &HashSet::new(), &options).unwrap();
        assert!(!report.ran);
        assert_eq!(report.deleted, 0);
        assert!(store.dir().join("offchain_1_eeeeeeee.dat").exists());
    }
}
