// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Eviction: age-based sweeps and full wipes.

use std::fs::{self, DirEntry};
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::store::{AssetStore, Partition};

/// Short-lived entries (glyphs) live for 2 days.
pub const SHORT_LIVED_TTL: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Long-lived entries (icons, bundles) live for 14 days.
pub const LONG_LIVED_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Time-to-live per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ttls {
    pub short_lived: Duration,
    pub long_lived: Duration,
}

impl Ttls {
    pub fn for_partition(&self, partition: Partition) -> Duration {
        match partition {
            Partition::ShortLived => self.short_lived,
            Partition::LongLived => self.long_lived,
        }
    }
}

impl Default for Ttls {
    fn default() -> Self {
        Self {
            short_lived: SHORT_LIVED_TTL,
            long_lived: LONG_LIVED_TTL,
        }
    }
}

/// What an eviction pass removed and kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub removed_files: usize,
    pub removed_bytes: u64,
    pub retained_files: usize,
    pub retained_bytes: u64,
    /// Files that should have been removed but could not be.
    pub failed_files: usize,
}

impl SweepStats {
    fn merge(&mut self, other: SweepStats) {
        self.removed_files += other.removed_files;
        self.removed_bytes += other.removed_bytes;
        self.retained_files += other.retained_files;
        self.retained_bytes += other.retained_bytes;
        self.failed_files += other.failed_files;
    }
}

impl AssetStore {
    /// Delete every entry whose age has reached its partition's time-to-live.
    ///
    /// Age is `now - mtime`; an entry aged exactly the TTL is removed. Entries
    /// with a modification time in the future count as fresh. Directories are
    /// never touched and a missing partition is not an error.
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttls: &Ttls) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        for partition in Partition::ALL {
            let ttl = chrono::Duration::from_std(ttls.for_partition(partition))
                .context("TTL out of range")?;
            let dir = self.partition_dir(partition);
            let partition_stats = sweep_directory(&dir, |meta| {
                match meta.modified() {
                    Ok(modified) => now.signed_duration_since(DateTime::<Utc>::from(modified)) >= ttl,
                    // Without a timestamp we cannot prove the entry is stale
                    Err(_) => false,
                }
            })
            .with_context(|| format!("Failed to sweep partition: {:?}", dir))?;

            tracing::debug!(
                partition = partition.dir_name(),
                removed = partition_stats.removed_files,
                retained = partition_stats.retained_files,
                "Swept partition"
            );
            stats.merge(partition_stats);
        }

        tracing::info!(
            "Sweep removed {} files ({} bytes), retained {} files ({} bytes)",
            stats.removed_files,
            stats.removed_bytes,
            stats.retained_files,
            stats.retained_bytes,
        );
        Ok(stats)
    }

    /// Delete every entry in every partition plus the cached manifest,
    /// regardless of age.
    pub fn wipe_all(&self) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        for partition in Partition::ALL {
            let dir = self.partition_dir(partition);
            let partition_stats = sweep_directory(&dir, |_| true)
                .with_context(|| format!("Failed to wipe partition: {:?}", dir))?;
            stats.merge(partition_stats);
        }

        let manifest = self.manifest_path();
        if let Ok(meta) = fs::metadata(&manifest) {
            if meta.is_file() {
                match remove_file_if_present(&manifest) {
                    Ok(()) => {
                        stats.removed_files += 1;
                        stats.removed_bytes += meta.len();
                    }
                    Err(e) => {
                        tracing::error!(path = %manifest.display(), "Failed to remove cached manifest: {}", e);
                        stats.failed_files += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Wiped {} files ({} bytes)",
            stats.removed_files,
            stats.removed_bytes
        );
        Ok(stats)
    }
}

/// Remove the regular files directly inside `dir` for which `expired` holds.
///
/// Per-file failures are logged and counted so one stuck file does not stop
/// the rest of the sweep.
fn sweep_directory<F>(dir: &Path, expired: F) -> io::Result<SweepStats>
where
    F: FnMut(&fs::Metadata) -> bool,
{
    match fs::read_dir(dir) {
        Ok(entries) => Ok(sweep_entries(dir, entries, expired)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Partition not found: `{}`", dir.display());
            Ok(SweepStats::default())
        }
        Err(e) => Err(e),
    }
}

fn sweep_entries<I, F>(dir: &Path, entries: I, mut expired: F) -> SweepStats
where
    I: IntoIterator<Item = io::Result<DirEntry>>,
    F: FnMut(&fs::Metadata) -> bool,
{
    let mut stats = SweepStats::default();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(dir = %dir.display(), "Failed to read cache entry: {}", e);
                stats.failed_files += 1;
                continue;
            }
        };
        let meta = match regular_file_metadata(&entry) {
            Some(meta) => meta,
            None => continue,
        };

        if !expired(&meta) {
            stats.retained_files += 1;
            stats.retained_bytes += meta.len();
            continue;
        }

        let path = entry.path();
        match remove_file_if_present(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed cache entry");
                stats.removed_files += 1;
                stats.removed_bytes += meta.len();
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to remove cache entry: {}", e);
                stats.failed_files += 1;
            }
        }
    }
    stats
}

fn regular_file_metadata(entry: &DirEntry) -> Option<fs::Metadata> {
    let file_type = entry.file_type().ok()?;
    if !file_type.is_file() {
        return None;
    }
    entry.metadata().ok()
}

/// A file that vanished between listing and removal counts as removed.
fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use filetime::FileTime;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> AssetStore {
        let store = AssetStore::new(dir.path(), "assetpack");
        store.ensure_layout().unwrap();
        store
    }

    /// Write an entry and backdate it to `age` before `now`.
    fn entry_aged(
        store: &AssetStore,
        partition: Partition,
        locator: &str,
        now: SystemTime,
        age: Duration,
    ) -> std::path::PathBuf {
        let key = CacheKey::from_locator(locator);
        let path = store.persist(partition, &key, b"data").unwrap();
        let mtime = FileTime::from_system_time(now - age);
        filetime::set_file_mtime(&path, mtime).unwrap();
        path
    }

    #[test]
    fn test_sweep_short_lived_boundary() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let now = SystemTime::now();

        let stale = entry_aged(
            &store,
            Partition::ShortLived,
            "https://x.io/stale.png",
            now,
            SHORT_LIVED_TTL + Duration::from_secs(1),
        );
        let fresh = entry_aged(
            &store,
            Partition::ShortLived,
            "https://x.io/fresh.png",
            now,
            Duration::from_secs(47 * 60 * 60),
        );

        let stats = store.sweep_expired(now.into(), &Ttls::default()).unwrap();
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert_eq!(stats.removed_files, 1);
        assert_eq!(stats.retained_files, 1);
    }

    #[test]
    fn test_sweep_exact_ttl_is_removed() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let now = SystemTime::now();

        let exact = entry_aged(&store, Partition::ShortLived, "https://x.io/exact.png", now, SHORT_LIVED_TTL);
        let just_under = entry_aged(
            &store,
            Partition::ShortLived,
            "https://x.io/under.png",
            now,
            SHORT_LIVED_TTL - Duration::from_secs(1),
        );

        store.sweep_expired(now.into(), &Ttls::default()).unwrap();
        assert!(!exact.exists());
        assert!(just_under.exists());
    }

    #[test]
    fn test_sweep_uses_partition_ttl() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let now = SystemTime::now();
        let three_days = Duration::from_secs(3 * 24 * 60 * 60);

        let glyph = entry_aged(&store, Partition::ShortLived, "https://x.io/g.png", now, three_days);
        let icon = entry_aged(&store, Partition::LongLived, "https://x.io/i.png", now, three_days);
        let old_icon = entry_aged(
            &store,
            Partition::LongLived,
            "https://x.io/old.png",
            now,
            LONG_LIVED_TTL + Duration::from_secs(60),
        );

        store.sweep_expired(now.into(), &Ttls::default()).unwrap();
        assert!(!glyph.exists());
        assert!(icon.exists());
        assert!(!old_icon.exists());
    }

    #[test]
    fn test_sweep_leaves_directories_and_manifest() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let nested = store.partition_dir(Partition::LongLived).join("nested");
        fs::create_dir_all(&nested).unwrap();
        filetime::set_file_mtime(&nested, FileTime::from_unix_time(0, 0)).unwrap();
        store.save_manifest(b"{}").unwrap();
        filetime::set_file_mtime(store.manifest_path(), FileTime::from_unix_time(0, 0)).unwrap();

        store.sweep_expired(Utc::now(), &Ttls::default()).unwrap();
        assert!(nested.is_dir());
        assert!(store.manifest_path().is_file());
    }

    #[test]
    fn test_sweep_missing_partitions_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path().join("never-created"), "assetpack");
        let stats = store.sweep_expired(Utc::now(), &Ttls::default()).unwrap();
        assert_eq!(stats, SweepStats::default());
    }

    #[test]
    fn test_sweep_future_mtime_is_retained() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let now = SystemTime::now();
        let key = CacheKey::from_locator("https://x.io/future.png");
        let path = store.persist(Partition::ShortLived, &key, b"x").unwrap();
        filetime::set_file_mtime(&path, FileTime::from_system_time(now + Duration::from_secs(3600)))
            .unwrap();

        store.sweep_expired(now.into(), &Ttls::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_wipe_all_removes_everything() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let glyph = store
            .persist(Partition::ShortLived, &CacheKey::from_locator("https://x.io/g.png"), b"g")
            .unwrap();
        let icon = store
            .persist(Partition::LongLived, &CacheKey::from_locator("https://x.io/i.png"), b"i")
            .unwrap();
        let nested = store.partition_dir(Partition::LongLived).join("nested");
        fs::create_dir_all(&nested).unwrap();
        store.save_manifest(b"[]").unwrap();

        let stats = store.wipe_all().unwrap();
        assert!(!glyph.exists());
        assert!(!icon.exists());
        assert!(!store.manifest_path().exists());
        assert!(nested.is_dir());
        assert!(store.sidecar_path().is_file());
        assert_eq!(stats.removed_files, 3);
        assert_eq!(stats.removed_bytes, 4);
    }

    #[test]
    fn test_unreadable_entry_does_not_stop_sweep() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let partition = store.partition_dir(Partition::ShortLived);
        let path = store
            .persist(Partition::ShortLived, &CacheKey::from_locator("https://x.io/g.png"), b"g")
            .unwrap();

        let entries = std::iter::once(Err(io::Error::new(io::ErrorKind::Other, "bad entry")))
            .chain(fs::read_dir(&partition).unwrap());
        let stats = sweep_entries(&partition, entries, |_| true);

        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.removed_files, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_wipe_all_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::new(dir.path().join("empty"), "assetpack");
        let stats = store.wipe_all().unwrap();
        assert_eq!(stats.removed_files, 0);
    }
}
