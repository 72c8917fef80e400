// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Local asset cache.
//!
//! Entries are files named by their [`CacheKey`] and grouped into two
//! partitions with independent time-to-live values. Lookups only check for
//! presence; [`AssetStore::sweep_expired`] bounds storage growth and
//! [`AssetStore::wipe_all`] empties the cache.
//!
//! # Usage
//!
//! ```rust,no_run
//! use assetpack::cache::{AssetStore, CacheKey, Partition, Ttls};
//!
//! # fn example() -> anyhow::Result<()> {
//! let store = AssetStore::new("/tmp/assetpack", "assetpack");
//! store.ensure_layout()?;
//!
//! let key = CacheKey::from_locator("https://cdn.example.com/glyphs/star.png");
//! if !store.exists(Partition::ShortLived, &key) {
//!     store.persist(Partition::ShortLived, &key, b"...")?;
//! }
//!
//! store.sweep_expired(chrono::Utc::now(), &Ttls::default())?;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod key;
pub mod store;

pub use cleanup::{SweepStats, Ttls, LONG_LIVED_TTL, SHORT_LIVED_TTL};
pub use key::{locator_extension, CacheKey};
pub use store::{AssetStore, Partition, MANIFEST_FILE, SIDECAR_FILE};
