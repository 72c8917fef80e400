// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! assetpack - remote overlay assets, cached locally
//!
//! Downloads small binary assets (player glyphs, UI icons, resource bundles)
//! referenced by locator, keeps them on disk keyed by content identity, and
//! hands them to a single-threaded presentation layer for display:
//!
//! **Locator** -> **DownloadManager** -> **AssetStore** -> **ApplicationQueue** -> **ResourceHost**
//!
//! # Core Modules
//!
//! - [`cache`] - Cache keys, partitions, eviction
//! - [`download`] - Fetching with per-task exclusion and attempt ceilings
//! - [`handoff`] - Queue of work for the presentation thread
//! - [`report`] - Error reporting collaborators
//! - [`config`] - Settings file

pub mod cache;
pub mod config;
pub mod download;
pub mod handoff;
pub mod locks;
pub mod report;

// Re-export commonly used types
pub use cache::{AssetStore, CacheKey, Partition, SweepStats, Ttls};
pub use config::Settings;
pub use download::{AssetKind, DownloadManager, DownloadTask, FetchError, FetchOutcome};
pub use handoff::{channel, ApplicationDrain, ApplicationQueue, ResourceHost, ResourceId};
pub use report::{ErrorReporter, HttpReporter, TracingReporter};
