// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Asset Download System for assetpack
//!
//! This module turns locators into cached files with:
//! - At most one running fetch per task object
//! - A per-task attempt ceiling
//! - Content validation before anything is written
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ DownloadManager │────▶│ AssetStore      │
//! │ (tokio workers) │     │ (partitions)    │
//! └────────┬────────┘     └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ ApplicationQueue│────▶│ ResourceHost    │
//! │ (bind requests) │     │ (owner thread)  │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use assetpack::cache::AssetStore;
//! use assetpack::download::{AssetKind, DownloadManager};
//! use assetpack::handoff::channel;
//! use assetpack::report::TracingReporter;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let reporter = Arc::new(TracingReporter);
//! let (queue, mut drain) = channel(reporter.clone());
//! let manager = DownloadManager::new(AssetStore::new("/tmp/assetpack", "assetpack"), queue, reporter)?;
//!
//! let glyph = Arc::new(manager.task("https://cdn.example.com/glyphs/star.png", AssetKind::Glyph));
//! let outcome = manager.spawn(glyph.clone()).await?;
//! println!("{:?} after {} attempt(s)", outcome, glyph.attempts());
//!
//! // Later, on the presentation thread: drain.drain(&mut host);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod types;

// Re-export commonly used items
pub use error::{ErrorClass, FetchError};
pub use manager::{is_accepted_image, DownloadManager, ACCEPTED_IMAGE_TYPES};
pub use types::{AssetKind, DownloadTask, FetchOutcome, DEFAULT_MAX_ATTEMPTS};
