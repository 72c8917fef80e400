// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download types for asset fetching.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use super::error::FetchError;
use crate::cache::Partition;
use crate::handoff::ResourceId;

/// Attempt ceiling shared by every asset kind unless overridden.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What kind of asset a locator points at.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Player decoration, short-lived
    Glyph,
    /// UI icon
    #[default]
    Icon,
    /// Packaged resource bundle
    Bundle,
}

impl AssetKind {
    /// Partition entries of this kind are stored in.
    pub fn partition(&self) -> Partition {
        match self {
            AssetKind::Glyph => Partition::ShortLived,
            AssetKind::Icon | AssetKind::Bundle => Partition::LongLived,
        }
    }

    /// Whether the response must declare an accepted image content type.
    pub fn expects_image(&self) -> bool {
        matches!(self, AssetKind::Glyph | AssetKind::Icon)
    }
}

/// Download bookkeeping for one resource object.
///
/// Mutual exclusion is per instance: two tasks for the same locator do not
/// block each other. The attempt counter only grows until
/// [`DownloadTask::reset_attempts`] is called.
#[derive(Debug)]
pub struct DownloadTask {
    locator: String,
    kind: AssetKind,
    max_attempts: u32,
    attempts: AtomicU32,
    downloading: AtomicBool,
}

impl DownloadTask {
    /// Create a task with the default attempt ceiling.
    pub fn new(locator: impl Into<String>, kind: AssetKind) -> Self {
        Self::with_max_attempts(locator, kind, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(locator: impl Into<String>, kind: AssetKind, max_attempts: u32) -> Self {
        Self {
            locator: locator.into(),
            kind,
            max_attempts,
            attempts: AtomicU32::new(0),
            downloading: AtomicBool::new(false),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of fetch attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// True while a fetch for this task is running.
    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::Acquire)
    }

    /// True once the attempt ceiling has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.attempts() >= self.max_attempts
    }

    /// Make an exhausted task eligible for new attempts.
    pub fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    /// Claim the task for one fetch. Returns `None` if a fetch is already running.
    pub(crate) fn try_begin(&self) -> Option<InFlight<'_>> {
        self.downloading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { task: self })
    }
}

/// Claim on a task's `downloading` flag; clears it when dropped, including
/// on early returns and unwinding.
pub(crate) struct InFlight<'a> {
    task: &'a DownloadTask,
}

impl InFlight<'_> {
    /// Record a new attempt and return its 1-based number.
    pub(crate) fn consume_attempt(&self) -> u32 {
        self.task.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.task.downloading.store(false, Ordering::Release);
    }
}

/// Result of [`DownloadManager::fetch`](super::DownloadManager::fetch).
#[derive(Debug)]
pub enum FetchOutcome {
    /// Another fetch for this task was running; nothing was done.
    AlreadyInFlight,
    /// The attempt ceiling was reached; nothing was done.
    Exhausted,
    /// An entry already existed; a bind was scheduled without a network call.
    Cached { path: PathBuf, id: ResourceId },
    /// The asset was downloaded, stored and a bind was scheduled.
    Downloaded { path: PathBuf, id: ResourceId },
    /// The attempt failed; the task stays retryable until exhausted.
    Failed(FetchError),
}

impl FetchOutcome {
    /// True if a bind for the asset was scheduled.
    pub fn is_available(&self) -> bool {
        matches!(self, FetchOutcome::Cached { .. } | FetchOutcome::Downloaded { .. })
    }

    /// True if this call made a network request.
    pub fn attempted(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded { .. } | FetchOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}
