// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Content-derived cache keys.
//!
//! A key is the hex SHA-256 digest of the locator string, followed by the
//! extension of the locator's path: `<sha256>.<ext>`. Locators without an
//! extension produce a bare digest.

use std::fmt;

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Deterministic on-disk name for a remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    extension: String,
}

impl CacheKey {
    /// Compute the key for a locator.
    ///
    /// Pure and infallible: identical locator strings always yield the same key,
    /// and no I/O is performed.
    pub fn from_locator(locator: &str) -> Self {
        let digest = hex::encode(Sha256::digest(locator.as_bytes()));
        Self {
            digest,
            extension: locator_extension(locator),
        }
    }

    /// Hex digest part of the key.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Extension taken verbatim from the locator, possibly empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name used for this key inside a partition.
    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.digest.clone()
        } else {
            format!("{}.{}", self.digest, self.extension)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Extension of the last path segment of a locator.
///
/// Query strings and fragments never contribute. Locators that are not valid
/// URLs fall back to a plain string scan so the key stays computable.
pub fn locator_extension(locator: &str) -> String {
    match Url::parse(locator) {
        Ok(url) => segment_extension(url.path()).to_string(),
        Err(_) => segment_extension(strip_query(locator)).to_string(),
    }
}

fn strip_query(locator: &str) -> &str {
    let end = locator.find(|c: char| c == '?' || c == '#').unwrap_or(locator.len());
    &locator[..end]
}

fn segment_extension(path: &str) -> &str {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(idx) => &segment[idx + 1..],
        None => "",
    }
}
