// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Settings for the asset pipeline.
//!
//! Stored as JSON in `<root>/configs/settings.json`. Every field has a
//! default, so a missing file or a partial file is fine.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::{Ttls, LONG_LIVED_TTL, SHORT_LIVED_TTL};
use crate::download::DEFAULT_MAX_ATTEMPTS;

/// File name of the settings file inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Resource namespace, also the assets subdirectory name
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_short_lived_ttl_secs")]
    pub short_lived_ttl_secs: u64,
    #[serde(default = "default_long_lived_ttl_secs")]
    pub long_lived_ttl_secs: u64,
    /// Fetch attempts per resource object before it goes inert
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Larger bodies are rejected without being stored
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,
    /// Send errors to `report_endpoint` (default: false)
    #[serde(default)]
    pub report_errors: bool,
    #[serde(default)]
    pub report_endpoint: Option<String>,
}

fn default_namespace() -> String {
    "assetpack".to_string()
}

fn default_short_lived_ttl_secs() -> u64 {
    SHORT_LIVED_TTL.as_secs()
}

fn default_long_lived_ttl_secs() -> u64 {
    LONG_LIVED_TTL.as_secs()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("assetpack/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_payload_bytes() -> u64 {
    8 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            short_lived_ttl_secs: default_short_lived_ttl_secs(),
            long_lived_ttl_secs: default_long_lived_ttl_secs(),
            max_attempts: default_max_attempts(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            max_payload_bytes: default_max_payload_bytes(),
            report_errors: false,
            report_endpoint: None,
        }
    }
}

impl Settings {
    /// Settings file location inside a config directory.
    pub fn path_in(config_dir: &Path) -> PathBuf {
        config_dir.join(SETTINGS_FILE)
    }

    /// Load settings, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))
    }

    /// Save settings through a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)
            .with_context(|| "Failed to serialize settings to JSON")?;

        let temp_path = path.with_extension("tmp");
        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
            temp_file
                .write_all(content.as_bytes())
                .with_context(|| "Failed to write to temp file")?;
            temp_file
                .sync_all()
                .with_context(|| "Failed to sync temp file to disk")?;
        }

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} -> {:?}", temp_path, path))?;
        Ok(())
    }

    pub fn ttls(&self) -> Ttls {
        Ttls {
            short_lived: Duration::from_secs(self.short_lived_ttl_secs),
            long_lived: Duration::from_secs(self.long_lived_ttl_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Endpoint to upload error reports to, if reporting is switched on.
    pub fn report_endpoint(&self) -> Option<&str> {
        if self.report_errors {
            self.report_endpoint.as_deref().filter(|url| !url.trim().is_empty())
        } else {
            None
        }
    }
}

/// Default store root: `<data dir>/assetpack`.
pub fn default_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("assetpack"))
        .unwrap_or_else(|| PathBuf::from(".assetpack"))
}
