// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Failure modes of a single fetch attempt.

use std::io;

use reqwest::StatusCode;

/// How a failure is handled by the download manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Connection problems and unusable locators. Reported.
    Transport,
    /// The server answered, but not with something we can store. Logged only.
    Protocol,
    /// The payload could not be written to disk. Reported.
    Storage,
}

/// Error from one fetch attempt. Every variant leaves the task retryable
/// until its attempt ceiling is reached.
#[derive(Debug)]
pub enum FetchError {
    /// Locator could not be turned into a request URL.
    InvalidLocator { locator: String, reason: String },
    /// Request failed before or while receiving the response.
    Transport(reqwest::Error),
    /// Response status outside 2xx.
    Status(StatusCode),
    /// Image payload declared a content type outside the allow-list.
    ContentType(Option<String>),
    /// Body exceeded the configured payload limit.
    TooLarge { limit: u64 },
    /// Writing the entry failed.
    Storage(io::Error),
    /// The blocking write task died before finishing.
    Worker(String),
}

impl FetchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidLocator { .. } | Self::Transport(_) => ErrorClass::Transport,
            Self::Status(_) | Self::ContentType(_) | Self::TooLarge { .. } => ErrorClass::Protocol,
            Self::Storage(_) | Self::Worker(_) => ErrorClass::Storage,
        }
    }

    /// Whether this failure goes to the error reporter.
    pub fn is_reportable(&self) -> bool {
        self.class() != ErrorClass::Protocol
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocator { locator, reason } => {
                write!(f, "Invalid locator `{}`: {}", locator, reason)
            }
            Self::Transport(e) => write!(f, "Network error: {}", e),
            Self::Status(status) => write!(f, "Unexpected response status: {}", status),
            Self::ContentType(Some(content_type)) => {
                write!(f, "Unsupported content type: {}", content_type)
            }
            Self::ContentType(None) => write!(f, "Missing content type"),
            Self::TooLarge { limit } => write!(f, "Payload exceeds {} bytes", limit),
            Self::Storage(e) => write!(f, "Failed to store entry: {}", e),
            Self::Worker(msg) => write!(f, "Storage worker failed: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}
