// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handoff from worker threads to the presentation thread.
//!
//! ```text
//! ┌─────────────────┐ enqueue ┌──────────────────┐ drain ┌──────────────┐
//! │ DownloadManager │───────▶│ ApplicationQueue │──────▶│ ResourceHost │
//! │ (tokio workers) │         │ (mutex + deque)  │       │ (owner thr.) │
//! └─────────────────┘         └──────────────────┘       └──────────────┘
//! ```

pub mod host;
pub mod queue;

pub use host::{ResourceHost, ResourceId};
pub use queue::{channel, Application, ApplicationDrain, ApplicationQueue, DrainStats};
