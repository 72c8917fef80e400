// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Queue of work that must run on the presentation thread.
//!
//! [`channel`] returns a cloneable producer ([`ApplicationQueue`]) and the
//! single consumer ([`ApplicationDrain`]). The drain is not `Clone`, so there
//! is exactly one place that can execute scheduled applications.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::host::ResourceHost;
use crate::locks::{resilient_lock, try_resilient_lock};
use crate::report::ErrorReporter;

/// A unit of work executed against the rendering context.
pub type Application = Box<dyn FnOnce(&mut dyn ResourceHost) -> Result<()> + Send + 'static>;

type Pending = Arc<Mutex<VecDeque<Application>>>;

/// Create a connected producer/consumer pair.
pub fn channel(reporter: Arc<dyn ErrorReporter>) -> (ApplicationQueue, ApplicationDrain) {
    let pending: Pending = Arc::new(Mutex::new(VecDeque::new()));
    (
        ApplicationQueue {
            pending: Arc::clone(&pending),
        },
        ApplicationDrain { pending, reporter },
    )
}

/// Producer side. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct ApplicationQueue {
    pending: Pending,
}

impl ApplicationQueue {
    /// Append an application. Only holds the lock for the push itself.
    pub fn enqueue<F>(&self, application: F)
    where
        F: FnOnce(&mut dyn ResourceHost) -> Result<()> + Send + 'static,
    {
        resilient_lock(&self.pending).push_back(Box::new(application));
    }

    /// Number of applications waiting for the next drain.
    pub fn len(&self) -> usize {
        resilient_lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ApplicationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationQueue")
            .field("pending", &try_resilient_lock(&self.pending).map(|pending| pending.len()))
            .finish()
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub executed: usize,
    pub failed: usize,
}

/// Consumer side, owned by the presentation thread.
pub struct ApplicationDrain {
    pending: Pending,
    reporter: Arc<dyn ErrorReporter>,
}

impl ApplicationDrain {
    /// Run everything that was queued when the drain started, in insertion order.
    ///
    /// Call once per presentation cycle. Applications enqueued while the drain
    /// is running (including from inside an application) are left for the next
    /// cycle. An application that fails or panics is reported and does not
    /// stop the ones after it.
    pub fn drain(&mut self, host: &mut dyn ResourceHost) -> DrainStats {
        let mut stats = DrainStats::default();
        let snapshot = resilient_lock(&self.pending).len();

        for _ in 0..snapshot {
            let application = match resilient_lock(&self.pending).pop_front() {
                Some(application) => application,
                None => break,
            };

            match panic::catch_unwind(AssertUnwindSafe(|| application(&mut *host))) {
                Ok(Ok(())) => stats.executed += 1,
                Ok(Err(e)) => {
                    stats.failed += 1;
                    self.reporter.report(&e.context("Scheduled application failed"));
                }
                Err(payload) => {
                    stats.failed += 1;
                    self.reporter.report(&anyhow!(
                        "Scheduled application panicked: {}",
                        panic_message(payload.as_ref())
                    ));
                }
            }
        }

        if snapshot > 0 {
            tracing::debug!(
                executed = stats.executed,
                failed = stats.failed,
                "Drained scheduled applications"
            );
        }
        stats
    }

    /// Number of applications waiting for the next drain.
    pub fn pending(&self) -> usize {
        resilient_lock(&self.pending).len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
