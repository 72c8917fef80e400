// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lock helpers that recover from poisoning.
//!
//! A thread that panics while holding one of these locks (a producer, a test
//! harness, any other caller) marks it as poisoned. The data behind our locks
//! is plain collections that stay structurally valid after such a panic, so
//! we log and keep going instead of propagating the poison to every later
//! caller. Scheduled callbacks run with the queue lock released and cannot
//! poison it.

use std::sync::{Mutex, MutexGuard, TryLockError};

/// Acquire a mutex, recovering from poisoning if necessary.
#[inline]
pub fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "assetpack::locks",
                event = "LOCK_POISONED",
                "Mutex was poisoned by a panicking holder. Recovering data."
            );
            poisoned.into_inner()
        }
    }
}

/// Try to acquire a mutex without blocking.
///
/// Returns `None` if the lock is currently held elsewhere. Recovers from poisoning.
#[inline]
pub fn try_resilient_lock<T>(lock: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match lock.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => {
            tracing::error!(
                target: "assetpack::locks",
                event = "LOCK_POISONED_TRY",
                "Mutex was poisoned during try_lock. Recovering data."
            );
            Some(poisoned.into_inner())
        }
        Err(TryLockError::WouldBlock) => None,
    }
}
