// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Drop and delivery counters.
//!
//! `LogsHook::fire` never reports failure to the logging framework, so these
//! counters are the only place where dropped events become visible.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct HookStats {
    accepted: AtomicU64,
    dropped_queue_full: AtomicU64,
    batches_dispatched: AtomicU64,
    delivery_failures: AtomicU64,
}

/// Point-in-time copy of [`HookStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStatsSnapshot {
    /// Events placed on the ingest queue
    pub accepted: u64,
    /// Events dropped because the ingest queue was full or closed
    pub dropped_queue_full: u64,
    /// Batches handed to a delivery task
    pub batches_dispatched: u64,
    /// Deliveries that failed at the transport level
    pub delivery_failures: u64,
}

impl HookStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_full(&self) {
        self.dropped_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> HookStatsSnapshot {
        HookStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}
