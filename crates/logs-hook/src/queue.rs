// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded ingest queue between producers and the flush scheduler.
//!
//! Producers hold cloneable [`IngestQueue`] handles and never wait: when the
//! queue is full the message is dropped and `enqueue` returns `false`. The
//! single [`IngestReceiver`] belongs to the scheduler.

use crate::encoder::EncodedMessage;
use crate::stats::HookStats;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Producer side of the ingest queue.
#[derive(Clone, Debug)]
pub struct IngestQueue {
    tx: mpsc::Sender<EncodedMessage>,
    stats: Arc<HookStats>,
}

/// Consumer side of the ingest queue, owned by the scheduler.
#[derive(Debug)]
pub struct IngestReceiver {
    rx: mpsc::Receiver<EncodedMessage>,
}

/// Creates a queue with room for `capacity` messages.
///
/// # Panics
///
/// Panics if `capacity` is 0. `HookConfig::validate` rejects that value.
#[must_use]
pub fn bounded(capacity: usize, stats: Arc<HookStats>) -> (IngestQueue, IngestReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (IngestQueue { tx, stats }, IngestReceiver { rx })
}

impl IngestQueue {
    /// Attempts to place a message on the queue without waiting.
    ///
    /// Returns `false` if the queue is full or the scheduler has stopped; the
    /// message is dropped in both cases.
    pub fn enqueue(&self, message: EncodedMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => {
                self.stats.record_accepted();
                true
            }
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                self.stats.record_queue_full();
                false
            }
        }
    }

    /// Number of messages currently waiting to be drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl IngestReceiver {
    /// Waits for the next message. Returns `None` once every producer handle
    /// has been dropped and the queue is empty.
    pub async fn dequeue(&mut self) -> Option<EncodedMessage> {
        self.rx.recv().await
    }

    /// Takes a message if one is immediately available.
    pub fn try_dequeue(&mut self) -> Option<EncodedMessage> {
        self.rx.try_recv().ok()
    }

    /// Stops accepting new messages. Messages already queued can still be
    /// drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
