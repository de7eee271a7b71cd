// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch accumulation and flush scheduling.
//!
//! A single scheduler task owns the consumer end of the ingest queue and the
//! batch being accumulated. It waits on whichever comes first of a flush
//! tick, an incoming message, a finished delivery, or the close signal:
//!
//! ```text
//!            message                     tick (batch non-empty)
//!   Idle ──────────────> Accumulating ──────────────────────────> Flushing
//!    ^                    │  ^     │                                  │
//!    │                    │  └─────┘ message                          │
//!    │                    │          (flush early at max batch size)  │
//!    └────────────────────┴───────────────────────────────────────────┘
//!                          batch moved to a delivery task, new empty batch
//! ```
//!
//! Ticks with an empty batch are no-ops, so idle intervals never produce a
//! request. Deliveries run as separate tasks and the scheduler never waits on
//! them while running; it only joins them on shutdown.

use crate::config::{HookConfig, MAX_DURATION};
use crate::encoder::EncodedMessage;
use crate::flusher::BatchSink;
use crate::queue::IngestReceiver;
use crate::stats::HookStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct FlushScheduler {
    receiver: IngestReceiver,
    sink: Arc<dyn BatchSink>,
    flush_interval: Duration,
    max_batch_size: Option<usize>,
    cancel_token: CancellationToken,
    stats: Arc<HookStats>,
    batch: Vec<EncodedMessage>,
    in_flight: JoinSet<()>,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(
        receiver: IngestReceiver,
        sink: Arc<dyn BatchSink>,
        config: &HookConfig,
        stats: Arc<HookStats>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            sink,
            flush_interval: config.flush_interval,
            max_batch_size: config.max_batch_size,
            cancel_token,
            stats,
            batch: Vec::new(),
            in_flight: JoinSet::new(),
        }
    }

    /// Runs until the cancel token fires or every producer handle is dropped,
    /// then drains the queue, flushes what is left and waits for in-flight
    /// deliveries.
    pub async fn run(mut self) {
        debug!("LOGS | Flush scheduler started");

        // First tick one full interval from now. Clamped so an unvalidated
        // interval cannot overflow the deadline.
        let period = self.flush_interval.min(MAX_DURATION);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("LOGS | Flush scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.flush();
                }
                message = self.receiver.dequeue() => match message {
                    Some(message) => {
                        self.batch.push(message);
                        if self.batch_is_full() {
                            debug!(
                                "LOGS | Batch reached {} messages, flushing early",
                                self.batch.len()
                            );
                            self.flush();
                        }
                    }
                    None => {
                        debug!("LOGS | Ingest queue closed");
                        break;
                    }
                },
                Some(result) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = result {
                        error!("LOGS | Delivery task failed: {}", e);
                    }
                }
            }
        }

        self.drain().await;
    }

    fn batch_is_full(&self) -> bool {
        self.max_batch_size
            .is_some_and(|max_batch_size| self.batch.len() >= max_batch_size)
    }

    /// Moves the current batch into a new delivery task. No-op when empty.
    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.batch);
        debug!("LOGS | Flushing {} messages", batch.len());
        self.stats.record_dispatch();

        let sink = Arc::clone(&self.sink);
        self.in_flight.spawn(async move {
            sink.deliver(batch).await;
        });
    }

    async fn drain(mut self) {
        self.receiver.close();
        while let Some(message) = self.receiver.try_dequeue() {
            self.batch.push(message);
            if self.batch_is_full() {
                self.flush();
            }
        }
        self.flush();

        if !self.in_flight.is_empty() {
            debug!(
                "LOGS | Waiting for {} in-flight deliveries",
                self.in_flight.len()
            );
        }
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                error!("LOGS | Delivery task failed: {}", e);
            }
        }

        debug!("LOGS | Flush scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{bounded, IngestQueue};
    use crate::severity::Severity;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Sink that records every batch it receives, optionally after a delay
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<EncodedMessage>>>,
        delay: Option<Duration>,
    }

    impl RecordingSink {
        fn with_delay(delay: Duration) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                delay: Some(delay),
            }
        }

        fn batches(&self) -> Vec<Vec<EncodedMessage>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn deliver(&self, batch: Vec<EncodedMessage>) {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            self.batches.lock().unwrap().push(batch);
        }
    }

    fn message(i: usize) -> EncodedMessage {
        EncodedMessage::from(format!("{{\"n\":{i}}}").into_bytes())
    }

    fn test_config() -> HookConfig {
        HookConfig::new("http://localhost:9000", "h1", Severity::Info, ["a"])
            .with_flush_interval(Duration::from_secs(15))
    }

    struct Harness {
        queue: IngestQueue,
        sink: Arc<RecordingSink>,
        stats: Arc<HookStats>,
        cancel_token: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(config: &HookConfig, sink: RecordingSink) -> Harness {
        let stats = Arc::new(HookStats::default());
        let (queue, receiver) = bounded(config.queue_capacity, Arc::clone(&stats));
        let sink = Arc::new(sink);
        let cancel_token = CancellationToken::new();
        let scheduler = FlushScheduler::new(
            receiver,
            Arc::clone(&sink) as Arc<dyn BatchSink>,
            config,
            Arc::clone(&stats),
            cancel_token.clone(),
        );
        let task = tokio::spawn(scheduler.run());
        Harness {
            queue,
            sink,
            stats,
            cancel_token,
            task,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_flushes_accumulated_messages_in_order() {
        let h = start(&test_config(), RecordingSink::default());

        for i in 0..3 {
            assert!(h.queue.enqueue(message(i)));
        }

        sleep(Duration::from_secs(14)).await;
        assert!(h.sink.batches().is_empty(), "no flush before the first tick");

        sleep(Duration::from_secs(2)).await;
        let batches = h.sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![message(0), message(1), message(2)]);

        h.cancel_token.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_ticks_do_not_flush() {
        let h = start(&test_config(), RecordingSink::default());

        sleep(Duration::from_secs(61)).await;
        assert!(h.sink.batches().is_empty());
        assert_eq!(h.stats.snapshot().batches_dispatched, 0);

        h.cancel_token.cancel();
        h.task.await.unwrap();
        assert!(h.sink.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_interval_gets_its_own_batch() {
        let h = start(&test_config(), RecordingSink::default());

        assert!(h.queue.enqueue(message(0)));
        sleep(Duration::from_secs(16)).await;
        assert!(h.queue.enqueue(message(1)));
        assert!(h.queue.enqueue(message(2)));
        sleep(Duration::from_secs(15)).await;

        let batches = h.sink.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], vec![message(0)]);
        assert_eq!(batches[1], vec![message(1), message(2)]);

        h.cancel_token.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_batch_size_flushes_before_tick() {
        let config = test_config().with_max_batch_size(2);
        let h = start(&config, RecordingSink::default());

        for i in 0..5 {
            assert!(h.queue.enqueue(message(i)));
        }
        sleep(Duration::from_millis(10)).await;

        let batches = h.sink.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], vec![message(0), message(1)]);
        assert_eq!(batches[1], vec![message(2), message(3)]);

        // The remainder waits for the tick
        sleep(Duration::from_secs(15)).await;
        let batches = h.sink.batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2], vec![message(4)]);

        h.cancel_token.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_does_not_block_accumulation() {
        let h = start(
            &test_config(),
            RecordingSink::with_delay(Duration::from_secs(40)),
        );

        assert!(h.queue.enqueue(message(0)));
        sleep(Duration::from_secs(16)).await;
        assert!(h.queue.enqueue(message(1)));
        sleep(Duration::from_secs(15)).await;

        // Both batches dispatched while the first is still being delivered
        assert_eq!(h.stats.snapshot().batches_dispatched, 2);
        assert!(h.sink.batches().is_empty());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.sink.batches().len(), 2);

        h.cancel_token.cancel();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drains_and_flushes_pending_batch() {
        let h = start(&test_config(), RecordingSink::default());

        for i in 0..4 {
            assert!(h.queue.enqueue(message(i)));
        }
        h.cancel_token.cancel();
        h.task.await.unwrap();

        let batches = h.sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![message(0), message(1), message(2), message(3)]
        );
        assert!(h.queue.is_closed());
        assert!(!h.queue.enqueue(message(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_deliveries() {
        let h = start(
            &test_config(),
            RecordingSink::with_delay(Duration::from_secs(20)),
        );

        assert!(h.queue.enqueue(message(0)));
        sleep(Duration::from_secs(16)).await;
        assert!(h.queue.enqueue(message(1)));
        sleep(Duration::from_millis(1)).await;

        h.cancel_token.cancel();
        h.task.await.unwrap();

        // Both the ticked batch and the final batch completed
        assert_eq!(h.sink.batches().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_interval_still_drains_on_cancel() {
        let config = test_config().with_flush_interval(Duration::from_secs(u64::MAX));
        let h = start(&config, RecordingSink::default());

        assert!(h.queue.enqueue(message(0)));
        sleep(Duration::from_secs(60)).await;
        assert!(h.sink.batches().is_empty());

        h.cancel_token.cancel();
        h.task.await.unwrap();
        assert_eq!(h.sink.batches(), vec![vec![message(0)]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_all_producers_dropped() {
        let h = start(&test_config(), RecordingSink::default());

        assert!(h.queue.enqueue(message(0)));
        drop(h.queue);
        h.task.await.unwrap();

        assert_eq!(h.sink.batches(), vec![vec![message(0)]]);
    }
}
