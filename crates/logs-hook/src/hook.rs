// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::HookConfig;
use crate::encoder::encode;
use crate::error::HookError;
use crate::flusher::{BatchSink, Flusher};
use crate::layer::LogsLayer;
use crate::queue::{bounded, IngestQueue};
use crate::record::LogRecord;
use crate::scheduler::FlushScheduler;
use crate::severity::{active_levels, Severity};
use crate::stats::{HookStats, HookStatsSnapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Entry point between a logging framework and the collector.
///
/// Construction starts the flush scheduler on the current Tokio runtime.
/// [`LogsHook::fire`] encodes and queues a record without waiting; batches
/// are delivered in the background.
#[derive(Debug)]
pub struct LogsHook {
    config: HookConfig,
    levels: Vec<Severity>,
    queue: IngestQueue,
    stats: Arc<HookStats>,
    cancel_token: CancellationToken,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl LogsHook {
    /// Creates a hook that delivers batches to `config.endpoint_url`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: HookConfig) -> Result<Self, HookError> {
        config.validate()?;
        let stats = Arc::new(HookStats::default());
        let flusher = Flusher::new(&config, Arc::clone(&stats));
        Self::start(config, Arc::new(flusher), stats)
    }

    /// Creates a hook that hands batches to a custom sink instead of the
    /// HTTP flusher.
    pub fn with_sink(config: HookConfig, sink: Arc<dyn BatchSink>) -> Result<Self, HookError> {
        config.validate()?;
        Self::start(config, sink, Arc::new(HookStats::default()))
    }

    fn start(
        config: HookConfig,
        sink: Arc<dyn BatchSink>,
        stats: Arc<HookStats>,
    ) -> Result<Self, HookError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HookError::NoRuntime)?;

        let (queue, receiver) = bounded(config.queue_capacity, Arc::clone(&stats));
        let cancel_token = CancellationToken::new();
        let scheduler = FlushScheduler::new(
            receiver,
            sink,
            &config,
            Arc::clone(&stats),
            cancel_token.clone(),
        );
        let task = runtime.spawn(scheduler.run());

        debug!(
            "LOGS | Hook started for {} at level {} with {} tags",
            config.endpoint_url,
            config.level,
            config.tags.len()
        );

        Ok(Self {
            levels: active_levels(config.level),
            config,
            queue,
            stats,
            cancel_token,
            scheduler: Mutex::new(Some(task)),
        })
    }

    /// Levels this hook handles, most severe first. Logging integrations
    /// only call [`LogsHook::fire`] for these.
    #[must_use]
    pub fn levels(&self) -> &[Severity] {
        &self.levels
    }

    #[must_use]
    pub fn is_enabled(&self, severity: Severity) -> bool {
        self.levels.contains(&severity)
    }

    #[must_use]
    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Encodes `record` and places it on the ingest queue.
    ///
    /// Never blocks and never reports failure: records that arrive while the
    /// queue is full or after [`LogsHook::close`] are dropped and counted in
    /// [`LogsHook::stats`].
    /// Level filtering is the caller's job, see [`LogsHook::levels`].
    pub fn fire(&self, record: &LogRecord) {
        match encode(record, &self.config) {
            Ok(message) => {
                self.queue.enqueue(message);
            }
            // Unreachable with `serde_json::Value` fields, which always
            // serialize
            Err(e) => debug!("LOGS | Dropping record that failed to encode: {}", e),
        }
    }

    #[must_use]
    pub fn stats(&self) -> HookStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns a `tracing` layer that forwards events to this hook.
    #[must_use]
    pub fn layer(self: &Arc<Self>) -> LogsLayer {
        LogsLayer::new(Arc::clone(self))
    }

    /// Stops the scheduler after a final flush.
    ///
    /// Everything queued before the call is delivered in one last batch, and
    /// the call waits for all in-flight deliveries, up to the configured
    /// shutdown timeout. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`HookError::ShutdownTimeout`] if the scheduler did not finish in time,
    /// [`HookError::SchedulerFailed`] if it panicked.
    pub async fn close(&self) -> Result<(), HookError> {
        let task = match self.scheduler.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(task) = task else {
            return Ok(());
        };

        debug!("LOGS | Closing hook");
        self.cancel_token.cancel();
        await_scheduler(task, self.config.shutdown_timeout).await
    }
}

/// Waits for the scheduler task to finish. A panicked or aborted scheduler is
/// reported, since records it held were never delivered.
async fn await_scheduler(
    task: JoinHandle<()>,
    shutdown_timeout: Duration,
) -> Result<(), HookError> {
    match tokio::time::timeout(shutdown_timeout, task).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("LOGS | Flush scheduler task failed: {}", e);
            Err(HookError::SchedulerFailed(e.to_string()))
        }
        Err(_) => Err(HookError::ShutdownTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_DURATION;
    use crate::encoder::EncodedMessage;
    use async_trait::async_trait;
    use serde_json::Value;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<EncodedMessage>>>,
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn deliver(&self, batch: Vec<EncodedMessage>) {
            self.batches.lock().unwrap().push(batch);
        }
    }

    struct StuckSink;

    #[async_trait]
    impl BatchSink for StuckSink {
        async fn deliver(&self, _batch: Vec<EncodedMessage>) {
            std::future::pending::<()>().await;
        }
    }

    fn test_config(level: Severity) -> HookConfig {
        HookConfig::new("http://localhost:9000", "h1", level, ["svc-a"])
    }

    fn decode(message: &EncodedMessage) -> Value {
        serde_json::from_slice(message.as_bytes()).unwrap()
    }

    #[test]
    fn test_new_without_runtime_fails() {
        let result = LogsHook::new(test_config(Severity::Warn));
        assert!(matches!(result, Err(HookError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let result = LogsHook::new(HookConfig::default());
        assert!(matches!(result, Err(HookError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_levels_follow_threshold() {
        let hook = LogsHook::new(test_config(Severity::Error)).unwrap();
        assert_eq!(
            hook.levels(),
            &[Severity::Panic, Severity::Fatal, Severity::Error]
        );
        assert!(hook.is_enabled(Severity::Fatal));
        assert!(!hook.is_enabled(Severity::Info));
        hook.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_fire_then_close_delivers_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let hook = LogsHook::with_sink(test_config(Severity::Warn), sink.clone()).unwrap();

        hook.fire(&LogRecord::new(Severity::Error, "first"));
        hook.fire(&LogRecord::new(Severity::Warn, "second").with_field("attempt", 2));
        hook.fire(&LogRecord::new(Severity::Panic, "third"));
        hook.close().await.unwrap();

        let batches = sink.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        let messages: Vec<Value> = batches[0].iter().map(decode).collect();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["data"]["message"], "first");
        assert_eq!(messages[0]["level"], "ERROR");
        assert_eq!(messages[1]["data"]["fields"]["attempt"], 2);
        assert_eq!(messages[1]["level"], "WARNING");
        assert_eq!(messages[2]["level"], "PANIC");
        assert_eq!(messages[2]["host"], "h1");

        assert_eq!(hook.stats().accepted, 3);
        assert_eq!(hook.stats().batches_dispatched, 1);
    }

    #[tokio::test]
    async fn test_fire_after_close_is_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let hook = LogsHook::with_sink(test_config(Severity::Info), sink.clone()).unwrap();
        hook.close().await.unwrap();

        hook.fire(&LogRecord::new(Severity::Error, "late"));

        assert!(sink.batches.lock().unwrap().is_empty());
        assert_eq!(hook.stats().dropped_queue_full, 1);
    }

    #[tokio::test]
    async fn test_fire_drops_when_queue_full() {
        let sink = Arc::new(RecordingSink::default());
        let config = test_config(Severity::Info).with_queue_capacity(2);
        let hook = LogsHook::with_sink(config, sink).unwrap();

        // Current-thread runtime: the scheduler cannot drain until we yield
        for i in 0..5 {
            hook.fire(&LogRecord::new(Severity::Error, format!("m{i}")));
        }

        let stats = hook.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.dropped_queue_full, 3);
        hook.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_config_is_rejected_not_panicking() {
        let sink = Arc::new(RecordingSink::default());

        let result = LogsHook::with_sink(
            test_config(Severity::Info).with_queue_capacity(usize::MAX),
            sink.clone(),
        );
        assert!(matches!(result, Err(HookError::InvalidConfig(_))));

        let result = LogsHook::with_sink(
            test_config(Severity::Info).with_flush_interval(Duration::from_secs(u64::MAX)),
            sink,
        );
        assert!(matches!(result, Err(HookError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_longest_flush_interval_still_delivers_on_close() {
        let sink = Arc::new(RecordingSink::default());
        let config = test_config(Severity::Info).with_flush_interval(MAX_DURATION);
        let hook = LogsHook::with_sink(config, sink.clone()).unwrap();

        hook.fire(&LogRecord::new(Severity::Error, "kept"));
        hook.close().await.unwrap();

        assert_eq!(sink.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_panicked_scheduler_is_reported() {
        let task = tokio::spawn(async { panic!("scheduler crashed") });
        let result = await_scheduler(task, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(HookError::SchedulerFailed(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let hook = LogsHook::with_sink(
            test_config(Severity::Info),
            Arc::new(RecordingSink::default()),
        )
        .unwrap();

        assert!(hook.close().await.is_ok());
        assert!(hook.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_times_out_on_stuck_delivery() {
        let config =
            test_config(Severity::Info).with_shutdown_timeout(Duration::from_millis(50));
        let hook = LogsHook::with_sink(config, Arc::new(StuckSink)).unwrap();

        hook.fire(&LogRecord::new(Severity::Error, "never delivered"));
        let result = hook.close().await;

        assert!(matches!(result, Err(HookError::ShutdownTimeout)));
    }
}
