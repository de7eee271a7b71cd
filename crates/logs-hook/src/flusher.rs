// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of a batch to the collector endpoint.
//!
//! Every dispatched batch becomes exactly one HTTP POST whose body is the
//! batch's messages joined by newlines, in order.
//!
//! # Architecture
//!
//! ```text
//!   Flush scheduler
//!         │ spawn per batch
//!         v
//!   ┌─────────────┐
//!   │ Join lines  │ (newline-delimited JSON)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │ HTTP POST   │ (request timeout)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │ Log outcome │ (batch dropped on failure)
//!   └─────────────┘
//! ```
//!
//! # Failure handling
//!
//! Delivery is best effort. On any failure the error is logged and the batch
//! is discarded; nothing is retried or requeued and the scheduler never
//! learns the outcome.
//!
//! - **Request construction errors**: logged at `error`, counted
//! - **Transport errors and timeouts**: logged at `error`, counted
//! - **Non-2xx responses**: logged at `warn`, not counted as failures

use crate::config::HookConfig;
use crate::encoder::{join_batch, EncodedMessage};
use crate::error::HookError;
use crate::http::get_client;
use crate::stats::HookStats;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Destination for flushed batches.
///
/// The scheduler spawns one `deliver` call per flush and never awaits its
/// result, so implementations handle and report their own failures.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    /// Delivers one batch. Messages are in the order they were queued.
    async fn deliver(&self, batch: Vec<EncodedMessage>);
}

/// Sends batches to the collector over HTTP.
#[derive(Debug, Clone)]
pub struct Flusher {
    /// HTTP client shared by all deliveries (see [`get_client`]).
    client: reqwest::Client,
    /// Collector URL every batch is POSTed to.
    endpoint: String,
    /// Upper bound on a single request, response body included.
    timeout: Duration,
    /// Counters updated on delivery failures.
    stats: Arc<HookStats>,
}

impl Flusher {
    /// Creates a flusher for the configured endpoint.
    ///
    /// # Arguments
    ///
    /// * `config` - Hook configuration (endpoint, request timeout, proxy)
    /// * `stats` - Counters shared with the hook
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let flusher = Flusher::new(&config, Arc::new(HookStats::default()));
    /// flusher.deliver(batch).await;
    /// ```
    #[must_use]
    pub fn new(config: &HookConfig, stats: Arc<HookStats>) -> Self {
        Flusher {
            client: get_client(config),
            endpoint: config.endpoint_url.clone(),
            timeout: config.request_timeout,
            stats,
        }
    }

    /// Performs the POST for one batch.
    ///
    /// # Arguments
    ///
    /// * `batch` - Encoded messages, joined by newlines into the request body
    ///
    /// # Returns
    ///
    /// The response status. The response body is read to completion and
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Request`] if the request cannot be built, the
    /// connection fails or the request times out.
    pub async fn send(&self, batch: &[EncodedMessage]) -> Result<StatusCode, HookError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .body(join_batch(batch))
            .send()
            .await?;

        let status = resp.status();
        if let Err(e) = resp.bytes().await {
            debug!("LOGS | Failed to read collector response body: {}", e);
        }
        Ok(status)
    }
}

#[async_trait]
impl BatchSink for Flusher {
    async fn deliver(&self, batch: Vec<EncodedMessage>) {
        let count = batch.len();
        let time = Instant::now();

        match self.send(&batch).await {
            Ok(status) if status.is_success() => {
                debug!(
                    "LOGS | Delivered {} messages in {} ms",
                    count,
                    time.elapsed().as_millis()
                );
            }
            Ok(status) => {
                warn!(
                    "LOGS | {}: Collector did not accept batch of {} messages, batch dropped",
                    status, count
                );
            }
            Err(HookError::Request(e)) if e.is_builder() => {
                self.stats.record_delivery_failure();
                error!("LOGS | Error creating request for {} messages: {}", count, e);
            }
            Err(e) => {
                self.stats.record_delivery_failure();
                error!(
                    "LOGS | Error sending {} messages after {} ms: {}",
                    count,
                    time.elapsed().as_millis(),
                    e
                );
            }
        }
    }
}
