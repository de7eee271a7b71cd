// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Logs Hook
//!
//! Batches structured log events and ships them to an HTTP log collector.
//!
//! A [`LogsHook`] sits between a logging framework and a remote collector.
//! Events are encoded to JSON at the moment they are logged, placed on a
//! bounded queue without blocking the caller, accumulated by a background
//! scheduler and posted as newline-delimited batches once per flush interval.
//! Delivery is best effort: a full queue or a failed request drops events and
//! only [`LogsHook::stats`] records it.
//!
//! ## Tracing integration
//!
//! ```no_run
//! use logs_hook::{HookConfig, LogsHook};
//! use std::sync::Arc;
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! # async fn run() -> Result<(), logs_hook::HookError> {
//! let hook = Arc::new(LogsHook::new(HookConfig::from_env()?)?);
//! let subscriber = tracing_subscriber::registry().with(hook.layer());
//! tracing::subscriber::set_global_default(subscriber).ok();
//!
//! tracing::error!(path = "/var/data", "disk full");
//!
//! hook.close().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod encoder;
pub mod error;
pub mod flusher;
pub mod hook;
pub mod http;
pub mod layer;
pub mod queue;
pub mod record;
pub mod scheduler;
pub mod severity;
pub mod stats;

pub use config::HookConfig;
pub use encoder::EncodedMessage;
pub use error::HookError;
pub use flusher::{BatchSink, Flusher};
pub use hook::LogsHook;
pub use layer::LogsLayer;
pub use record::LogRecord;
pub use severity::{active_levels, Severity};
pub use stats::HookStatsSnapshot;
