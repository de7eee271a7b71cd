// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur when building or running a logs hook
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No Tokio runtime available to start the flush scheduler")]
    NoRuntime,

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,

    #[error("Flush scheduler stopped abnormally: {0}")]
    SchedulerFailed(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
