// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::severity::Severity;
use serde_json::{Map, Value};

/// A single log occurrence handed to the hook by the logging framework.
///
/// Carries only what is written to the collector, so records built from the
/// same event compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    /// Structured fields. Keys are unique and serialize in sorted order.
    pub fields: Map<String, Value>,
    pub severity: Severity,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Map::new(),
            severity,
        }
    }

    /// Adds a structured field, replacing any previous value for `key`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
