// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Serialization of log records into collector messages.
//!
//! Each record becomes one self-contained JSON object:
//!
//! ```json
//! {"tags":["svc-a"],"host":"h1","level":"ERROR","data":{"fields":{},"message":"disk full"}}
//! ```
//!
//! `tags` is `null` when the hook has no tags. Inside `data`, and inside
//! `fields`, keys are written in sorted order, so encoding the same record
//! twice yields identical bytes.
//!
//! Fields are `serde_json::Value`s, which always serialize; [`encode`] only
//! returns an error if that ever stops holding.

use crate::config::HookConfig;
use crate::error::HookError;
use crate::record::LogRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Serialize)]
struct Message<'a> {
    tags: Option<&'a [String]>,
    host: &'a str,
    level: &'static str,
    data: MessageData<'a>,
}

/// Keys in alphabetical order, the byte layout collectors already receive.
#[derive(Serialize)]
struct MessageData<'a> {
    fields: &'a Map<String, Value>,
    message: &'a str,
}

/// Serialized form of one log record. Immutable once produced.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedMessage(Vec<u8>);

impl EncodedMessage {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for EncodedMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for EncodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodedMessage")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

/// Encodes a record together with the hook's host, tags and the record's
/// uppercased level label.
pub fn encode(record: &LogRecord, config: &HookConfig) -> Result<EncodedMessage, HookError> {
    let message = Message {
        tags: if config.tags.is_empty() {
            None
        } else {
            Some(config.tags.as_slice())
        },
        host: &config.host,
        level: record.severity.label(),
        data: MessageData {
            message: &record.message,
            fields: &record.fields,
        },
    };

    let payload = serde_json::to_vec(&message)?;
    Ok(EncodedMessage(payload))
}

/// Joins a batch into a request body, one message per line.
#[must_use]
pub fn join_batch(batch: &[EncodedMessage]) -> Vec<u8> {
    let size = batch.iter().map(EncodedMessage::len).sum::<usize>() + batch.len();
    let mut body = Vec::with_capacity(size);
    for (i, message) in batch.iter().enumerate() {
        if i > 0 {
            body.push(b'\n');
        }
        body.extend_from_slice(message.as_bytes());
    }
    body
}
