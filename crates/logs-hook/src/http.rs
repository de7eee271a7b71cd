// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for delivery requests.
//!
//! Every batch is sent through one shared `reqwest` client built from the
//! hook configuration:
//! - **Timeouts**: the configured request timeout, applied per request
//! - **Connection pooling**: idle connections kept for 270 s, TCP keep-alive
//!   every 120 s
//! - **Proxy support**: optional HTTPS proxy from `HookConfig::https_proxy`
//!
//! # Example
//!
//! ```rust,ignore
//! use logs_hook::http::get_client;
//!
//! let client = get_client(&config);
//! let response = client.post(&config.endpoint_url).body(body).send().await?;
//! ```

use crate::config::HookConfig;
use crate::error::HookError;
use core::time::Duration;
use tracing::error;

/// Creates the client every delivery request is sent through.
///
/// # Arguments
///
/// * `config` - Hook configuration providing the request timeout and proxy
///
/// # Returns
///
/// A configured `reqwest::Client`.
///
/// # Error Handling
///
/// If the proxy configuration is invalid, logs an error and returns a client
/// with a direct connection, so log delivery keeps working. Should that fail
/// too, `reqwest` defaults are used.
///
/// # Example
///
/// ```rust,ignore
/// let client = get_client(&config);
/// ```
#[must_use]
pub fn get_client(config: &HookConfig) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "LOGS | Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "LOGS | Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

/// Builds a client, with the configured proxy only if `allow_proxy` is set.
///
/// # Errors
///
/// Returns [`HookError::Client`] if the proxy URL is invalid or the client
/// cannot be built.
fn build_client(config: &HookConfig, allow_proxy: bool) -> Result<reqwest::Client, HookError> {
    let mut client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(https_uri.as_str())
                .map_err(|e| HookError::Client(e.to_string()))?;
            client = client.proxy(proxy);
        }
    }

    client.build().map_err(|e| HookError::Client(e.to_string()))
}
