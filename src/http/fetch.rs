//! JSON request adapter.
//!
//! # Responsibilities
//! - Send one HTTP request and decode its JSON body
//! - Race the request against a deadline and caller signals
//! - Classify error statuses separately from timeouts and aborts
//!
//! # Design Decisions
//! - Transport is reqwest; this module only adapts it to `run_with_timeout`
//! - A status of 400 or above with a JSON body is an `Api` error that keeps
//!   the body, not a transport failure
//! - An empty or `null` body fails with the caller's default message

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{Error, Thrown, DEFAULT_ERROR_MESSAGE};
use crate::events::notify::TimeoutSink;
use crate::resilience::timeouts::{run_with_timeout, Outcome, RunOptions};
use crate::signal::timeout::{DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_MESSAGE};
use crate::signal::Signal;

/// Description of one request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Duration,
    /// Used when the response body is empty or `null`.
    pub default_error_message: String,
    pub signals: Vec<Signal>,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            default_error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            signals: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Apply the configured timeout and default message.
    pub fn with_config(mut self, config: &FetchConfig) -> Self {
        self.timeout = config.timeout();
        self.default_error_message = config.default_error_message.clone();
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn default_error_message(mut self, message: impl Into<String>) -> Self {
        self.default_error_message = message.into();
        self
    }

    pub fn signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }
}

/// Sends [`FetchRequest`]s with a shared client and timeout sink.
#[derive(Clone)]
pub struct JsonFetcher {
    client: Client,
    notifier: Option<Arc<dyn TimeoutSink>>,
}

impl JsonFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            notifier: None,
        }
    }

    /// Publish timeouts to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn TimeoutSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Send `request` and decode the response body as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: FetchRequest) -> Outcome<T> {
        let FetchRequest {
            url,
            method,
            headers,
            body,
            timeout,
            default_error_message,
            signals,
        } = request;

        tracing::debug!(method = %method, url = %url, timeout_ms = timeout.as_millis() as u64, "Sending request");

        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let operation = async move {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;

            let payload: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)?
            };
            if payload.is_null() {
                return Err(Thrown::Text(default_error_message));
            }

            if status.as_u16() >= 400 {
                tracing::debug!(status = status.as_u16(), url = %url, "Error status");
                return Err(Thrown::Error(Error::Api {
                    status: status.as_u16(),
                    body: payload,
                    method: method.to_string(),
                    url: url.to_string(),
                }));
            }

            serde_json::from_value::<T>(payload).map_err(Thrown::from)
        };

        let mut options = RunOptions::new()
            .with_timeout(timeout)
            .with_error_message(DEFAULT_TIMEOUT_MESSAGE)
            .with_signals(signals);
        if let Some(notifier) = &self.notifier {
            options = options.with_notifier(notifier.clone());
        }

        run_with_timeout(operation, options).await
    }
}

impl std::fmt::Debug for JsonFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFetcher")
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

/// Send `request` with `client`, without a timeout sink.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, request: FetchRequest) -> Outcome<T> {
    JsonFetcher::new(client.clone()).fetch(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let url = Url::parse("http://localhost/items").unwrap();
        let request = FetchRequest::get(url.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                HeaderValue::from_static("Bearer token"),
            )
            .json(serde_json::json!({ "a": 1 }))
            .timeout(Duration::from_millis(10))
            .signal(Signal::never());

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, url);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.timeout, Duration::from_millis(10));
        assert_eq!(request.signals.len(), 1);
        assert_eq!(request.default_error_message, DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn test_request_from_config() {
        let config = FetchConfig {
            timeout_ms: 42,
            default_error_message: "Sample Error Message".into(),
        };
        let request = FetchRequest::get(Url::parse("http://localhost/").unwrap()).with_config(&config);
        assert_eq!(request.timeout, Duration::from_millis(42));
        assert_eq!(request.default_error_message, "Sample Error Message");
    }
}
