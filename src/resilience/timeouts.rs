//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race an operation against a deadline and any external signals
//! - Classify the result as success, timeout, abort or error
//! - Release the timer and every signal listener on every path
//!
//! # Design Decisions
//! - Failures are returned inside an [`Outcome`], never as a panic or `Err`
//! - Timeout errors are distinct from abort errors: only the wrapper's own
//!   deadline yields a timeout, any external signal yields an abort even if
//!   it carries a timeout reason
//! - Timeouts are also published to an optional [`TimeoutSink`]
//! - When the operation and a signal are ready in the same poll, the
//!   operation wins

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;

use crate::config::TimeoutConfig;
use crate::error::{cast_error, Error, ErrorKind, Thrown};
use crate::events::notify::{TimeoutNotice, TimeoutSink};
use crate::observability::metrics;
use crate::signal::combine::combine;
use crate::signal::timeout::{TimeoutSignal, DEFAULT_TIMEOUT, DEFAULT_TIMEOUT_MESSAGE};
use crate::signal::{AbortReason, Signal};

/// Result of a timed operation: exactly one of a value or an error.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(Error),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Classification of the failure, `None` on success.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error().map(Error::kind)
    }

    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(error) => error.kind().as_str(),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Error> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}

/// Options for [`run_with_timeout`].
#[derive(Clone)]
pub struct RunOptions {
    /// Deadline for the operation.
    pub timeout: Duration,
    /// Message carried by the timeout error.
    pub default_error_message: String,
    /// Extra signals that abort the wait when they fire.
    pub external_signals: Vec<Signal>,
    /// Receives a notice whenever the deadline wins.
    pub notifier: Option<Arc<dyn TimeoutSink>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            timeout: config.timeout(),
            default_error_message: config.default_error_message.clone(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.default_error_message = message.into();
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.external_signals.push(signal);
        self
    }

    pub fn with_signals(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.external_signals.extend(signals);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn TimeoutSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            default_error_message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
            external_signals: Vec::new(),
            notifier: None,
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("timeout", &self.timeout)
            .field("default_error_message", &self.default_error_message)
            .field("external_signals", &self.external_signals.len())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

/// Run `operation` until it settles, the deadline elapses or an external
/// signal fires, whichever comes first.
///
/// The operation is dropped (not interrupted mid-poll) when a signal wins.
pub async fn run_with_timeout<F, T, E>(operation: F, options: RunOptions) -> Outcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Thrown>,
{
    let source = TimeoutSignal::new(options.timeout, options.default_error_message.clone());
    race(operation, &source, &options).await
}

pub(crate) async fn race<F, T, E>(operation: F, source: &TimeoutSignal, options: &RunOptions) -> Outcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Thrown>,
{
    let mut inputs = Vec::with_capacity(options.external_signals.len() + 1);
    inputs.extend(options.external_signals.iter().cloned());
    inputs.push(source.signal());
    let combined = combine(&inputs);

    let started = Instant::now();
    let mut deadline_elapsed = false;
    let outcome = {
        let fired = combined.fired();
        let operation = AssertUnwindSafe(operation).catch_unwind();

        tokio::select! {
            biased;

            settled = operation => match settled {
                Ok(Ok(value)) => Outcome::Success(value),
                Ok(Err(thrown)) => Outcome::Failure(cast_error(thrown)),
                Err(panic) => Outcome::Failure(cast_error(Thrown::from_panic(panic))),
            },
            reason = fired => {
                deadline_elapsed = is_own_deadline(source, &reason);
                if deadline_elapsed {
                    Outcome::Failure(reason.into_error())
                } else {
                    Outcome::Failure(external_abort(reason))
                }
            }
        }
    };

    source.clear();
    combined.detach_inputs();

    let elapsed_ms = started.elapsed().as_millis() as u64;
    metrics::record_outcome(outcome.label());
    match &outcome {
        Outcome::Success(_) => {
            tracing::debug!(elapsed_ms, "Operation settled");
        }
        Outcome::Failure(Error::Timeout { message }) if deadline_elapsed => {
            tracing::warn!(
                elapsed_ms,
                timeout_ms = options.timeout.as_millis() as u64,
                message = %message,
                "Operation timed out"
            );
            if let Some(notifier) = &options.notifier {
                notifier.timed_out(&TimeoutNotice {
                    message: message.clone(),
                    timeout: options.timeout,
                });
            }
        }
        Outcome::Failure(Error::Aborted { message }) => {
            tracing::warn!(elapsed_ms, message = %message, "Operation aborted");
        }
        Outcome::Failure(error) => {
            tracing::debug!(elapsed_ms, error = %error, "Operation failed");
        }
    }

    outcome
}

/// True if `reason` came from the wrapper's own deadline rather than from an
/// external signal.
fn is_own_deadline(source: &TimeoutSignal, reason: &AbortReason) -> bool {
    reason.is_timeout() && source.signal().reason().as_ref() == Some(reason)
}

/// An external signal won: always an abort, even if it carried a timeout
/// reason of its own.
fn external_abort(reason: AbortReason) -> Error {
    match reason {
        AbortReason::Timeout { message } => Error::Aborted { message },
        aborted => aborted.into_error(),
    }
}

/// Options for [`abort_process`].
#[derive(Debug, Clone)]
pub struct AbortProcessOptions {
    pub delay: Duration,
    pub default_error_message: String,
}

impl Default for AbortProcessOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_TIMEOUT,
            default_error_message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
        }
    }
}

/// Deadline-only variant of [`run_with_timeout`].
pub async fn abort_process<F, T, E>(operation: F, options: AbortProcessOptions) -> Outcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Thrown>,
{
    let options = RunOptions::new()
        .with_timeout(options.delay)
        .with_error_message(options.default_error_message);
    run_with_timeout(operation, options).await
}
