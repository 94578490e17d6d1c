use crate::cancel::CancellationState;
use crate::config::RetryConfig;
use crate::events::{ClientEvent, RequestInfo, SharedEventBroadcaster};
use crate::parsing::lenient_u32;
use crate::transport::{ApiRequest, RawResponse, Transport};
use crate::{FmError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Decoded body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A JSON object with at least one key
    Body(Value),
    /// The body was empty, not JSON, or an empty object
    Empty,
}

impl Envelope {
    /// Decode a 2xx body. Anything that is not a non-empty JSON object is `Empty`.
    pub fn decode(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) if !map.is_empty() => Envelope::Body(Value::Object(map)),
            Ok(_) => Envelope::Empty,
            Err(e) => {
                log::warn!("Failed to decode JSON response body: {e}");
                Envelope::Empty
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Envelope::Empty)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Envelope::Body(value) => Some(value),
            Envelope::Empty => None,
        }
    }
}

/// Classified non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub http_code: u16,
    pub error_code: Option<u32>,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(deserialize_with = "lenient_u32")]
    error: u32,
    #[serde(default)]
    message: Option<String>,
}

impl ApiFailure {
    pub fn from_response(response: &RawResponse) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(&response.body) {
            Ok(envelope) => Self {
                http_code: response.status,
                error_code: Some(envelope.error),
                message: envelope.message.unwrap_or_default(),
            },
            Err(_) => Self {
                http_code: response.status,
                error_code: None,
                message: response.body.chars().take(200).collect(),
            },
        }
    }

    /// Whether `config` classifies this failure as transient.
    pub fn is_retryable(&self, config: &RetryConfig) -> bool {
        self.error_code
            .is_some_and(|code| config.is_retryable(code))
    }

    fn into_error(self) -> FmError {
        FmError::Api {
            http_code: self.http_code,
            error_code: self.error_code,
            message: self.message,
        }
    }
}

/// Retry budget for one logical call chain.
///
/// Callers own the state and pass it to every call that should share a
/// budget; it drops back to zero on any success and on any terminal failure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries issued since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    fn record_retry(&mut self) {
        self.attempts += 1;
    }
}

/// Issues API requests, retrying transient Last.fm error codes with backoff.
#[derive(Clone)]
pub struct RetryingCaller {
    transport: Arc<dyn Transport>,
    config: RetryConfig,
    events: Arc<SharedEventBroadcaster>,
    cancel: CancellationState,
}

impl RetryingCaller {
    pub fn new(transport: Arc<dyn Transport>, config: RetryConfig) -> Self {
        Self {
            transport,
            config,
            events: Arc::new(SharedEventBroadcaster::new()),
            cancel: CancellationState::new(),
        }
    }

    pub fn with_events(mut self, events: Arc<SharedEventBroadcaster>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationState) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<SharedEventBroadcaster> {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationState {
        &self.cancel
    }

    /// Send `request`, retrying while Last.fm answers with a retryable code.
    ///
    /// # Returns
    ///
    /// - `Ok(Envelope::Body(..))` - 2xx with a JSON object body
    /// - `Ok(Envelope::Empty)` - 2xx whose body could not be decoded
    /// - `Err(FmError::RetriesExhausted { .. })` - retryable code past the ceiling
    /// - `Err(FmError::Api { .. })` - any other non-2xx response
    /// - `Err(FmError::Http(..))` / `Err(FmError::Cancelled)` - no response / aborted
    pub async fn call(&self, request: &ApiRequest, state: &mut RetryState) -> Result<Envelope> {
        let info = RequestInfo::from_request(request);

        loop {
            if let Err(e) = self.cancel.check() {
                state.reset();
                return Err(e);
            }

            self.events.broadcast_event(ClientEvent::RequestStarted {
                request: info.clone(),
            });
            let started = Instant::now();

            let response = match self.transport.get(request).await {
                Ok(response) => response,
                Err(e) => {
                    log::error!("{} transport failure: {e}", info.short_description());
                    state.reset();
                    return Err(e);
                }
            };

            self.events.broadcast_event(ClientEvent::RequestCompleted {
                request: info.clone(),
                status_code: response.status,
                duration_ms: started.elapsed().as_millis() as u64,
            });

            if response.is_success() {
                log::debug!("GET {} {}", info.short_description(), response.status);
                state.reset();
                return Ok(Envelope::decode(&response.body));
            }

            let failure = ApiFailure::from_response(&response);
            let retryable_code = failure
                .is_retryable(&self.config)
                .then_some(failure.error_code)
                .flatten();

            let Some(error_code) = retryable_code else {
                log::error!(
                    "{} {} {:?} {}",
                    info.short_description(),
                    failure.http_code,
                    failure.error_code,
                    failure.message
                );
                state.reset();
                return Err(failure.into_error());
            };

            if state.attempts() >= self.config.max_retries {
                let attempts = state.attempts();
                log::error!(
                    "{} {} {error_code} {} retry limit reached",
                    info.short_description(),
                    failure.http_code,
                    failure.message
                );
                self.events.broadcast_event(ClientEvent::RetriesExhausted {
                    request: info.clone(),
                    error_code,
                    attempts,
                });
                state.reset();
                return Err(FmError::RetriesExhausted {
                    attempts,
                    http_code: failure.http_code,
                    error_code,
                    message: failure.message,
                });
            }

            let delay = self.config.delay_for(state.attempts());
            state.record_retry();
            log::warn!(
                "{} {} {error_code} {} retrying in {}ms ({}/{})",
                info.short_description(),
                failure.http_code,
                failure.message,
                delay.as_millis(),
                state.attempts(),
                self.config.max_retries
            );
            self.events.broadcast_event(ClientEvent::RetryScheduled {
                request: info.clone(),
                error_code,
                attempt: state.attempts(),
                max_retries: self.config.max_retries,
                delay_ms: delay.as_millis() as u64,
            });

            if let Err(e) = self.cancel.sleep(delay).await {
                state.reset();
                return Err(e);
            }
        }
    }
}
