mod common;

use async_trait::async_trait;
use common::{error_response, BASE_URL};
use scrobble_harvest::{
    ApiRequest, ClientEvent, FmError, RawResponse, Result, RetryConfig, RetryState,
    RetryingCaller, Transport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Serves queued responses in order, repeating the last one forever.
struct Sequence {
    responses: Mutex<VecDeque<RawResponse>>,
    calls: Mutex<usize>,
}

impl Sequence {
    fn new(responses: Vec<RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait(?Send)]
impl Transport for Sequence {
    async fn get(&self, _request: &ApiRequest) -> Result<RawResponse> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.ok_or_else(|| FmError::Http("no response queued".to_string()))
    }
}

fn request() -> ApiRequest {
    ApiRequest::new(
        BASE_URL,
        vec![
            ("method".to_string(), "user.getrecenttracks".to_string()),
            ("api_key".to_string(), "secret".to_string()),
        ],
    )
}

#[test_log::test(tokio::test)]
async fn test_always_busy_gives_up_after_five_retries() {
    let transport = Sequence::new(vec![error_response(8)]);
    let caller = RetryingCaller::new(transport.clone(), RetryConfig::immediate());

    let mut state = RetryState::new();
    let err = caller.call(&request(), &mut state).await.unwrap_err();

    match err {
        FmError::RetriesExhausted {
            attempts,
            http_code,
            error_code,
            ..
        } => {
            assert_eq!(attempts, 5);
            assert_eq!(http_code, 500);
            assert_eq!(error_code, 8);
        }
        other => panic!("Expected RetriesExhausted, got: {other:?}"),
    }
    assert_eq!(transport.calls(), 6);
    assert_eq!(state.attempts(), 0);
}

#[tokio::test]
async fn test_success_on_third_attempt() {
    let transport = Sequence::new(vec![
        error_response(16),
        error_response(11),
        RawResponse::new(200, r#"{"recenttracks": {}}"#),
    ]);
    let caller = RetryingCaller::new(transport.clone(), RetryConfig::immediate());

    let mut state = RetryState::new();
    let envelope = caller.call(&request(), &mut state).await.unwrap();

    assert!(!envelope.is_empty());
    assert_eq!(transport.calls(), 3);
    assert_eq!(state.attempts(), 0);
}

#[tokio::test]
async fn test_state_is_per_call() {
    // Two busy answers on one call must not eat into the next call's budget.
    let transport = Sequence::new(vec![
        error_response(8),
        error_response(8),
        RawResponse::new(200, "{}"),
        error_response(8),
        error_response(8),
        error_response(8),
        error_response(8),
        error_response(8),
        RawResponse::new(200, "{}"),
    ]);
    let caller = RetryingCaller::new(transport.clone(), RetryConfig::immediate());

    caller
        .call(&request(), &mut RetryState::new())
        .await
        .unwrap();
    caller
        .call(&request(), &mut RetryState::new())
        .await
        .unwrap();

    assert_eq!(transport.calls(), 9);
}

#[tokio::test]
async fn test_custom_retryable_codes() {
    let transport = Sequence::new(vec![error_response(29), RawResponse::new(200, "{}")]);
    let config = RetryConfig::immediate().with_retryable_codes(vec![29]);
    let caller = RetryingCaller::new(transport.clone(), config);

    caller
        .call(&request(), &mut RetryState::new())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 2);

    let transport = Sequence::new(vec![error_response(8)]);
    let caller = RetryingCaller::new(
        transport.clone(),
        RetryConfig::immediate().with_retryable_codes(vec![29]),
    );
    let err = caller
        .call(&request(), &mut RetryState::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::Api { error_code: Some(8), .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_retry_events_are_broadcast() {
    let transport = Sequence::new(vec![error_response(8)]);
    let config = RetryConfig {
        max_retries: 2,
        ..RetryConfig::immediate()
    };
    let caller = RetryingCaller::new(transport, config);
    let mut events = caller.events().subscribe();

    let _ = caller.call(&request(), &mut RetryState::new()).await;

    let mut scheduled = Vec::new();
    let mut exhausted = None;
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::RetryScheduled { attempt, request, .. } => {
                assert!(request
                    .query_params
                    .iter()
                    .all(|(k, v)| k != "api_key" || v != "secret"));
                scheduled.push(attempt);
            }
            ClientEvent::RetriesExhausted { attempts, .. } => exhausted = Some(attempts),
            _ => {}
        }
    }

    assert_eq!(scheduled, vec![1, 2]);
    assert_eq!(exhausted, Some(2));
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let transport = Sequence::new(vec![error_response(8)]);
    let config = RetryConfig::default().with_delays(
        std::time::Duration::from_secs(3600),
        std::time::Duration::from_secs(3600),
    );
    let caller = RetryingCaller::new(transport.clone(), config);
    let cancel = caller.cancellation().clone();

    let call = async {
        let mut state = RetryState::new();
        caller.call(&request(), &mut state).await
    };
    let cancel_soon = async {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
    };

    let (result, ()) = tokio::join!(call, cancel_soon);
    assert!(matches!(result, Err(FmError::Cancelled)));
    assert_eq!(transport.calls(), 1);
}
