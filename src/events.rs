//! # Client events
//!
//! A broadcast channel that reports request, retry and paging activity so
//! consumers can monitor long collections without parsing log output.

use crate::transport::ApiRequest;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Request information for client events. The API key is never included.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestInfo {
    /// Last.fm method name, e.g. `user.getrecenttracks`
    pub method: String,
    /// Query parameters as key-value pairs, `api_key` redacted
    pub query_params: Vec<(String, String)>,
}

impl RequestInfo {
    pub fn from_request(request: &ApiRequest) -> Self {
        let query_params = request
            .query
            .iter()
            .map(|(k, v)| {
                if k == "api_key" {
                    (k.clone(), "<redacted>".to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();

        Self {
            method: request.param("method").unwrap_or_default().to_string(),
            query_params,
        }
    }

    /// Get a short description of the request for logging
    pub fn short_description(&self) -> String {
        let page = self
            .query_params
            .iter()
            .find(|(k, _)| k == "page")
            .map(|(_, v)| v.as_str());
        match page {
            Some(page) => format!("{} page={page}", self.method),
            None => self.method.clone(),
        }
    }
}

/// Event type to describe internal client activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Request started
    RequestStarted {
        /// Request details
        request: RequestInfo,
    },
    /// Response received (any status)
    RequestCompleted {
        /// Request details
        request: RequestInfo,
        /// HTTP status code
        status_code: u16,
        /// Duration of the request in milliseconds
        duration_ms: u64,
    },
    /// A transient error code was returned and a retry is scheduled
    RetryScheduled {
        /// Request details
        request: RequestInfo,
        /// Last.fm error code that triggered the retry
        error_code: u32,
        /// Retry number (1-based)
        attempt: u32,
        /// Configured retry ceiling
        max_retries: u32,
        /// Backoff before the retry in milliseconds
        delay_ms: u64,
    },
    /// The retry ceiling was reached
    RetriesExhausted {
        /// Request details
        request: RequestInfo,
        /// Last.fm error code of the final response
        error_code: u32,
        /// Retries issued before giving up
        attempts: u32,
    },
    /// A page was fetched and decoded
    PageFetched {
        /// Last.fm method name
        method: String,
        /// Page number (1-based)
        page: u32,
        /// Total pages reported by the source
        total_pages: u32,
        /// Items on this page
        items: usize,
    },
}

/// Type alias for the broadcast receiver
pub type ClientEventReceiver = broadcast::Receiver<ClientEvent>;

/// Shared event broadcasting state that persists across client clones
#[derive(Clone)]
pub struct SharedEventBroadcaster {
    event_tx: broadcast::Sender<ClientEvent>,
    last_event_tx: watch::Sender<Option<ClientEvent>>,
}

impl SharedEventBroadcaster {
    /// Create a new shared event broadcaster
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: ClientEvent) {
        let _ = self.event_tx.send(event.clone());
        self.last_event_tx.send_replace(Some(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> ClientEventReceiver {
        self.event_tx.subscribe()
    }

    /// Get the latest event
    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.last_event_tx.borrow().clone()
    }
}

impl Default for SharedEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_info_redacts_api_key() {
        let request = ApiRequest::new(
            "https://ws.audioscrobbler.com/2.0/",
            vec![
                ("format".to_string(), "json".to_string()),
                ("method".to_string(), "user.getrecenttracks".to_string()),
                ("api_key".to_string(), "secret".to_string()),
                ("page".to_string(), "3".to_string()),
            ],
        );

        let info = RequestInfo::from_request(&request);
        assert_eq!(info.method, "user.getrecenttracks");
        assert!(info
            .query_params
            .iter()
            .all(|(k, v)| k != "api_key" || v == "<redacted>"));
        assert_eq!(info.short_description(), "user.getrecenttracks page=3");
    }

    #[test]
    fn test_latest_event_tracks_last_broadcast() {
        let broadcaster = SharedEventBroadcaster::new();
        assert!(broadcaster.latest_event().is_none());

        let mut rx = broadcaster.subscribe();
        broadcaster.broadcast_event(ClientEvent::PageFetched {
            method: "user.gettoptracks".to_string(),
            page: 1,
            total_pages: 2,
            items: 50,
        });

        assert!(matches!(
            broadcaster.latest_event(),
            Some(ClientEvent::PageFetched { page: 1, .. })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(ClientEvent::PageFetched { items: 50, .. })
        ));
    }
}
