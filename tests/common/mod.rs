#![allow(dead_code)]
use async_trait::async_trait;
use scrobble_harvest::{
    ApiRequest, ClientConfig, FmError, LastFmClient, PageCollector, PagedFetcher, PagedResource,
    RawResponse, Result, RetryConfig, RetryingCaller, Transport,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://localhost/2.0/";
pub const API_KEY: &str = "test-key";
pub const USERNAME: &str = "testuser";

/// In-memory Last.fm serving one paged resource from a fixed item list.
///
/// Pages are cut from `items` according to the request's `page` and `limit`.
/// Responses queued with [`fail_page`](Self::fail_page) are served first for
/// that page number.
pub struct PagedSource {
    resource: PagedResource,
    items: Vec<Value>,
    reported_total_pages: Option<u32>,
    failures: Mutex<HashMap<u32, VecDeque<RawResponse>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl PagedSource {
    pub fn new(resource: PagedResource, items: Vec<Value>) -> Self {
        Self {
            resource,
            items,
            reported_total_pages: None,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Report this page count regardless of how many items exist.
    pub fn reporting_total_pages(mut self, total_pages: u32) -> Self {
        self.reported_total_pages = Some(total_pages);
        self
    }

    pub fn fail_page(self, page: u32, responses: Vec<RawResponse>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .extend(responses);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.param("page").and_then(|p| p.parse().ok()))
            .collect()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn page_body(&self, page: u32, limit: u32) -> Value {
        let len = self.items.len();
        let start = ((page.max(1) - 1) as usize * limit as usize).min(len);
        let end = (start + limit as usize).min(len);
        let total_pages = self
            .reported_total_pages
            .unwrap_or_else(|| len.div_ceil(limit as usize) as u32);

        let mut payload = serde_json::Map::new();
        payload.insert(
            self.resource.items_key().to_string(),
            Value::Array(self.items[start..end].to_vec()),
        );
        payload.insert(
            "@attr".to_string(),
            json!({
                "user": USERNAME,
                "page": page.to_string(),
                "perPage": limit.to_string(),
                "total": len.to_string(),
                "totalPages": total_pages.to_string(),
            }),
        );

        let mut body = serde_json::Map::new();
        body.insert(self.resource.result_key().to_string(), Value::Object(payload));
        Value::Object(body)
    }
}

#[async_trait(?Send)]
impl Transport for PagedSource {
    async fn get(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(request.clone());

        let page: u32 = request
            .param("page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        let limit: u32 = request
            .param("limit")
            .and_then(|l| l.parse().ok())
            .unwrap_or(50);

        if let Some(queued) = self.failures.lock().unwrap().get_mut(&page) {
            if let Some(response) = queued.pop_front() {
                return Ok(response);
            }
        }

        Ok(RawResponse::new(200, self.page_body(page, limit).to_string()))
    }
}

/// Transport answering every request with canned bodies keyed by method.
pub struct MethodSource {
    bodies: HashMap<String, RawResponse>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MethodSource {
    pub fn new() -> Self {
        Self {
            bodies: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, method: &str, body: Value) -> Self {
        self.bodies
            .insert(method.to_string(), RawResponse::new(200, body.to_string()));
        self
    }

    pub fn with_response(mut self, method: &str, response: RawResponse) -> Self {
        self.bodies.insert(method.to_string(), response);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait(?Send)]
impl Transport for MethodSource {
    async fn get(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(request.clone());
        self.bodies
            .get(request.method())
            .cloned()
            .ok_or_else(|| FmError::Http(format!("no canned response for {}", request.method())))
    }
}

pub fn error_response(code: u32) -> RawResponse {
    RawResponse::new(
        500,
        json!({"error": code, "message": "Operation failed - Most likely the backend service failed. Please try again."})
            .to_string(),
    )
}

pub fn collector(transport: Arc<dyn Transport>) -> PageCollector {
    let caller = RetryingCaller::new(transport, RetryConfig::immediate());
    PageCollector::new(PagedFetcher::new(caller, BASE_URL, API_KEY).with_default_user(USERNAME))
}

pub fn client(transport: Arc<dyn Transport>) -> LastFmClient {
    let config = ClientConfig::new(API_KEY, USERNAME)
        .with_base_url(BASE_URL)
        .with_retry_config(RetryConfig::immediate());
    LastFmClient::new(transport, config)
}

/// Chart-style items `{"name": "item N", "rank": "N"}` for N in 1..=count.
pub fn ranked_items(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({"name": format!("item {i}"), "rank": i.to_string()}))
        .collect()
}

pub fn scrobble_item(name: &str, artist: &str, album: &str, uts: i64) -> Value {
    json!({
        "name": name,
        "mbid": "",
        "url": format!("https://www.last.fm/music/{artist}/_/{name}"),
        "artist": {"#text": artist, "mbid": ""},
        "album": {"#text": album, "mbid": ""},
        "image": [{"size": "small", "#text": ""}],
        "date": {"uts": uts.to_string(), "#text": ""}
    })
}

pub fn now_playing_item(name: &str, artist: &str) -> Value {
    json!({
        "name": name,
        "artist": {"#text": artist},
        "album": {"#text": ""},
        "@attr": {"nowplaying": "true"}
    })
}
