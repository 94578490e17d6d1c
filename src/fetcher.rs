use crate::config::clamp_page_size;
use crate::events::ClientEvent;
use crate::page::{parse_page, Page, PagedResource};
use crate::retry::{Envelope, RetryState, RetryingCaller};
use crate::transport::ApiRequest;
use crate::Result;

/// A paged method plus the caller's filters (user, time range, period, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub resource: PagedResource,
    pub params: Vec<(String, String)>,
}

impl PageRequest {
    pub fn new(resource: PagedResource) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    /// Add a filter parameter, replacing an earlier one with the same key.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Add a filter parameter only when a value is present.
    pub fn param_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    fn has_param(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }
}

/// Fetches single pages: builds the query, runs it through the
/// [`RetryingCaller`] and decodes the envelope into a [`Page`].
#[derive(Clone)]
pub struct PagedFetcher {
    caller: RetryingCaller,
    base_url: String,
    api_key: String,
    default_user: Option<String>,
}

impl PagedFetcher {
    pub fn new(
        caller: RetryingCaller,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            caller,
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_user: None,
        }
    }

    /// User injected into every request whose filters do not name one.
    pub fn with_default_user(mut self, username: impl Into<String>) -> Self {
        self.default_user = Some(username.into());
        self
    }

    pub fn caller(&self) -> &RetryingCaller {
        &self.caller
    }

    /// Fixed fields (`format`, `method`, `api_key`, default `user`) followed by
    /// `params`. Used for both paged and single-shot methods.
    pub fn build_request(&self, method: &str, params: &[(String, String)]) -> ApiRequest {
        let mut query = vec![
            ("format".to_string(), "json".to_string()),
            ("method".to_string(), method.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
        ];
        if let Some(user) = &self.default_user {
            if !params.iter().any(|(k, _)| k == "user") {
                query.push(("user".to_string(), user.clone()));
            }
        }
        query.extend(params.iter().cloned());
        ApiRequest::new(self.base_url.clone(), query)
    }

    /// Fetch page `page_number` of `request` with `page_size` items per page.
    ///
    /// An empty or undecodable envelope yields [`Page::empty`]; transport and
    /// API failures propagate.
    pub async fn fetch(
        &self,
        request: &PageRequest,
        page_number: u32,
        page_size: u32,
        state: &mut RetryState,
    ) -> Result<Page> {
        let page_number = page_number.max(1);
        let mut params: Vec<(String, String)> = request
            .params
            .iter()
            .filter(|(k, _)| k != "limit" && k != "page")
            .cloned()
            .collect();
        params.push(("limit".to_string(), clamp_page_size(page_size).to_string()));
        params.push(("page".to_string(), page_number.to_string()));
        if request.has_param("limit") || request.has_param("page") {
            log::debug!("Ignoring caller-supplied limit/page for paged request");
        }

        let api_request = self.build_request(request.resource.method(), &params);
        let page = match self.caller.call(&api_request, state).await? {
            Envelope::Body(body) => parse_page(request.resource, body, page_number),
            Envelope::Empty => {
                log::error!(
                    "no response body for {} page {page_number}",
                    request.resource.method()
                );
                Page::empty(page_number)
            }
        };

        log::debug!(
            "{} page {}/{} ({} items)",
            request.resource.method(),
            page.number,
            page.total_pages,
            page.len()
        );
        self.caller.events().broadcast_event(ClientEvent::PageFetched {
            method: request.resource.method().to_string(),
            page: page.number,
            total_pages: page.total_pages,
            items: page.len(),
        });

        Ok(page)
    }
}
