use crate::config::{clamp_page_size, DEFAULT_PAGE_SIZE};
use crate::fetcher::{PageRequest, PagedFetcher};
use crate::page::Page;
use crate::parsing::is_now_playing;
use crate::retry::RetryState;
use crate::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

/// How much of a paged result to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectOptions {
    /// Items requested per page (clamped to 1..=200)
    pub page_limit: u32,
    /// Hard ceiling on returned items; `None` collects everything
    pub response_limit: Option<usize>,
    /// Drop a leading "now playing" item, fetching one extra item so the
    /// limit is still met
    pub exclude_in_progress_head: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_SIZE,
            response_limit: None,
            exclude_in_progress_head: false,
        }
    }
}

impl CollectOptions {
    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = clamp_page_size(page_limit);
        self
    }

    pub fn with_response_limit(mut self, response_limit: Option<usize>) -> Self {
        self.response_limit = response_limit;
        self
    }

    pub fn excluding_in_progress_head(mut self, exclude: bool) -> Self {
        self.exclude_in_progress_head = exclude;
        self
    }

    /// Items to gather before trimming: one extra when the head may be dropped.
    fn fetch_limit(&self) -> Option<usize> {
        match self.response_limit {
            Some(limit) if self.exclude_in_progress_head => Some(limit.saturating_add(1)),
            limit => limit,
        }
    }

    fn finish(&self, mut items: Vec<Value>) -> Vec<Value> {
        if self.exclude_in_progress_head && items.first().is_some_and(is_now_playing) {
            log::debug!("Dropping in-progress head item");
            items.remove(0);
        }
        if let Some(limit) = self.response_limit {
            items.truncate(limit);
        }
        items
    }
}

/// State of one collection: the pages gathered so far and the page cursor.
///
/// `cursor` counts fetch attempts; `pages` only holds non-empty pages, in
/// ascending page order.
#[derive(Debug, Clone)]
pub struct PageCollection {
    request: PageRequest,
    page_limit: u32,
    response_limit: Option<usize>,
    pages: Vec<Page>,
    cursor: u32,
}

impl PageCollection {
    pub fn new(request: PageRequest, page_limit: u32, response_limit: Option<usize>) -> Self {
        Self {
            request,
            page_limit: clamp_page_size(page_limit),
            response_limit,
            pages: Vec::new(),
            cursor: 0,
        }
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Items accumulated so far, before truncation.
    pub fn len(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total item count reported by the first page.
    pub fn total(&self) -> u32 {
        self.pages.first().map_or(0, |page| page.total)
    }

    /// All items in fetch order, truncated to the response limit.
    pub fn items(&self) -> Vec<Value> {
        let items = self.pages.iter().flat_map(|page| page.items.iter().cloned());
        match self.response_limit {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        let limit = self.response_limit.unwrap_or(usize::MAX);
        self.pages
            .into_iter()
            .flat_map(|page| page.items)
            .take(limit)
            .collect()
    }

    fn limit_reached(&self) -> bool {
        self.response_limit
            .is_some_and(|limit| self.len() >= limit)
    }

    /// The last appended page reports no page beyond the cursor.
    fn source_exhausted(&self) -> bool {
        self.pages
            .last()
            .is_some_and(|page| self.cursor >= page.total_pages)
    }
}

/// Walks successive pages of a paged method into one bounded item list.
///
/// # Examples
///
/// ```rust,no_run
/// use scrobble_harvest::{CollectOptions, PageRequest, PagedResource, LastFmClient, ClientConfig};
///
/// # tokio_test::block_on(async {
/// let client = LastFmClient::with_http_client(
///     Box::new(http_client::native::NativeClient::new()),
///     ClientConfig::new("api-key", "username"),
/// );
///
/// let request = PageRequest::new(PagedResource::TopArtists).param("period", "overall");
/// let options = CollectOptions::default()
///     .with_page_limit(200)
///     .with_response_limit(Some(500));
///
/// let items = client.collector().collect(&request, options).await?;
/// assert!(items.len() <= 500);
/// # Ok::<(), scrobble_harvest::FmError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct PageCollector {
    fetcher: PagedFetcher,
}

impl PageCollector {
    pub fn new(fetcher: PagedFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &PagedFetcher {
        &self.fetcher
    }

    /// Fetch pages into `collection` until the limit is met or the source is
    /// exhausted.
    ///
    /// Stops before fetching when the accumulated items reach the response
    /// limit or the last page reported itself as final; stops after fetching
    /// when the page is empty or its number exceeds the reported total.
    pub async fn load(&self, collection: &mut PageCollection, state: &mut RetryState) -> Result<()> {
        let method = collection.request.resource.method();

        loop {
            if collection.limit_reached() {
                log::debug!("{method}: response limit reached after {} pages", collection.cursor);
                break;
            }
            if collection.source_exhausted() {
                log::debug!("{method}: reported total of {} pages reached", collection.cursor);
                break;
            }
            self.fetcher.caller().cancellation().check()?;

            collection.cursor += 1;
            let page = self
                .fetcher
                .fetch(&collection.request, collection.cursor, collection.page_limit, state)
                .await?;

            if page.is_empty() {
                log::debug!("{method}: page {} empty, stopping", collection.cursor);
                break;
            }
            if collection.cursor > page.total_pages {
                log::debug!(
                    "{method}: page {} beyond reported total {}, stopping",
                    collection.cursor,
                    page.total_pages
                );
                break;
            }
            collection.pages.push(page);
        }

        Ok(())
    }

    /// Collect items of `request` according to `options`.
    ///
    /// Either every requested item comes back, in source order and truncated
    /// to the response limit, or the first terminal fetch error is returned;
    /// partial results are discarded.
    pub async fn collect(&self, request: &PageRequest, options: CollectOptions) -> Result<Vec<Value>> {
        let fetch_limit = options.fetch_limit();
        match options.response_limit {
            Some(limit) => log::info!("pulling {limit} items from {}", request.resource.method()),
            None => log::info!("pulling all items from {}", request.resource.method()),
        }
        if fetch_limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut collection = PageCollection::new(request.clone(), options.page_limit, fetch_limit);
        let mut state = RetryState::new();
        self.load(&mut collection, &mut state).await?;

        log::debug!(
            "{}: collected {} items over {} fetches",
            request.resource.method(),
            collection.len(),
            collection.cursor()
        );
        Ok(options.finish(collection.into_items()))
    }

    /// Like [`collect`](Self::collect), but once page 1 reveals the page count
    /// the remaining pages are fetched with up to `max_in_flight` requests
    /// outstanding. Page order is preserved, and the same stop rules as the
    /// sequential loop decide which fetched pages make it into the result.
    pub async fn collect_concurrent(
        &self,
        request: &PageRequest,
        options: CollectOptions,
        max_in_flight: usize,
    ) -> Result<Vec<Value>> {
        let fetch_limit = options.fetch_limit();
        if fetch_limit == Some(0) {
            return Ok(Vec::new());
        }
        let page_limit = clamp_page_size(options.page_limit);

        let first = self
            .fetcher
            .fetch(request, 1, page_limit, &mut RetryState::new())
            .await?;
        if first.is_empty() || first.total_pages == 0 {
            return Ok(Vec::new());
        }

        let page_size = if first.size > 0 { first.size } else { page_limit };
        let last_page = match fetch_limit {
            Some(limit) => {
                let needed = limit.div_ceil(page_size as usize).max(1);
                first
                    .total_pages
                    .min(u32::try_from(needed).unwrap_or(u32::MAX))
            }
            None => first.total_pages,
        };
        log::debug!(
            "{}: fetching pages 2..={last_page} with {max_in_flight} in flight",
            request.resource.method()
        );

        let rest: Vec<Page> = stream::iter(2..=last_page)
            .map(|number| async move {
                self.fetcher
                    .fetch(request, number, page_limit, &mut RetryState::new())
                    .await
            })
            .buffered(max_in_flight.max(1))
            .try_collect()
            .await?;

        // Apply the sequential stop rules to the pages in order.
        let mut reported_total = first.total_pages;
        let mut items = first.items;
        for (number, page) in (2u32..).zip(rest) {
            if page.is_empty() || number > reported_total || number > page.total_pages {
                log::debug!(
                    "{}: page {} ends the result (reported total {})",
                    request.resource.method(),
                    number,
                    page.total_pages
                );
                break;
            }
            reported_total = page.total_pages;
            items.extend(page.items);
        }

        items.truncate(fetch_limit.unwrap_or(usize::MAX));
        Ok(options.finish(items))
    }
}
