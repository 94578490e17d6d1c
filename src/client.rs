use crate::cancel::CancellationState;
use crate::collector::{CollectOptions, PageCollector};
use crate::config::{ClientConfig, MAX_PAGE_SIZE};
use crate::duplicates::{scan, validate_window_size, DuplicateCandidate, ScrobbleEvent};
use crate::events::{ClientEvent, ClientEventReceiver, SharedEventBroadcaster};
use crate::fetcher::{PageRequest, PagedFetcher};
use crate::page::PagedResource;
use crate::parsing::{
    nested_items, parse_album, parse_artist, parse_chart_album, parse_scrobble, parse_track,
    parse_weekly_chart,
};
use crate::retry::{RetryState, RetryingCaller};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Album, Artist, ChartEntries, ChartKind, Period, Scrobble, Track, WeeklyChart};
use crate::{FmError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use http_client::HttpClient;
use serde_json::Value;
use std::sync::Arc;

/// Filters for [`LastFmClient::recent_tracks`].
///
/// By default the whole history of the configured user is fetched and a
/// leading "now playing" item is skipped without costing a slot of the limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTracksQuery {
    /// User to query; the configured user when `None`
    pub username: Option<String>,
    /// Maximum number of scrobbles; everything when `None`
    pub limit: Option<usize>,
    /// Only plays at or after this time
    pub from: Option<DateTime<Utc>>,
    /// Only plays before this time
    pub to: Option<DateTime<Utc>>,
    /// Items per page; the configured page size when `None`
    pub page_limit: Option<u32>,
    /// Fetch one extra item so a leading now-playing entry can be dropped.
    /// When `false`, a playing track costs one slot of `limit`.
    pub exclude_now_playing: bool,
}

impl Default for RecentTracksQuery {
    fn default() -> Self {
        Self {
            username: None,
            limit: None,
            from: None,
            to: None,
            page_limit: None,
            exclude_now_playing: true,
        }
    }
}

impl RecentTracksQuery {
    pub fn for_user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = Some(page_limit);
        self
    }

    /// With `false` the now-playing entry is still never returned, but it
    /// occupies one slot of the limit: while something is playing, a query
    /// with `limit = n` returns at most `n - 1` scrobbles.
    pub fn with_exclude_now_playing(mut self, exclude: bool) -> Self {
        self.exclude_now_playing = exclude;
        self
    }
}

/// Read-only client for a user's Last.fm listening history and catalog data.
///
/// Every call goes through the retrying page engine: transient Last.fm error
/// codes are retried with backoff and paged methods are collected up to the
/// requested limit.
///
/// # Examples
///
/// ```rust,no_run
/// use scrobble_harvest::{ClientConfig, LastFmClient, Period, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let config = ClientConfig::from_env()?;
///     let client = LastFmClient::with_http_client(
///         Box::new(http_client::native::NativeClient::new()),
///         config,
///     );
///
///     for track in client.top_tracks(Period::Month, None, Some(10)).await? {
///         println!("{track}");
///     }
///     println!("{} scrobbles", client.user_scrobble_count(None).await?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct LastFmClient {
    collector: PageCollector,
    config: ClientConfig,
    max_in_flight: usize,
}

impl LastFmClient {
    /// Create a client on top of any [`Transport`].
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let caller = RetryingCaller::new(transport, config.retry.clone())
            .with_events(Arc::new(SharedEventBroadcaster::new()))
            .with_cancellation(CancellationState::new());
        let fetcher = PagedFetcher::new(caller, config.base_url.clone(), config.api_key.clone())
            .with_default_user(config.username.clone());

        Self {
            collector: PageCollector::new(fetcher),
            config,
            max_in_flight: 1,
        }
    }

    /// Create a client that talks HTTP through `client`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use scrobble_harvest::{ClientConfig, LastFmClient};
    ///
    /// let client = LastFmClient::with_http_client(
    ///     Box::new(http_client::native::NativeClient::new()),
    ///     ClientConfig::new("api-key", "username"),
    /// );
    /// ```
    pub fn with_http_client(client: Box<dyn HttpClient + Send + Sync>, config: ClientConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new(client)), config)
    }

    /// Fetch the pages of top charts with up to `max_in_flight` requests
    /// outstanding once the page count is known. `1` keeps them sequential.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn collector(&self) -> &PageCollector {
        &self.collector
    }

    fn fetcher(&self) -> &PagedFetcher {
        self.collector.fetcher()
    }

    fn caller(&self) -> &RetryingCaller {
        self.fetcher().caller()
    }

    /// Subscribe to request, retry and page events.
    pub fn subscribe(&self) -> ClientEventReceiver {
        self.caller().events().subscribe()
    }

    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.caller().events().latest_event()
    }

    /// Handle that aborts in-flight collections with [`FmError::Cancelled`].
    pub fn cancellation(&self) -> &CancellationState {
        self.caller().cancellation()
    }

    fn user<'a>(&'a self, username: Option<&'a str>) -> &'a str {
        username.unwrap_or(&self.config.username)
    }

    /// One non-paged call; `None` when the response carried no JSON body.
    async fn get(&self, method: &str, params: &[(&str, &str)]) -> Result<Option<Value>> {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let request = self.fetcher().build_request(method, &params);
        let envelope = self.caller().call(&request, &mut RetryState::new()).await?;
        Ok(envelope.into_value())
    }

    // ============================================================================================
    // LISTENING HISTORY
    // ============================================================================================

    /// Scrobbles of a user, newest first.
    ///
    /// Items still playing carry no timestamp and are never returned.
    pub async fn recent_tracks(&self, query: RecentTracksQuery) -> Result<Vec<Scrobble>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(FmError::InvalidArgument(format!(
                    "time range starts after it ends: {from} > {to}"
                )));
            }
        }

        let user = self.user(query.username.as_deref());
        match query.limit {
            Some(limit) => log::info!("pulling {limit} tracks for {user}"),
            None => log::info!("pulling all tracks for {user}"),
        }

        let request = PageRequest::new(PagedResource::RecentTracks)
            .param("user", user)
            .param_opt("from", query.from.map(|t| t.timestamp()))
            .param_opt("to", query.to.map(|t| t.timestamp()));
        let options = CollectOptions::default()
            .with_page_limit(query.page_limit.unwrap_or(self.config.page_size))
            .with_response_limit(query.limit)
            .excluding_in_progress_head(query.exclude_now_playing);

        let items = self.collector.collect(&request, options).await?;
        items
            .iter()
            .filter_map(|item| parse_scrobble(item).transpose())
            .collect()
    }

    /// Scrobbles made on `date` (UTC midnight to midnight).
    pub async fn scrobbles_from_date(
        &self,
        date: NaiveDate,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Scrobble>> {
        log::info!("getting {date} scrobbles for {}", self.user(username));

        let from = date.and_time(NaiveTime::MIN).and_utc();
        let next_day = date
            .succ_opt()
            .ok_or_else(|| FmError::InvalidArgument(format!("no day after {date}")))?;
        let to = next_day.and_time(NaiveTime::MIN).and_utc();

        let mut query = RecentTracksQuery::default().between(from, to);
        query.username = username.map(str::to_string);
        query.limit = limit;
        self.recent_tracks(query).await
    }

    pub async fn count_scrobbles_from_date(
        &self,
        date: NaiveDate,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<usize> {
        log::info!("getting {date} scrobble count for {}", self.user(username));
        Ok(self.scrobbles_from_date(date, username, limit).await?.len())
    }

    /// Lifetime scrobble count from `user.getinfo`.
    pub async fn user_scrobble_count(&self, username: Option<&str>) -> Result<u64> {
        let user = self.user(username);
        log::info!("getting scrobble count {user}");

        let body = self.get("user.getinfo", &[("user", user)]).await?;
        let playcount = body
            .as_ref()
            .and_then(|body| body.get("user"))
            .and_then(|info| info.get("playcount"));
        let count = match playcount {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        count.ok_or_else(|| FmError::Parse(format!("no play count in user.getinfo for {user}")))
    }

    /// Recent scrobbles of the configured user checked for repeated plays.
    pub async fn duplicate_scrobbles(
        &self,
        limit: Option<usize>,
        window_size: usize,
    ) -> Result<Vec<DuplicateCandidate>> {
        validate_window_size(window_size)?;

        let mut query = RecentTracksQuery::default().with_page_limit(MAX_PAGE_SIZE);
        query.limit = limit;
        let scrobbles = self.recent_tracks(query).await?;
        if scrobbles.is_empty() {
            log::error!("No scrobbles returned");
            return Ok(Vec::new());
        }

        let events: Vec<ScrobbleEvent> = scrobbles.iter().map(ScrobbleEvent::from).collect();
        let found = scan(&events, window_size)?;
        log::info!("found {} duplicates in {} scrobbles", found.len(), events.len());
        Ok(found)
    }

    // ============================================================================================
    // CATALOG ENTITIES
    // ============================================================================================

    pub async fn track(
        &self,
        name: &str,
        artist: &str,
        username: Option<&str>,
    ) -> Result<Option<Track>> {
        let user = self.user(username);
        log::info!("getting {name} / {artist} for {user}");

        let body = self
            .get("track.getInfo", &[("track", name), ("artist", artist), ("user", user)])
            .await?;
        entity(body, "track").map(|v| parse_track(&v)).transpose()
    }

    pub async fn album(
        &self,
        name: &str,
        artist: &str,
        username: Option<&str>,
    ) -> Result<Option<Album>> {
        let user = self.user(username);
        log::info!("getting {name} / {artist} for {user}");

        let body = self
            .get("album.getInfo", &[("album", name), ("artist", artist), ("user", user)])
            .await?;
        entity(body, "album").map(|v| parse_album(&v)).transpose()
    }

    pub async fn artist(&self, name: &str, username: Option<&str>) -> Result<Option<Artist>> {
        let user = self.user(username);
        log::info!("getting {name} for {user}");

        let body = self
            .get("artist.getInfo", &[("artist", name), ("user", user)])
            .await?;
        entity(body, "artist").map(|v| parse_artist(&v)).transpose()
    }

    // ============================================================================================
    // CHARTS
    // ============================================================================================

    async fn top_items(
        &self,
        resource: PagedResource,
        period: Period,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        let user = self.user(username);
        match limit {
            Some(limit) => log::info!("pulling top {limit} {}s from {period} for {user}", resource.items_key()),
            None => log::info!("pulling top {}s from {period} for {user}", resource.items_key()),
        }

        let request = PageRequest::new(resource)
            .param("user", user)
            .param("period", period.as_api_str());
        let options = CollectOptions::default()
            .with_page_limit(self.config.page_size)
            .with_response_limit(limit);

        if self.max_in_flight > 1 {
            self.collector
                .collect_concurrent(&request, options, self.max_in_flight)
                .await
        } else {
            self.collector.collect(&request, options).await
        }
    }

    pub async fn top_tracks(
        &self,
        period: Period,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Track>> {
        let items = self
            .top_items(PagedResource::TopTracks, period, username, limit)
            .await?;
        items.iter().map(parse_track).collect()
    }

    pub async fn top_albums(
        &self,
        period: Period,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Album>> {
        let items = self
            .top_items(PagedResource::TopAlbums, period, username, limit)
            .await?;
        items.iter().map(parse_chart_album).collect()
    }

    pub async fn top_artists(
        &self,
        period: Period,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Artist>> {
        let items = self
            .top_items(PagedResource::TopArtists, period, username, limit)
            .await?;
        items.iter().map(parse_artist).collect()
    }

    /// Ranges for which Last.fm keeps weekly charts, oldest first.
    pub async fn weekly_charts(&self, username: Option<&str>) -> Result<Vec<WeeklyChart>> {
        log::info!("getting weekly chart list");

        let Some(body) = self
            .get("user.getweeklychartlist", &[("user", self.user(username))])
            .await?
        else {
            log::error!("no response");
            return Ok(Vec::new());
        };
        nested_items(&body, "weeklychartlist", "chart")
            .iter()
            .map(parse_weekly_chart)
            .collect()
    }

    /// Entries of one weekly chart, truncated to `limit`.
    pub async fn weekly_chart(
        &self,
        kind: ChartKind,
        range: WeeklyChart,
        username: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ChartEntries> {
        if range.from > range.to {
            return Err(FmError::InvalidArgument(format!(
                "chart range starts after it ends: {range}"
            )));
        }

        let user = self.user(username);
        log::info!(
            "pulling top {} entries from {range} for {user}",
            kind.items_key()
        );

        let from = range.from.to_string();
        let to = range.to.to_string();
        let body = self
            .get(kind.method(), &[("user", user), ("from", from.as_str()), ("to", to.as_str())])
            .await?;

        let mut items = match body {
            Some(body) => nested_items(&body, kind.result_key(), kind.items_key()),
            None => {
                log::error!("no response");
                Vec::new()
            }
        };
        if let Some(limit) = limit {
            items.truncate(limit);
        }

        Ok(match kind {
            ChartKind::Track => {
                ChartEntries::Tracks(items.iter().map(parse_track).collect::<Result<_>>()?)
            }
            ChartKind::Album => {
                ChartEntries::Albums(items.iter().map(parse_chart_album).collect::<Result<_>>()?)
            }
            ChartKind::Artist => {
                ChartEntries::Artists(items.iter().map(parse_artist).collect::<Result<_>>()?)
            }
        })
    }
}

/// The object under `key`, or `None` (logged) for an abnormal response.
fn entity(body: Option<Value>, key: &str) -> Option<Value> {
    let Some(mut body) = body else {
        log::error!("no response body for {key}");
        return None;
    };
    if !body.get(key).is_some_and(Value::is_object) {
        log::error!("abnormal response - {body}");
        return None;
    }
    body.get_mut(key).map(Value::take)
}
