//! Retrieval of Last.fm listening history and catalog data.
//!
//! The core is a paginated retrieval engine ([`PageCollector`]) that walks
//! multi-page responses into one bounded, ordered list while retrying
//! transient Last.fm error codes ([`RetryingCaller`]), and a sliding-window
//! duplicate scanner ([`duplicates::scan`]). [`LastFmClient`] composes both
//! into typed, read-only calls.

pub mod cancel;
pub mod client;
pub mod collector;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod page;
pub mod parsing;
pub mod retry;
pub mod transport;
pub mod types;

pub use cancel::CancellationState;
pub use client::{LastFmClient, RecentTracksQuery};
pub use collector::{CollectOptions, PageCollection, PageCollector};
pub use config::{ClientConfig, RetryConfig};
pub use duplicates::{DuplicateCandidate, ScrobbleEvent, TrackIdentity};
pub use error::FmError;
pub use events::{ClientEvent, ClientEventReceiver, RequestInfo, SharedEventBroadcaster};
pub use fetcher::{PageRequest, PagedFetcher};
pub use page::{Page, PagedResource};
pub use retry::{Envelope, RetryState, RetryingCaller};
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport};
pub use types::{
    Album, Artist, ChartEntries, ChartKind, Image, ImageSize, Period, Scrobble, Track,
    WeeklyChart, Wiki,
};

#[cfg(feature = "mock")]
pub use transport::MockTransport;

pub type Result<T> = std::result::Result<T, FmError>;
