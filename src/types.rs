//! Data types for Last.fm catalog metadata and listening history.
//!
//! These are plain value containers produced by response parsing and consumed
//! by the duplicate scanner and the command-line front end.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ================================================================================================
// IMAGES AND WIKI
// ================================================================================================

/// Size label Last.fm attaches to artwork links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    Other,
    Small,
    Medium,
    Large,
    ExtraLarge,
    Mega,
}

impl ImageSize {
    pub fn from_api(size: &str) -> Self {
        match size {
            "small" => ImageSize::Small,
            "medium" => ImageSize::Medium,
            "large" => ImageSize::Large,
            "extralarge" => ImageSize::ExtraLarge,
            "mega" => ImageSize::Mega,
            _ => ImageSize::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    pub size: ImageSize,
    pub link: String,
}

/// Biography / description text attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wiki {
    /// Publish time as reported by Last.fm (no time zone given)
    pub published: Option<NaiveDateTime>,
    pub summary: Option<String>,
    pub content: Option<String>,
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.size, self.link)
    }
}

impl fmt::Display for Wiki {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.summary {
            Some(summary) => write!(f, "{summary}"),
            None => write!(f, "(no summary)"),
        }
    }
}

// ================================================================================================
// CATALOG ENTITIES
// ================================================================================================

/// Represents an artist with associated metadata.
///
/// Counters are `None` when the method that produced the record does not
/// report them.
///
/// # Examples
///
/// ```rust
/// use scrobble_harvest::Artist;
///
/// let artist = Artist::named("Radiohead");
/// assert_eq!(artist.to_string(), "Radiohead");
/// assert_eq!(artist.user_scrobbles, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    pub url: Option<String>,
    pub mbid: Option<String>,
    /// Distinct listeners across Last.fm
    pub listeners: Option<u64>,
    /// Global play count
    pub play_count: Option<u64>,
    /// Plays by the queried user
    pub user_scrobbles: Option<u64>,
    pub wiki: Option<Wiki>,
    pub images: Vec<Image>,
}

impl Artist {
    /// An artist record carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            mbid: None,
            listeners: None,
            play_count: None,
            user_scrobbles: None,
            wiki: None,
            images: Vec::new(),
        }
    }
}

/// Represents an album with associated metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    pub url: Option<String>,
    pub mbid: Option<String>,
    pub listeners: Option<u64>,
    pub play_count: Option<u64>,
    pub user_scrobbles: Option<u64>,
    pub wiki: Option<Wiki>,
    pub artist: Option<Artist>,
    pub images: Vec<Image>,
}

/// Represents a music track with associated metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub url: Option<String>,
    pub mbid: Option<String>,
    pub listeners: Option<u64>,
    pub play_count: Option<u64>,
    pub user_scrobbles: Option<u64>,
    /// Length in seconds, when known
    pub duration: Option<u64>,
    pub wiki: Option<Wiki>,
    pub album: Option<Album>,
    pub artist: Option<Artist>,
    pub images: Vec<Image>,
}

impl Track {
    pub fn artist_name(&self) -> Option<&str> {
        self.artist.as_ref().map(|a| a.name.as_str())
    }

    pub fn album_name(&self) -> Option<&str> {
        self.album.as_ref().map(|a| a.name.as_str())
    }
}

impl fmt::Display for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Album {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artist {
            Some(artist) => write!(f, "{} / {artist}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(album) = self.album_name() {
            write!(f, " / {album}")?;
        }
        if let Some(artist) = self.artist_name() {
            write!(f, " / {artist}")?;
        }
        Ok(())
    }
}

// ================================================================================================
// LISTENING HISTORY
// ================================================================================================

/// One logged play of a track.
///
/// # Examples
///
/// ```rust
/// use chrono::DateTime;
/// use scrobble_harvest::{Artist, Scrobble, Track};
///
/// let scrobble = Scrobble {
///     track: Track {
///         name: "Paranoid Android".to_string(),
///         url: None,
///         mbid: None,
///         listeners: None,
///         play_count: None,
///         user_scrobbles: None,
///         duration: None,
///         wiki: None,
///         album: None,
///         artist: Some(Artist::named("Radiohead")),
///         images: vec![],
///     },
///     time: DateTime::from_timestamp(1640995200, 0).unwrap(),
/// };
///
/// assert_eq!(
///     scrobble.to_string(),
///     "2022-01-01 00:00:00 UTC Paranoid Android / Radiohead"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scrobble {
    pub track: Track,
    pub time: DateTime<Utc>,
}

impl fmt::Display for Scrobble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time, self.track)
    }
}

/// Time span of one weekly chart, in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeeklyChart {
    pub from: i64,
    pub to: i64,
}

impl WeeklyChart {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn from_date(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.from, 0)
    }

    pub fn to_date(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.to, 0)
    }
}

impl fmt::Display for WeeklyChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

// ================================================================================================
// QUERY PARAMETERS
// ================================================================================================

/// Ranking period for top charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Overall,
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl Period {
    /// Value of the `period` query parameter.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Period::Overall => "overall",
            Period::Week => "7day",
            Period::Month => "1month",
            Period::Quarter => "3month",
            Period::HalfYear => "6month",
            Period::Year => "12month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Resource kind of a weekly chart, with the field names Last.fm uses for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    Album,
    Artist,
    Track,
}

impl ChartKind {
    pub fn method(&self) -> &'static str {
        match self {
            ChartKind::Album => "user.getweeklyalbumchart",
            ChartKind::Artist => "user.getweeklyartistchart",
            ChartKind::Track => "user.getweeklytrackchart",
        }
    }

    pub fn result_key(&self) -> &'static str {
        match self {
            ChartKind::Album => "weeklyalbumchart",
            ChartKind::Artist => "weeklyartistchart",
            ChartKind::Track => "weeklytrackchart",
        }
    }

    pub fn items_key(&self) -> &'static str {
        match self {
            ChartKind::Album => "album",
            ChartKind::Artist => "artist",
            ChartKind::Track => "track",
        }
    }
}

/// Entries of one weekly chart, typed by [`ChartKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartEntries {
    Albums(Vec<Album>),
    Artists(Vec<Artist>),
    Tracks(Vec<Track>),
}

impl ChartEntries {
    pub fn len(&self) -> usize {
        match self {
            ChartEntries::Albums(items) => items.len(),
            ChartEntries::Artists(items) => items.len(),
            ChartEntries::Tracks(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display strings of all entries, in chart order.
    pub fn labels(&self) -> Vec<String> {
        match self {
            ChartEntries::Albums(items) => items.iter().map(ToString::to_string).collect(),
            ChartEntries::Artists(items) => items.iter().map(ToString::to_string).collect(),
            ChartEntries::Tracks(items) => items.iter().map(ToString::to_string).collect(),
        }
    }
}
