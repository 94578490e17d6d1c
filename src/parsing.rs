//! Decoding of Last.fm JSON items into domain records.
//!
//! Last.fm encodes most numbers as strings, returns a bare object where a
//! one-element list is expected, and uses different shapes for the same
//! entity depending on the method (`{"#text": ..}` in recent tracks,
//! `{"name": ..}` in charts, a plain string in `album.getInfo`). The serde
//! structs here accept all of those.

use crate::types::{Album, Artist, Image, ImageSize, Scrobble, Track, WeeklyChart, Wiki};
use crate::{FmError, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

/// Deserialize a `u32` given either as a JSON number or a numeric string.
pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => u32::try_from(n).map_err(de::Error::custom),
        NumberOrString::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Like [`lenient_u32`] but for optional `u64` counters: absent, empty or
/// unparseable values become `None`.
pub(crate) fn lenient_u64_opt<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accept a list, a single object, or nothing.
fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiImage {
    size: String,
    #[serde(rename = "#text")]
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiWiki {
    published: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiStats {
    #[serde(deserialize_with = "lenient_u64_opt")]
    listeners: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    playcount: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    userplaycount: Option<u64>,
}

/// Artist as it appears nested in other entities.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiArtistRef {
    Name(String),
    Object(Box<ApiArtist>),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiArtist {
    name: Option<String>,
    #[serde(rename = "#text")]
    text: Option<String>,
    url: Option<String>,
    mbid: Option<String>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    listeners: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    playcount: Option<u64>,
    stats: Option<ApiStats>,
    wiki: Option<ApiWiki>,
    bio: Option<ApiWiki>,
    #[serde(deserialize_with = "one_or_many")]
    image: Vec<ApiImage>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiAlbum {
    name: Option<String>,
    title: Option<String>,
    #[serde(rename = "#text")]
    text: Option<String>,
    url: Option<String>,
    mbid: Option<String>,
    artist: Option<ApiArtistRef>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    listeners: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    playcount: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    userplaycount: Option<u64>,
    wiki: Option<ApiWiki>,
    #[serde(deserialize_with = "one_or_many")]
    image: Vec<ApiImage>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiTrack {
    name: Option<String>,
    url: Option<String>,
    mbid: Option<String>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    listeners: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    playcount: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    userplaycount: Option<u64>,
    #[serde(deserialize_with = "lenient_u64_opt")]
    duration: Option<u64>,
    album: Option<ApiAlbum>,
    artist: Option<ApiArtistRef>,
    wiki: Option<ApiWiki>,
    #[serde(deserialize_with = "one_or_many")]
    image: Vec<ApiImage>,
    date: Option<ApiDate>,
    #[serde(rename = "@attr")]
    attr: Option<ApiTrackAttr>,
}

#[derive(Deserialize)]
struct ApiDate {
    uts: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiTrackAttr {
    nowplaying: Option<String>,
}

#[derive(Deserialize)]
struct ApiWeeklyChart {
    #[serde(deserialize_with = "lenient_u32")]
    from: u32,
    #[serde(deserialize_with = "lenient_u32")]
    to: u32,
}

/// Last.fm wiki publish times look like `01 Jan 2020, 12:00`.
const WIKI_DATE_FORMAT: &str = "%d %b %Y, %H:%M";

impl From<ApiImage> for Image {
    fn from(image: ApiImage) -> Self {
        Image {
            size: ImageSize::from_api(&image.size),
            link: image.text,
        }
    }
}

fn convert_wiki(wiki: ApiWiki) -> Option<Wiki> {
    if wiki.summary.is_none() && wiki.content.is_none() {
        return None;
    }
    let published = wiki.published.as_deref().and_then(|s| {
        NaiveDateTime::parse_from_str(s, WIKI_DATE_FORMAT)
            .map_err(|e| log::debug!("Unparseable wiki date '{s}': {e}"))
            .ok()
    });
    Some(Wiki {
        published,
        summary: wiki.summary,
        content: wiki.content,
    })
}

fn convert_artist(artist: ApiArtist) -> Artist {
    let stats = artist.stats.unwrap_or_default();
    Artist {
        name: artist
            .name
            .or(artist.text)
            .unwrap_or_else(|| "n/a".to_string()),
        url: non_empty(artist.url),
        mbid: non_empty(artist.mbid),
        listeners: stats.listeners.or(artist.listeners),
        play_count: stats.playcount,
        user_scrobbles: stats.userplaycount.or(artist.playcount),
        wiki: artist.bio.or(artist.wiki).and_then(convert_wiki),
        images: artist.image.into_iter().map(Image::from).collect(),
    }
}

fn convert_artist_ref(artist: ApiArtistRef) -> Artist {
    match artist {
        ApiArtistRef::Name(name) => Artist::named(name),
        ApiArtistRef::Object(artist) => convert_artist(*artist),
    }
}

/// `chart` albums carry the user's play count in `playcount`.
fn convert_album(album: ApiAlbum, chart: bool) -> Album {
    let (play_count, user_scrobbles) = if chart {
        (None, album.playcount)
    } else {
        (album.playcount, album.userplaycount)
    };
    Album {
        name: album
            .name
            .or(album.title)
            .or(album.text)
            .unwrap_or_else(|| "n/a".to_string()),
        url: non_empty(album.url),
        mbid: non_empty(album.mbid),
        listeners: album.listeners,
        play_count,
        user_scrobbles,
        wiki: album.wiki.and_then(convert_wiki),
        artist: album.artist.map(convert_artist_ref),
        images: album.image.into_iter().map(Image::from).collect(),
    }
}

fn convert_track(track: ApiTrack) -> Track {
    let artist = track.artist.map(convert_artist_ref);
    let mut album = track.album.map(|a| convert_album(a, false));
    if let (Some(album), Some(artist)) = (album.as_mut(), artist.as_ref()) {
        if album.artist.is_none() {
            album.artist = Some(artist.clone());
        }
    }

    Track {
        name: track.name.unwrap_or_else(|| "n/a".to_string()),
        url: non_empty(track.url),
        mbid: non_empty(track.mbid),
        listeners: track.listeners,
        play_count: track.playcount,
        user_scrobbles: track.userplaycount,
        duration: track.duration.filter(|d| *d > 0),
        wiki: track.wiki.and_then(convert_wiki),
        album,
        artist,
        images: track.image.into_iter().map(Image::from).collect(),
    }
}

fn decode<T: for<'de> Deserialize<'de>>(value: &Value, what: &str) -> Result<T> {
    T::deserialize(value).map_err(|e| FmError::Parse(format!("invalid {what}: {e}")))
}

pub fn parse_artist(value: &Value) -> Result<Artist> {
    Ok(convert_artist(decode(value, "artist")?))
}

pub fn parse_album(value: &Value) -> Result<Album> {
    Ok(convert_album(decode(value, "album")?, false))
}

/// Album entries from `user.gettopalbums` and weekly album charts.
pub fn parse_chart_album(value: &Value) -> Result<Album> {
    Ok(convert_album(decode(value, "chart album")?, true))
}

pub fn parse_track(value: &Value) -> Result<Track> {
    Ok(convert_track(decode(value, "track")?))
}

/// Whether a recent-tracks item is flagged as the currently playing, not yet
/// scrobbled, track.
pub fn is_now_playing(value: &Value) -> bool {
    value
        .get("@attr")
        .and_then(|attr| attr.get("nowplaying"))
        .and_then(Value::as_str)
        == Some("true")
}

/// Parse one recent-tracks item. Items without a `date` (now playing) yield `None`.
pub fn parse_scrobble(value: &Value) -> Result<Option<Scrobble>> {
    let mut track: ApiTrack = decode(value, "scrobble")?;
    if track.attr.as_ref().and_then(|a| a.nowplaying.as_deref()) == Some("true") {
        return Ok(None);
    }
    let Some(date) = track.date.take() else {
        return Ok(None);
    };
    let uts: i64 = date
        .uts
        .trim()
        .parse()
        .map_err(|e| FmError::Parse(format!("invalid scrobble timestamp '{}': {e}", date.uts)))?;
    let time = DateTime::from_timestamp(uts, 0)
        .ok_or_else(|| FmError::Parse(format!("scrobble timestamp out of range: {uts}")))?;

    Ok(Some(Scrobble {
        track: convert_track(track),
        time,
    }))
}

pub fn parse_weekly_chart(value: &Value) -> Result<WeeklyChart> {
    let chart: ApiWeeklyChart = decode(value, "weekly chart")?;
    Ok(WeeklyChart::new(i64::from(chart.from), i64::from(chart.to)))
}

/// Items under `body[result_key][items_key]`, accepting a bare object as a
/// one-item list. Missing keys yield an empty list.
pub fn nested_items(body: &Value, result_key: &str, items_key: &str) -> Vec<Value> {
    match body.get(result_key).and_then(|payload| payload.get(items_key)) {
        Some(Value::Array(items)) => items.clone(),
        Some(item @ Value::Object(_)) => vec![item.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scrobble() {
        let item = json!({
            "name": "Paranoid Android",
            "mbid": "",
            "url": "https://www.last.fm/music/Radiohead/_/Paranoid+Android",
            "artist": {"#text": "Radiohead", "mbid": "a74b1b7f"},
            "album": {"#text": "OK Computer", "mbid": ""},
            "image": [{"size": "small", "#text": "https://img/small.png"}],
            "date": {"uts": "1640995200", "#text": "01 Jan 2022, 00:00"}
        });

        let scrobble = parse_scrobble(&item).unwrap().unwrap();
        assert_eq!(scrobble.track.name, "Paranoid Android");
        assert_eq!(scrobble.track.mbid, None);
        assert_eq!(scrobble.time.timestamp(), 1640995200);

        let artist = scrobble.track.artist.as_ref().unwrap();
        assert_eq!(artist.name, "Radiohead");
        let album = scrobble.track.album.as_ref().unwrap();
        assert_eq!(album.name, "OK Computer");
        assert_eq!(album.artist.as_ref().unwrap().name, "Radiohead");
        assert_eq!(scrobble.track.images[0].size, ImageSize::Small);
    }

    #[test]
    fn test_now_playing_is_not_a_scrobble() {
        let item = json!({
            "name": "Now Playing",
            "artist": {"#text": "Some Artist"},
            "album": {"#text": "Some Album"},
            "@attr": {"nowplaying": "true"}
        });

        assert!(is_now_playing(&item));
        assert!(parse_scrobble(&item).unwrap().is_none());
    }

    #[test]
    fn test_parse_chart_track_with_string_counts() {
        let item = json!({
            "name": "Karma Police",
            "playcount": "42",
            "listeners": 1000,
            "duration": "0",
            "artist": {"name": "Radiohead", "url": "https://www.last.fm/music/Radiohead"}
        });

        let track = parse_track(&item).unwrap();
        assert_eq!(track.play_count, Some(42));
        assert_eq!(track.listeners, Some(1000));
        assert_eq!(track.duration, None);
        assert_eq!(track.artist.unwrap().name, "Radiohead");
    }

    #[test]
    fn test_parse_artist_info_with_stats_and_bio() {
        let item = json!({
            "name": "Radiohead",
            "stats": {"listeners": "5000000", "playcount": "500000000", "userplaycount": "321"},
            "bio": {
                "published": "01 Feb 2009, 12:34",
                "summary": "English rock band",
                "content": "Longer text"
            }
        });

        let artist = parse_artist(&item).unwrap();
        assert_eq!(artist.listeners, Some(5_000_000));
        assert_eq!(artist.user_scrobbles, Some(321));
        let wiki = artist.wiki.unwrap();
        assert_eq!(
            wiki.published.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2009-02-01 12:34"
        );
    }

    #[test]
    fn test_chart_album_uses_playcount_as_user_scrobbles() {
        let item = json!({
            "name": "In Rainbows",
            "playcount": "77",
            "artist": {"name": "Radiohead"}
        });

        let album = parse_chart_album(&item).unwrap();
        assert_eq!(album.user_scrobbles, Some(77));
        assert_eq!(album.play_count, None);

        let album_info = parse_album(&json!({
            "name": "In Rainbows",
            "artist": "Radiohead",
            "playcount": "900",
            "userplaycount": 12
        }))
        .unwrap();
        assert_eq!(album_info.play_count, Some(900));
        assert_eq!(album_info.user_scrobbles, Some(12));
        assert_eq!(album_info.artist.unwrap().name, "Radiohead");
    }

    #[test]
    fn test_nested_items_single_object() {
        let body = json!({"weeklytrackchart": {"track": {"name": "Only One"}}});
        let items = nested_items(&body, "weeklytrackchart", "track");
        assert_eq!(items.len(), 1);
        assert!(nested_items(&body, "weeklytrackchart", "album").is_empty());
    }
}
