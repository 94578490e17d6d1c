//! Sliding-window detection of repeated scrobbles.
//!
//! Last.fm occasionally records the same play twice a few tracks apart. The
//! scanner walks a newest-first listening history and reports pairs of plays
//! of the same track that sit within a small positional window of each other.

use crate::types::Scrobble;
use crate::{FmError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default number of consecutive scrobbles compared at once.
pub const DEFAULT_WINDOW_SIZE: usize = 7;

const LIBRARY_BASE_URL: &str = "https://www.last.fm/user";

/// What makes two plays "the same track".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackIdentity {
    pub name: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackIdentity {
    pub fn new(name: impl Into<String>, artist: Option<&str>, album: Option<&str>) -> Self {
        Self {
            name: name.into(),
            artist: artist.map(str::to_string),
            album: album.map(str::to_string),
        }
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(album) = &self.album {
            write!(f, " / {album}")?;
        }
        if let Some(artist) = &self.artist {
            write!(f, " / {artist}")?;
        }
        Ok(())
    }
}

/// One play as seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrobbleEvent {
    pub track: TrackIdentity,
    pub timestamp: DateTime<Utc>,
}

impl ScrobbleEvent {
    pub fn new(track: TrackIdentity, timestamp: DateTime<Utc>) -> Self {
        Self { track, timestamp }
    }
}

impl From<&Scrobble> for ScrobbleEvent {
    fn from(scrobble: &Scrobble) -> Self {
        Self {
            track: TrackIdentity::new(
                scrobble.track.name.clone(),
                scrobble.track.artist_name(),
                scrobble.track.album_name(),
            ),
            timestamp: scrobble.time,
        }
    }
}

/// A later play (`anchor`) of the same track as an earlier one (`candidate`)
/// found `offset` positions further back in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub anchor: ScrobbleEvent,
    pub candidate: ScrobbleEvent,
    pub anchor_index: usize,
    pub candidate_index: usize,
    pub offset: usize,
}

impl DuplicateCandidate {
    /// Minutes between the two plays; positive for newest-first input.
    pub fn minutes_apart(&self) -> f64 {
        (self.anchor.timestamp - self.candidate.timestamp).num_seconds() as f64 / 60.0
    }

    /// The track's page in `username`'s library, or `None` without an artist.
    pub fn track_library_url(&self, username: &str) -> Option<String> {
        let artist = self.anchor.track.artist.as_deref()?;
        Some(format!(
            "{LIBRARY_BASE_URL}/{}/library/music/{}/_/{}",
            encode_path(username),
            encode_plus(artist),
            encode_plus(&self.anchor.track.name)
        ))
    }

    /// Library listing covering the days of both plays.
    pub fn scrobbles_url(&self, username: &str) -> String {
        let (earlier, later) = if self.candidate.timestamp <= self.anchor.timestamp {
            (&self.candidate, &self.anchor)
        } else {
            (&self.anchor, &self.candidate)
        };
        format!(
            "{LIBRARY_BASE_URL}/{}/library?from={}&to={}",
            encode_path(username),
            earlier.timestamp.format("%Y-%m-%d"),
            later.timestamp.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for DuplicateCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}, {} (+{})",
            self.candidate.timestamp, self.anchor.timestamp, self.anchor.track, self.offset
        )
    }
}

fn encode_path(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Last.fm library URLs use `+` for spaces.
fn encode_plus(segment: &str) -> String {
    urlencoding::encode(segment).replace("%20", "+")
}

/// A window must hold an anchor and at least one other event.
pub fn validate_window_size(window_size: usize) -> Result<()> {
    if window_size < 2 {
        return Err(FmError::InvalidArgument(format!(
            "window size must be at least 2, got {window_size}"
        )));
    }
    Ok(())
}

/// Scan newest-first `events` for repeated plays.
///
/// Each position anchors a window of `window_size` events (clamped at the
/// end of the sequence); the anchor is compared with every other event in its
/// window. Candidates come out in anchor-then-offset order, each unordered
/// pair of events at most once: a play delivered twice by the source does not
/// multiply its candidates.
///
/// # Examples
///
/// ```rust
/// use chrono::DateTime;
/// use scrobble_harvest::duplicates::{scan, ScrobbleEvent, TrackIdentity};
///
/// let play = |name: &str, ts: i64| {
///     ScrobbleEvent::new(
///         TrackIdentity::new(name, Some("Artist"), None),
///         DateTime::from_timestamp(ts, 0).unwrap(),
///     )
/// };
/// let events = vec![play("A", 600), play("B", 400), play("A", 200)];
///
/// let found = scan(&events, 7).unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].offset, 2);
/// assert_eq!(found[0].minutes_apart(), 400.0 / 60.0);
/// ```
pub fn scan(events: &[ScrobbleEvent], window_size: usize) -> Result<Vec<DuplicateCandidate>> {
    validate_window_size(window_size)?;
    if events.len() < window_size {
        log::warn!(
            "fewer scrobbles than window size {}/{window_size}",
            events.len()
        );
    }

    let mut seen: HashSet<(&ScrobbleEvent, &ScrobbleEvent)> = HashSet::new();
    let mut found = Vec::new();

    for (anchor_index, anchor) in events.iter().enumerate() {
        let end = anchor_index.saturating_add(window_size).min(events.len());
        for candidate_index in anchor_index + 1..end {
            let candidate = &events[candidate_index];
            if candidate.track != anchor.track {
                continue;
            }
            // The same play can arrive twice when page boundaries shift.
            if seen.contains(&(candidate, anchor)) || !seen.insert((anchor, candidate)) {
                continue;
            }
            found.push(DuplicateCandidate {
                anchor: anchor.clone(),
                candidate: candidate.clone(),
                anchor_index,
                candidate_index,
                offset: candidate_index - anchor_index,
            });
        }
    }

    log::debug!("{} duplicate candidates in {} scrobbles", found.len(), events.len());
    Ok(found)
}
