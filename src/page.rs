//! One page of a paged Last.fm result and the schema used to decode it.

use crate::parsing::lenient_u32;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paged Last.fm methods, each with the keys its response uses.
///
/// A successful response has the shape
/// `{<result_key>: {"@attr": {..}, <items_key>: [..]}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PagedResource {
    RecentTracks,
    TopTracks,
    TopAlbums,
    TopArtists,
}

impl PagedResource {
    pub fn method(&self) -> &'static str {
        match self {
            PagedResource::RecentTracks => "user.getrecenttracks",
            PagedResource::TopTracks => "user.gettoptracks",
            PagedResource::TopAlbums => "user.gettopalbums",
            PagedResource::TopArtists => "user.gettopartists",
        }
    }

    pub fn result_key(&self) -> &'static str {
        match self {
            PagedResource::RecentTracks => "recenttracks",
            PagedResource::TopTracks => "toptracks",
            PagedResource::TopAlbums => "topalbums",
            PagedResource::TopArtists => "topartists",
        }
    }

    pub fn items_key(&self) -> &'static str {
        match self {
            PagedResource::RecentTracks | PagedResource::TopTracks => "track",
            PagedResource::TopAlbums => "album",
            PagedResource::TopArtists => "artist",
        }
    }
}

/// Represents one fetched page.
///
/// `items.len() <= size` holds for every page but the last. Pages are
/// immutable once built; an empty page (no items, `total_pages == 0`) tells
/// the collector to stop.
///
/// # Examples
///
/// ```rust
/// use scrobble_harvest::Page;
///
/// let page: Page<u32> = Page::new(2, 50, 125, 3, (51..=100).collect());
/// assert_eq!(page.len(), 50);
/// assert!(!page.is_last());
///
/// let empty: Page<u32> = Page::empty(4);
/// assert!(empty.is_empty());
/// assert_eq!(empty.total_pages, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T = Value> {
    /// Page number (1-indexed)
    pub number: u32,
    /// Page size the source used
    pub size: u32,
    /// Total items in the whole result set, as reported
    pub total: u32,
    /// Total pages in the whole result set, as reported
    pub total_pages: u32,
    /// Raw items in source order
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(number: u32, size: u32, total: u32, total_pages: u32, items: Vec<T>) -> Self {
        Self {
            number: number.max(1),
            size,
            total,
            total_pages,
            items,
        }
    }

    /// Empty page standing in for page `number`.
    pub fn empty(number: u32) -> Self {
        Self::new(number, 0, 0, 0, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the source reports no pages after this one.
    pub fn is_last(&self) -> bool {
        self.number >= self.total_pages
    }

    /// Only the final page may carry more items than the reported page size.
    pub fn is_oversized(&self) -> bool {
        !self.is_last() && self.items.len() > self.size as usize
    }
}

/// The `@attr` pagination block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageAttr {
    #[serde(deserialize_with = "lenient_u32")]
    pub page: u32,
    #[serde(rename = "perPage", deserialize_with = "lenient_u32")]
    pub per_page: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub total: u32,
    #[serde(rename = "totalPages", deserialize_with = "lenient_u32")]
    pub total_pages: u32,
}

/// Decode a response body into a page of `resource`.
///
/// Fails closed: a missing result key, a missing or malformed `@attr` block,
/// a page number of zero, or a missing item list all yield
/// [`Page::empty`] for `requested_page`.
pub fn parse_page(resource: PagedResource, mut body: Value, requested_page: u32) -> Page {
    let Some(mut payload) = body.get_mut(resource.result_key()).map(Value::take) else {
        log::warn!(
            "{} response has no '{}' key",
            resource.method(),
            resource.result_key()
        );
        return Page::empty(requested_page);
    };

    let attr = match payload.get("@attr").map(PageAttr::deserialize) {
        Some(Ok(attr)) if attr.page >= 1 => attr,
        Some(Ok(_)) => {
            log::warn!("{} page metadata has page number 0", resource.method());
            return Page::empty(requested_page);
        }
        Some(Err(e)) => {
            log::warn!("{} page metadata malformed: {e}", resource.method());
            return Page::empty(requested_page);
        }
        None => {
            log::warn!("{} response has no page metadata", resource.method());
            return Page::empty(requested_page);
        }
    };

    let items = match payload.get_mut(resource.items_key()).map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => vec![item],
        _ => {
            log::debug!(
                "{} page {} has no '{}' list",
                resource.method(),
                attr.page,
                resource.items_key()
            );
            return Page::empty(requested_page);
        }
    };

    let page = Page::new(
        attr.page,
        attr.per_page,
        attr.total,
        attr.total_pages,
        items,
    );
    if page.is_oversized() {
        log::warn!(
            "{} page {}/{} has {} items, more than its page size {}",
            resource.method(),
            page.number,
            page.total_pages,
            page.len(),
            page.size
        );
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_string_metadata() {
        let body = json!({
            "toptracks": {
                "track": [{"name": "A"}, {"name": "B"}],
                "@attr": {"user": "someone", "page": "2", "perPage": "2", "total": "5", "totalPages": "3"}
            }
        });

        let page = parse_page(PagedResource::TopTracks, body, 2);
        assert_eq!(page.number, 2);
        assert_eq!(page.size, 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0]["name"], "A");
    }

    #[test]
    fn test_parse_page_numeric_metadata_single_item() {
        let body = json!({
            "topartists": {
                "artist": {"name": "Only"},
                "@attr": {"page": 1, "perPage": 50, "total": 1, "totalPages": 1}
            }
        });

        let page = parse_page(PagedResource::TopArtists, body, 1);
        assert_eq!(page.len(), 1);
        assert!(page.is_last());
    }

    #[test]
    fn test_parse_page_fails_closed() {
        let missing_key = json!({"somethingelse": {}});
        let page = parse_page(PagedResource::RecentTracks, missing_key, 3);
        assert!(page.is_empty());
        assert_eq!(page.number, 3);
        assert_eq!(page.total_pages, 0);

        let missing_attr = json!({"recenttracks": {"track": [{"name": "A"}]}});
        assert!(parse_page(PagedResource::RecentTracks, missing_attr, 1).is_empty());

        let zero_page = json!({
            "recenttracks": {
                "track": [{"name": "A"}],
                "@attr": {"page": "0", "perPage": "50", "total": "1", "totalPages": "1"}
            }
        });
        assert!(parse_page(PagedResource::RecentTracks, zero_page, 1).is_empty());

        let bad_attr = json!({
            "recenttracks": {
                "track": [{"name": "A"}],
                "@attr": {"page": "one", "perPage": "50", "total": "1", "totalPages": "1"}
            }
        });
        assert!(parse_page(PagedResource::RecentTracks, bad_attr, 1).is_empty());

        let no_items = json!({
            "recenttracks": {
                "@attr": {"page": "1", "perPage": "50", "total": "0", "totalPages": "0"}
            }
        });
        assert!(parse_page(PagedResource::RecentTracks, no_items, 1).is_empty());
    }

    #[test]
    fn test_oversized_page_is_flagged_but_kept() {
        let body = json!({
            "toptracks": {
                "track": [{"name": "A"}, {"name": "B"}, {"name": "C"}],
                "@attr": {"page": "1", "perPage": "2", "total": "5", "totalPages": "3"}
            }
        });
        let page = parse_page(PagedResource::TopTracks, body, 1);
        assert!(page.is_oversized());
        assert_eq!(page.len(), 3);

        let last = json!({
            "toptracks": {
                "track": [{"name": "D"}, {"name": "E"}, {"name": "F"}],
                "@attr": {"page": "3", "perPage": "2", "total": "6", "totalPages": "3"}
            }
        });
        assert!(!parse_page(PagedResource::TopTracks, last, 3).is_oversized());
    }
}
