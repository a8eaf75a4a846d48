//! Shared pagination types for API query parameters.
//!
//! List endpoints use offset-based pagination with `offset` and `limit`
//! parameters, and wrap their results in a `{meta, links, data}` envelope
//! whose links carry the caller's other query parameters (so a paginated
//! usage report keeps its date range in every link).

use serde::{Deserialize, Serialize};
use url::Url;

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: usize = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: usize = 100;

/// Standard pagination parameters for list endpoints.
///
/// The `limit` is clamped between 1 and [`MAX_LIMIT`], preventing both
/// zero-result queries and excessive fetching.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Pagination {
    /// Number of items to skip (default: 0)
    pub offset: Option<usize>,

    /// Maximum number of items to return (default: 10, max: 100)
    pub limit: Option<usize>,
}

impl Pagination {
    /// Get the offset value, defaulting to 0 if not specified.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Get the limit value, clamped between 1 and [`MAX_LIMIT`].
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Get both offset and limit as a tuple, useful for destructuring.
    #[inline]
    pub fn params(&self) -> (usize, usize) {
        (self.offset(), self.limit())
    }
}

/// Pagination metadata: total match count before pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub count: usize,
}

/// Navigation links for the current page. `next`/`previous` are absent at
/// the edges of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    pub first: String,
    pub last: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

/// Envelope for paginated list responses.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub meta: Meta,
    pub links: Links,
    pub data: Vec<T>,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Build the envelope for one page.
    ///
    /// `base` is the request URL; its existing query parameters are kept in
    /// every link, with `offset`/`limit` replaced per link.
    pub fn new(base: &Url, data: Vec<T>, count: usize, pagination: &Pagination) -> Self {
        let (offset, limit) = pagination.params();

        let last_offset = if count == 0 {
            0
        } else {
            ((count - 1) / limit) * limit
        };
        let next = (offset + limit < count).then(|| page_url(base, offset + limit, limit));
        let previous = (offset > 0).then(|| page_url(base, offset.saturating_sub(limit), limit));

        Self {
            meta: Meta { count },
            links: Links {
                first: page_url(base, 0, limit),
                last: page_url(base, last_offset, limit),
                next,
                previous,
            },
            data,
        }
    }
}

/// The base URL with `offset`/`limit` replaced and every other query
/// parameter preserved.
fn page_url(base: &Url, offset: usize, limit: usize) -> String {
    let mut url = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "offset" && key != "limit")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept);
        pairs.append_pair("offset", &offset.to_string());
        pairs.append_pair("limit", &limit.to_string());
    }
    url.to_string()
}
