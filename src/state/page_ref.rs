use crate::plugin::PageTypeId;
use crate::url::{normalize_parsed, page_url};
use crate::UrlResult;
use std::fmt;
use url::Url;

/// A page to fetch and the page type it should be interpreted as
///
/// `url` is requested exactly as it was linked; the normalized form is only
/// used as the identity key. `depth` records how far from a seed the page was
/// discovered.
#[derive(Debug, Clone)]
pub struct PageRef {
    url: Url,
    key: String,
    pub type_id: PageTypeId,
    pub depth: u16,
}

impl PageRef {
    /// Creates a page reference from a resolved URL
    pub fn new(url: Url, type_id: PageTypeId, depth: u16) -> UrlResult<Self> {
        let key = normalize_parsed(url.clone())?.into();
        Ok(Self {
            url,
            key,
            type_id,
            depth,
        })
    }

    /// Creates a depth 0 reference
    pub fn seed(url: &str, type_id: PageTypeId) -> UrlResult<Self> {
        Self::new(page_url(url)?, type_id, 0)
    }

    /// URL sent to the server
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Identity key shared by all references to the same page
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for PageRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PageRef {}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[type {} depth {}] {}", self.type_id, self.depth, self.url)
    }
}
