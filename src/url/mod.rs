//! URL handling module for crab
//!
//! Pages are requested at the URL parsed by [`page_url`] or [`resolve_link`].
//! The visited set compares the normalized form from [`normalize_parsed`], so
//! equivalent spellings of one page are fetched once.

mod normalize;

pub use normalize::{normalize_parsed, normalize_url, page_url, resolve_link};

use url::Url;

/// Returns the `host[:port]` key used for per-host request spacing
///
/// # Examples
///
/// ```
/// use url::Url;
/// use crab::url::host_key;
///
/// let url = Url::parse("http://localhost:8080/page/1").unwrap();
/// assert_eq!(host_key(&url), Some("localhost:8080".to_string()));
///
/// let url = Url::parse("https://EXAMPLE.com/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
