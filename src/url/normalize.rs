use crate::{UrlError, UrlResult};
use url::Url;

/// Tracking query parameters ignored when comparing page identities
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Parses a URL the crawler may request
///
/// Only the fragment is removed; everything else is sent as written. Use
/// [`normalize_parsed`] to get the identity of the page.
pub fn page_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    fetchable(url)
}

/// Normalizes a URL so that equivalent spellings share one identity
///
/// The result is a comparison key, not a URL to request.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https` (scheme is lowercased by parsing)
/// 3. Lowercase the host; default ports, dot segments and empty paths are
///    handled by parsing
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters, sort the remaining ones
/// 6. Remove empty query string (trailing ?)
///
/// Query parameters are compared as written, without re-encoding, and
/// repeated slashes in the path are significant.
///
/// # Examples
///
/// ```
/// use crab::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/page/1?b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page/1?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    normalize_parsed(page_url(url_str)?)
}

/// Normalizes an already parsed URL
pub fn normalize_parsed(url: Url) -> UrlResult<Url> {
    let mut url = fetchable(url)?;

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
        }
    }

    if let Some(query) = url.query() {
        let query = filter_and_sort_query(query);
        url.set_query(if query.is_empty() { None } else { Some(&query) });
    }

    Ok(url)
}

/// Resolves a link found on a page against the page URL
///
/// Absolute links are kept as they are, relative links are joined onto `base`.
/// The fragment is dropped; path and query are kept exactly as written.
/// Links that cannot lead to a fetchable page are rejected:
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - empty and fragment-only hrefs
/// - anything that does not resolve to HTTP(S)
///
/// # Examples
///
/// ```
/// use crab::url::{page_url, resolve_link};
///
/// let base = page_url("http://localhost:8080/page/1").unwrap();
/// let link = resolve_link(&base, "/data/10?flag").unwrap();
/// assert_eq!(link.as_str(), "http://localhost:8080/data/10?flag");
/// ```
pub fn resolve_link(base: &Url, href: &str) -> UrlResult<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return Err(UrlError::Malformed(format!(
            "Link '{}' does not point to another page",
            href
        )));
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return Err(UrlError::InvalidScheme(format!(
            "Link '{}' is not fetchable",
            href
        )));
    }

    let joined = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
    fetchable(joined)
}

/// Rejects URLs the fetcher cannot request and drops the fragment
fn fetchable(mut url: Url) -> UrlResult<Url> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if !matches!(url.host_str(), Some(host) if !host.is_empty()) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Drops tracking parameters and sorts the rest, keeping each pair's raw text
fn filter_and_sort_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or(pair);
            !is_tracking_param(key)
        })
        .collect();

    pairs.sort_unstable();
    pairs.join("&")
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
