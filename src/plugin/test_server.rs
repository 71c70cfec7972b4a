//! Page parsers for the toy test server
//!
//! The server has two kinds of pages:
//!
//! - Listing pages (`/page/N`) with a `Page number N` paragraph, a `<ul>` of
//!   links to data pages and a `<section class='pager'>` of links to
//!   neighbouring listing pages
//! - Data pages (`/data/D`) with `<span class='input'>D</span>` and
//!   `<span class='output'>D²</span>`

use crate::plugin::{Link, PageParser, PageTypeId, ParsedRecord, Row};
use crate::PluginError;
use scraper::{ElementRef, Html, Selector};

/// Dataset key of the records produced by [`DataPage`]
pub const DATA_KIND: &str = "data";

/// Parses a CSS selector, reporting failures as plugin errors
fn selector(operation: &'static str, css: &str) -> Result<Selector, PluginError> {
    Selector::parse(css).map_err(|e| PluginError::Failed {
        operation,
        message: format!("invalid selector '{}': {}", css, e),
    })
}

/// Collects the trimmed text of an element
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parser for listing pages
///
/// Pager links lead to more listing pages, list links lead to data pages.
/// Both type ids are supplied at construction so the parser does not depend
/// on how the caller numbers its page types.
#[derive(Debug, Clone)]
pub struct ListingPage {
    listing_type: PageTypeId,
    data_type: PageTypeId,
}

impl ListingPage {
    /// # Arguments
    ///
    /// * `listing_type` - Type id assigned to pager links
    /// * `data_type` - Type id assigned to data links
    pub fn new(listing_type: PageTypeId, data_type: PageTypeId) -> Self {
        Self {
            listing_type,
            data_type,
        }
    }
}

impl PageParser for ListingPage {
    fn name(&self) -> &str {
        "listing"
    }

    fn navigate(&self, content: &str) -> Result<Vec<Link>, PluginError> {
        let document = Html::parse_document(content);
        let mut links = Vec::new();

        let pager = selector("navigate", "section.pager a")?;
        for element in document.select(&pager) {
            if let Some(href) = element.value().attr("href") {
                links.push(Link::new(href, self.listing_type));
            }
        }

        let data = selector("navigate", "ul a")?;
        for element in document.select(&data) {
            if let Some(href) = element.value().attr("href") {
                links.push(Link::new(href, self.data_type));
            }
        }

        Ok(links)
    }

    /// A listing page is complete when its page number paragraph arrived
    fn validate(&self, content: &str) -> bool {
        let document = Html::parse_document(content);
        let Ok(paragraphs) = Selector::parse("p") else {
            return false;
        };

        document
            .select(&paragraphs)
            .any(|p| element_text(p).starts_with("Page number"))
    }

    fn supports_navigation(&self) -> bool {
        true
    }

    fn supports_validation(&self) -> bool {
        true
    }
}

/// Parser for data pages, producing one `data` record with `input` and `output`
#[derive(Debug, Clone, Copy, Default)]
pub struct DataPage;

impl DataPage {
    /// Reads the input/output pair
    ///
    /// A page with neither span has no record; a page with only one of them
    /// is malformed.
    fn extract(content: &str) -> Result<Option<Row>, PluginError> {
        let document = Html::parse_document(content);
        let input = selector("parse", ".input")?;
        let output = selector("parse", ".output")?;

        let input = document.select(&input).next().map(element_text);
        let output = document.select(&output).next().map(element_text);

        match (input, output) {
            (Some(input), Some(output)) => {
                let mut row = Row::new();
                row.insert("input".to_string(), input);
                row.insert("output".to_string(), output);
                Ok(Some(row))
            }
            (None, None) => Ok(None),
            (input, _) => Err(PluginError::InvalidOutput {
                operation: "parse",
                message: format!(
                    "data page has no '{}' value",
                    if input.is_none() { "input" } else { "output" }
                ),
            }),
        }
    }
}

impl PageParser for DataPage {
    fn name(&self) -> &str {
        "data"
    }

    fn parse(&self, content: &str) -> Result<Vec<ParsedRecord>, PluginError> {
        Ok(Self::extract(content)?
            .map(|fields| ParsedRecord::Flat {
                kind: DATA_KIND.to_string(),
                fields,
            })
            .into_iter()
            .collect())
    }

    fn validate(&self, content: &str) -> bool {
        matches!(Self::extract(content), Ok(Some(_)))
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_validation(&self) -> bool {
        true
    }
}

/// Renders listing page `n` the way the test server does
///
/// Shared with the integration tests' mock server so the parsers and the
/// served markup cannot drift apart.
pub fn listing_html(n: u32) -> String {
    let mut html = format!("<html><body><p>Page number {}</p><ul> ", n);
    for d in 0..10 {
        let id = u64::from(n) * 10 + d;
        html.push_str(&format!("<li><a href='/data/{}'>Data {}</a></li>", id, id));
    }
    html.push_str("</ul> <section class='pager'> ");
    for p in n.saturating_sub(5).max(1)..n.saturating_add(5).min(100) {
        html.push_str(&format!("<a href='/page/{}'>Page {}</a> ", p, p));
    }
    html.push_str("</section> </body></html>");
    html
}

/// Renders data page `d` the way the test server does
pub fn data_html(d: u64) -> String {
    let square = u128::from(d) * u128::from(d);
    format!(
        "<html><body><p>Data for <span class='input'>{}</span> is <span class='output'>{}</span></p></body></html>",
        d, square
    )
}
