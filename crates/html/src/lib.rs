//! # jobwatch-html: Listing Extraction
//!
//! This crate turns the markup of a job board page into candidate listing
//! elements and pulls the title, link and marker text out of each one.
//!
//! Every field lookup goes through a two-strategy resolver: a structural CSS
//! query runs first, and a lenient scan over descendant elements runs only when
//! the query yields nothing. The scan compares tag names and class tokens
//! case-insensitively, so small template drifts on the site still resolve.
//!
//! The element rule ("list items without a class") mirrors the markup of a
//! single job board. It is fragile and breaks as soon as that site changes
//! how it renders postings.

use scraper::{element_ref::Select, ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

/// Errors raised while building the listing scanner.
#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

fn invalid_selector(selector: &str, reason: impl Into<String>) -> HtmlError {
    HtmlError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

/// Queries describing the sub-elements that make up one listing.
///
/// Each query has the form `tag` or `tag.class[.class...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSelectors {
    /// The block holding the posting title and its anchor.
    pub title: String,
    /// The tag spans carrying location and remote-policy text.
    pub marker: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            title: "p.mv0.f3.lh-title".to_string(),
            marker: "span.dotted".to_string(),
        }
    }
}

/// Which resolver strategy produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The CSS query matched.
    Structural,
    /// The query found nothing and the descendant scan matched.
    Scan,
}

/// A value together with the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub strategy: Strategy,
}

/// A `tag.class.class` query that can be resolved with either strategy.
#[derive(Debug, Clone)]
pub struct ElementQuery {
    tag: String,
    classes: Vec<String>,
    selector: Selector,
}

impl ElementQuery {
    pub fn parse(source: &str) -> Result<Self, HtmlError> {
        let source = source.trim();
        let mut parts = source.split('.');
        let tag = parts.next().unwrap_or_default().to_ascii_lowercase();
        let classes: Vec<String> = parts.map(str::to_string).collect();

        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid_selector(
                source,
                "expected `tag` or `tag.class[.class...]`",
            ));
        }
        if classes.iter().any(|class| class.is_empty()) {
            return Err(invalid_selector(source, "empty class name"));
        }

        let selector =
            Selector::parse(source).map_err(|e| invalid_selector(source, e.to_string()))?;

        Ok(Self {
            tag,
            classes,
            selector,
        })
    }

    fn structural<'a, 'b>(&'b self, scope: ElementRef<'a>) -> Select<'a, 'b> {
        scope.select(&self.selector)
    }

    fn scan<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        scope
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|element| self.accepts(element))
            .collect()
    }

    fn accepts(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        if !value.name().eq_ignore_ascii_case(&self.tag) {
            return false;
        }
        let tokens: Vec<&str> = value
            .attr("class")
            .unwrap_or_default()
            .split_whitespace()
            .collect();
        self.classes
            .iter()
            .all(|wanted| tokens.iter().any(|token| token.eq_ignore_ascii_case(wanted)))
    }

    /// Returns the first element in `scope` matching the query and `accept`.
    ///
    /// The scan only runs when the structural query has no accepted element.
    pub fn resolve_first<'a, F>(
        &self,
        scope: ElementRef<'a>,
        accept: F,
    ) -> Option<Resolved<ElementRef<'a>>>
    where
        F: Fn(&ElementRef<'a>) -> bool,
    {
        if let Some(element) = self.structural(scope).find(|el| accept(el)) {
            return Some(Resolved {
                value: element,
                strategy: Strategy::Structural,
            });
        }
        self.scan(scope)
            .into_iter()
            .find(|el| accept(el))
            .map(|element| Resolved {
                value: element,
                strategy: Strategy::Scan,
            })
    }

    /// Space-joins the text of every matching element, trimmed.
    ///
    /// Falls back to the scan when the structural query yields no text.
    pub fn resolve_joined_text(&self, scope: ElementRef<'_>) -> Option<Resolved<String>> {
        let structural = join_text(self.structural(scope));
        if !structural.is_empty() {
            return Some(Resolved {
                value: structural,
                strategy: Strategy::Structural,
            });
        }
        let scanned = join_text(self.scan(scope));
        (!scanned.is_empty()).then_some(Resolved {
            value: scanned,
            strategy: Strategy::Scan,
        })
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

fn join_text<'a>(elements: impl IntoIterator<Item = ElementRef<'a>>) -> String {
    elements
        .into_iter()
        .map(|el| element_text(&el))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// A parsed page of postings.
///
/// `scraper::Html` is not `Send`; keep a page inside synchronous code and drop
/// it before the next `.await`.
pub struct ListingPage {
    document: Html,
}

impl ListingPage {
    pub fn parse(markup: &str) -> Self {
        Self {
            document: Html::parse_document(markup),
        }
    }

    /// Returns every `<li>` whose `class` attribute is absent or empty, in
    /// document order. An empty result means the page has no usable content.
    pub fn listing_elements(&self) -> Vec<ListingElement<'_>> {
        self.document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(is_unclassed_list_item)
            .map(ListingElement)
            .collect()
    }
}

fn is_unclassed_list_item(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    value.name() == "li"
        && value
            .attr("class")
            .map_or(true, |class| class.trim().is_empty())
}

/// An opaque handle to one candidate posting block.
#[derive(Debug, Clone, Copy)]
pub struct ListingElement<'a>(ElementRef<'a>);

impl ListingElement<'_> {
    /// The full text of the block, mostly useful for logging.
    pub fn text(&self) -> String {
        element_text(&self.0)
    }
}

/// The fields pulled out of one listing element that matched a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedListing {
    pub title: String,
    /// `None` when the title has no anchor or the anchor has no `href`.
    pub link: Option<String>,
    pub description: String,
    /// The first configured pattern that matched this element.
    pub pattern: String,
}

/// Resolves listing fields with the configured selectors.
#[derive(Debug, Clone)]
pub struct ListingScanner {
    title: ElementQuery,
    marker: ElementQuery,
    anchor: Selector,
}

impl ListingScanner {
    pub fn new(selectors: &ListingSelectors) -> Result<Self, HtmlError> {
        Ok(Self {
            title: ElementQuery::parse(&selectors.title)?,
            marker: ElementQuery::parse(&selectors.marker)?,
            anchor: Selector::parse("a").map_err(|e| invalid_selector("a", e.to_string()))?,
        })
    }

    /// Finds a marker whose text contains `pattern` (case-sensitive).
    pub fn find_marker<'a>(
        &self,
        element: &ListingElement<'a>,
        pattern: &str,
    ) -> Option<Resolved<ElementRef<'a>>> {
        self.marker
            .resolve_first(element.0, |marker| element_text(marker).contains(pattern))
    }

    pub fn title<'a>(&self, element: &ListingElement<'a>) -> Option<Resolved<ElementRef<'a>>> {
        self.title.resolve_first(element.0, |_| true)
    }

    /// The `href` of the first anchor inside the title block.
    pub fn link(&self, title: ElementRef<'_>) -> Option<String> {
        title
            .select(&self.anchor)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
    }

    pub fn description(&self, element: &ListingElement<'_>) -> String {
        self.marker
            .resolve_joined_text(element.0)
            .map(|resolved| resolved.value)
            .unwrap_or_default()
    }

    /// Checks `patterns` in order against the element's markers and extracts
    /// the listing on the first hit.
    ///
    /// Returns `None` when no pattern matches or the element has no title block.
    pub fn scan_listing(
        &self,
        element: &ListingElement<'_>,
        patterns: &[String],
    ) -> Option<ScrapedListing> {
        let (pattern, marker) = patterns
            .iter()
            .find_map(|pattern| self.find_marker(element, pattern).map(|m| (pattern, m)))?;
        debug!(
            pattern = %pattern,
            strategy = ?marker.strategy,
            "Listing element matched pattern"
        );

        let Some(title) = self.title(element) else {
            debug!("Matched listing element has no title block, skipping");
            return None;
        };

        Some(ScrapedListing {
            title: element_text(&title.value).trim().to_string(),
            link: self.link(title.value),
            description: self.description(element),
            pattern: pattern.clone(),
        })
    }
}
