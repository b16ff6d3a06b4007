//! # Pattern Matcher
//!
//! Builds the match set from the listing elements of one page.

use crate::types::{ListingDetails, ListingMap};
use jobwatch_html::{ListingElement, ListingScanner};
use tracing::{debug, warn};

/// Returns the listings whose markers contain at least one of `patterns`,
/// keyed by link.
///
/// Order follows the elements. A link seen twice keeps its first position and
/// takes the later details. Listings without a link are dropped, since the link
/// is their only identity.
pub fn match_listings(
    scanner: &ListingScanner,
    elements: &[ListingElement<'_>],
    patterns: &[String],
) -> ListingMap {
    let mut matched = ListingMap::new();

    for element in elements {
        let Some(listing) = scanner.scan_listing(element, patterns) else {
            continue;
        };
        let Some(link) = listing.link else {
            warn!(
                title = %listing.title,
                "Matched listing has no link, excluding it from the match set"
            );
            continue;
        };

        debug!(
            %link,
            title = %listing.title,
            description = %listing.description,
            "Matched listing"
        );
        matched.insert(
            link,
            ListingDetails {
                title: listing.title,
                description: listing.description,
            },
        );
    }

    matched
}
