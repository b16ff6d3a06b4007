//! # Novelty Differ
//!
//! Splits a match set into listings already recorded and listings seen for the
//! first time. Identity is the link alone; a known link stays known even if its
//! title or description changes on the page.

use crate::types::ListingMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoveltyDiff {
    /// Matched listings absent from the known set, in match order.
    pub new_listings: ListingMap,
    /// Links of matched listings that were already known.
    pub already_known: Vec<String>,
    pub any_new: bool,
}

pub fn diff_listings(matched: &ListingMap, known: &ListingMap) -> NoveltyDiff {
    let mut diff = NoveltyDiff::default();
    for (link, details) in matched {
        if known.contains_key(link) {
            diff.already_known.push(link.clone());
        } else {
            diff.new_listings.insert(link.clone(), details.clone());
        }
    }
    diff.any_new = !diff.new_listings.is_empty();
    diff
}

/// Adds `new_listings` to `known` without touching existing entries.
pub fn merge_known(mut known: ListingMap, new_listings: &ListingMap) -> ListingMap {
    for (link, details) in new_listings {
        known
            .entry(link.clone())
            .or_insert_with(|| details.clone());
    }
    known
}
