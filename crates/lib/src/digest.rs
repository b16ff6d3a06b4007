//! # Notification Composer

use crate::types::ListingMap;
use std::fmt::Write;
use url::Url;

/// Renders one `Title`/`Description`/`Link` block per listing, each followed by
/// a blank line.
pub fn compose_digest(new_listings: &ListingMap) -> String {
    let mut body = String::new();
    for (link, details) in new_listings {
        // Writing to a String cannot fail.
        let _ = write!(
            body,
            "Title: {}\nDescription: {}\nLink: {}\n\n",
            details.title, details.description, link
        );
    }
    body
}

/// Fills `{host}` in the subject template with the page host.
pub fn render_subject(template: &str, page_url: &Url) -> String {
    template.replace("{host}", page_url.host_str().unwrap_or(page_url.as_str()))
}

/// Subject of the message sent when the page cannot be fetched.
pub fn fetch_error_subject(url: &str) -> String {
    format!("Error fetching content on {url}")
}
