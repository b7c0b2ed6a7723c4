use std::collections::HashSet;

use scraper::Html;
use url::Url;

use crate::fetch::{PageSource, fetch_document};
use crate::rate_limit::{RateLimiter, RequestKind};
use crate::selectors::Extractors;

/// What to do when the same item link shows up more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Pass every occurrence through; downstream must tolerate repeats.
    #[default]
    Keep,
    /// Keep the first occurrence only.
    Dedup,
}

/// Links harvested from one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub item_links: Vec<Url>,
    pub next: Option<Url>,
}

/// Extract item links and the next-page link from a parsed listing page.
/// Relative hrefs are resolved against `base`; unparseable ones are skipped.
pub fn listing_page(doc: &Html, base: &Url, ex: &Extractors) -> ListingPage {
    let item_links = doc
        .select(&ex.listing_item)
        .filter_map(|item| item.select(&ex.listing_item_link).next())
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| resolve(base, href))
        .collect();

    let next = doc
        .select(&ex.listing_next)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .and_then(|href| resolve(base, href));

    ListingPage { item_links, next }
}

/// Walk the listing from `start` until no next page remains.
///
/// A failed fetch of the first page is fatal. A failed fetch of any later
/// page ends the walk with what was gathered so far, since the last page and
/// a transient failure look the same from here.
pub async fn discover_all(
    source: &dyn PageSource,
    limiter: &dyn RateLimiter,
    ex: &Extractors,
    start: &Url,
    policy: DuplicatePolicy,
) -> anyhow::Result<Vec<Url>> {
    let mut links = Vec::new();
    let mut seen_links = HashSet::new();
    let mut visited_pages = HashSet::new();
    let mut cursor = Some(start.clone());
    let mut page_number = 0_usize;

    while let Some(page_url) = cursor.take() {
        if !visited_pages.insert(page_url.clone()) {
            tracing::warn!(url = %page_url, "listing links back to a visited page; stopping");
            break;
        }

        limiter.wait(RequestKind::Listing).await;
        page_number += 1;

        let page = {
            let Some(doc) = fetch_document(source, &page_url).await else {
                if page_number == 1 {
                    anyhow::bail!("fetch first listing page failed: {page_url}");
                }
                tracing::warn!(url = %page_url, page = page_number, "listing page unavailable; ending discovery");
                break;
            };
            listing_page(&doc, &page_url, ex)
        };

        let found = page.item_links.len();
        for link in page.item_links {
            if policy == DuplicatePolicy::Dedup && !seen_links.insert(link.clone()) {
                continue;
            }
            links.push(link);
        }
        tracing::debug!(url = %page_url, page = page_number, found, total = links.len(), "listing page");

        cursor = page.next;
    }

    tracing::info!(pages = page_number, links = links.len(), "discovery finished");
    Ok(links)
}

fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
