use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

pub const DEFAULT_MAX_LINKS: usize = 50;

/// Path fragments that mark a search hit as an article page.
const ARTICLE_MARKERS: &[&str] = &["/article", "/paper", "/publication"];

/// Collects article links from a search results page, in document order.
///
/// Relative hrefs resolve against `base_url`; fragments are dropped; only
/// http(s) links survive; each URL appears once; at most `max` are returned.
pub fn discover_article_links(html: &str, base_url: &str, max: usize) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        if links.len() >= max {
            break;
        }
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if !ARTICLE_MARKERS.iter().any(|marker| href.contains(marker)) {
            continue;
        }
        let Some(mut resolved) = resolve(href, base.as_ref()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);
        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }
    links
}

fn resolve(href: &str, base: Option<&Url>) -> Option<Url> {
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}
