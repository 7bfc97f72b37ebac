use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scholar_core::RawContact;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{FailureKind, FetchError};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email pattern")
});

const JOURNAL_SELECTORS: &[&str] = &[
    ".journal-title",
    ".publication-title",
    "[data-journal]",
    ".journal-name",
];
const AUTHOR_SELECTORS: &[&str] = &[".author-name", ".author", "[data-author]", ".contributor"];

/// Publisher hosts whose journal name is implied by the URL alone.
const KNOWN_PUBLISHERS: &[(&str, &str)] = &[
    ("pubs.acs.org", "ACS Publications"),
    ("hindawi.com", "Hindawi"),
    ("researchsquare.com", "Research Square"),
    ("academic.oup.com", "Oxford Academic"),
    ("journals.sagepub.com", "SAGE Journals"),
    ("cureus.com", "Cureus"),
    ("onlinelibrary.wiley.com", "Wiley Online Library"),
    ("tandfonline.com", "Taylor & Francis"),
    ("link.springer.com", "Springer"),
    ("journals.plos.org", "PLOS ONE"),
    ("sciencedirect.com", "ScienceDirect"),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("page content is empty")]
    EmptyContent,
}

impl From<ExtractionError> for FetchError {
    fn from(err: ExtractionError) -> Self {
        FetchError::new(FailureKind::Extraction, err.to_string())
    }
}

pub trait Extractor: Send + Sync {
    /// Candidate contacts on the page, one per distinct email, in first-seen order.
    fn extract(&self, html: &str, source_url: &str) -> Result<Vec<RawContact>, ExtractionError>;
}

/// One metadata heuristic: element text, or an attribute of the matched element.
#[derive(Debug)]
enum Lookup {
    Text(Selector),
    Attr(Selector, &'static str),
}

impl Lookup {
    fn text(css: &str) -> Option<Self> {
        Selector::parse(css).ok().map(Lookup::Text)
    }

    fn attr(css: &str, attr: &'static str) -> Option<Self> {
        Selector::parse(css).ok().map(|sel| Lookup::Attr(sel, attr))
    }

    fn first_match(&self, doc: &Html) -> Option<String> {
        match self {
            Lookup::Text(sel) => doc
                .select(sel)
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|text| !text.is_empty()),
            Lookup::Attr(sel, attr) => doc
                .select(sel)
                .filter_map(|el| el.value().attr(attr))
                .map(collapse_whitespace)
                .find(|value| !value.is_empty()),
        }
    }
}

/// Regex scan over visible text and `mailto:` links, with best-effort
/// journal/author/topic metadata shared by every contact on the page.
#[derive(Debug)]
pub struct ContactExtractor {
    journal: Vec<Lookup>,
    author: Vec<Lookup>,
    topic: Vec<Lookup>,
    mailto: Option<Selector>,
}

impl Default for ContactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactExtractor {
    pub fn new() -> Self {
        let mut journal = Vec::new();
        for css in JOURNAL_SELECTORS {
            journal.extend(Lookup::text(css));
            if *css == "[data-journal]" {
                journal.extend(Lookup::attr(css, "data-journal"));
            }
        }
        journal.extend(Lookup::attr(r#"meta[name="citation_journal_title"]"#, "content"));

        let mut author = Vec::new();
        for css in AUTHOR_SELECTORS {
            author.extend(Lookup::text(css));
            if *css == "[data-author]" {
                author.extend(Lookup::attr(css, "data-author"));
            }
        }
        author.extend(Lookup::attr(r#"meta[name="citation_author"]"#, "content"));

        let topic = [
            Lookup::text("title"),
            Lookup::attr(r#"meta[name="citation_title"]"#, "content"),
            Lookup::text("h1"),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            journal,
            author,
            topic,
            mailto: Selector::parse(r#"a[href^="mailto:"]"#).ok(),
        }
    }

    fn first_of(lookups: &[Lookup], doc: &Html) -> Option<String> {
        lookups.iter().find_map(|lookup| lookup.first_match(doc))
    }

    fn scan_emails(&self, doc: &Html) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut emails = Vec::new();
        let mut push = |candidate: &str| {
            let email = candidate.to_ascii_lowercase();
            if seen.insert(email.clone()) {
                emails.push(email);
            }
        };

        for m in EMAIL_PATTERN.find_iter(&visible_text(doc)) {
            push(m.as_str());
        }
        if let Some(sel) = &self.mailto {
            for anchor in doc.select(sel) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let target = href["mailto:".len()..].split('?').next().unwrap_or_default();
                for m in EMAIL_PATTERN.find_iter(target) {
                    push(m.as_str());
                }
            }
        }
        emails
    }
}

impl Extractor for ContactExtractor {
    fn extract(&self, html: &str, source_url: &str) -> Result<Vec<RawContact>, ExtractionError> {
        if html.trim().is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        let doc = Html::parse_document(html);

        let emails = self.scan_emails(&doc);
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let journal = Self::first_of(&self.journal, &doc).or_else(|| journal_from_url(source_url));
        let name = Self::first_of(&self.author, &doc);
        let topic = Self::first_of(&self.topic, &doc);

        Ok(emails
            .into_iter()
            .map(|email| RawContact {
                email,
                name: name.clone(),
                journal: journal.clone(),
                topic: topic.clone(),
            })
            .collect())
    }
}

/// Text nodes outside `<script>`/`<style>`/`<noscript>`, space separated so
/// adjacent nodes never glue an address to the following word.
fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|parent| matches!(parent.value().name(), "script" | "style" | "noscript"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

fn journal_from_url(source_url: &str) -> Option<String> {
    let parsed = Url::parse(source_url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    KNOWN_PUBLISHERS
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
        .map(|(_, journal)| journal.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
