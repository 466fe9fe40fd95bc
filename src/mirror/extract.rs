// src/mirror/extract.rs
// =============================================================================
// This module finds the resources a fetched HTML page depends on.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Stores that DOM as an arena tree (ego_tree), nodes linked by index
// - Never fails: html5ever repairs broken markup the way browsers do
//
// Only four element/attribute pairs are looked at:
//   <a href>, <link href>, <img src>, <script src>
//
// The walk is an explicit pre-order traversal with a stack instead of a
// recursive function, so a page with absurdly deep nesting can't blow the
// call stack.
// =============================================================================

use scraper::{Html, Node};
use url::Url;

use super::frontier::{Admission, Frontier};
use super::resource::{canonicalize, is_html_path};

/// Element/attribute pairs that reference mirrorable resources.
pub const LINK_ATTRIBUTES: [(&str, &str); 4] =
    [("a", "href"), ("link", "href"), ("img", "src"), ("script", "src")];

/// The URL-carrying attribute of `tag`, if it is one we follow.
pub fn link_attribute(tag: &str) -> Option<&'static str> {
    LINK_ATTRIBUTES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, attr)| *attr)
}

// Extracts every crawlable link from an HTML document
//
// Parameters:
//   document: raw page bytes (invalid UTF-8 is replaced, not rejected)
//   page_url: the URL of the page (for resolving relative links)
//
// Returns: absolute http(s) URLs without fragments, in document order.
// Host, exclude and reject rules are *not* applied here.
pub fn extract_links(document: &[u8], page_url: &Url) -> Vec<Url> {
    let html = String::from_utf8_lossy(document);
    let parsed = Html::parse_document(&html);

    let mut links = Vec::new();
    let mut stack = vec![parsed.tree.root()];

    while let Some(node) = stack.pop() {
        if let Node::Element(element) = node.value() {
            if let Some(attr) = link_attribute(element.name()) {
                if let Some(raw) = element.attr(attr) {
                    if let Some(url) = canonicalize(page_url, raw) {
                        links.push(url);
                    }
                }
            }
        }

        // Reverse so the first child is popped first (pre-order)
        stack.extend(node.children().rev());
    }

    links
}

/// What one page contributed to the frontier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Discovery {
    pub found: usize,
    pub queued: usize,
    pub duplicates: usize,
    pub filtered: usize,
}

/// Extracts links from `document` and offers each one to the frontier.
pub fn discover(frontier: &Frontier, document: &[u8], page_url: &Url) -> Discovery {
    let mut discovery = Discovery::default();

    for url in extract_links(document, page_url) {
        discovery.found += 1;
        let is_html = is_html_path(&url);
        let shown = url.to_string();

        match frontier.admit(url, is_html) {
            Admission::Queued => {
                tracing::debug!(url = %shown, "queued");
                discovery.queued += 1;
            }
            Admission::AlreadySeen | Admission::Closed => discovery.duplicates += 1,
            Admission::Filtered(verdict) => {
                tracing::debug!(url = %shown, ?verdict, "skipped");
                discovery.filtered += 1;
            }
        }
    }

    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::resource::UrlFilter;

    fn page() -> Url {
        Url::parse("http://example.test/docs/index.html").unwrap()
    }

    fn strings(urls: Vec<Url>) -> Vec<String> {
        urls.into_iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_extracts_the_four_link_kinds_in_order() {
        let html = r#"
            <html><head>
              <link rel="stylesheet" href="/css/site.css">
              <script src="app.js"></script>
            </head><body>
              <a href="guide.html">Guide</a>
              <img src="../img/logo.png">
            </body></html>
        "#;
        let links = strings(extract_links(html.as_bytes(), &page()));
        assert_eq!(
            links,
            vec![
                "http://example.test/css/site.css",
                "http://example.test/docs/app.js",
                "http://example.test/docs/guide.html",
                "http://example.test/img/logo.png",
            ]
        );
    }

    #[test]
    fn test_ignores_other_elements_and_attributes() {
        let html = r#"
            <iframe src="frame.html"></iframe>
            <video src="clip.mp4"></video>
            <a name="anchor-only">x</a>
            <img data-src="lazy.png">
            <form action="/submit"></form>
        "#;
        assert!(extract_links(html.as_bytes(), &page()).is_empty());
    }

    #[test]
    fn test_skips_empty_fragment_and_non_http_links() {
        let html = r##"
            <a href="">Empty</a>
            <a href="#section">Fragment</a>
            <a href="mailto:test@example.test">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="page.html#part">Kept</a>
        "##;
        let links = strings(extract_links(html.as_bytes(), &page()));
        assert_eq!(links, vec!["http://example.test/docs/page.html"]);
    }

    #[test]
    fn test_malformed_html_does_not_fail() {
        let html = b"<html><body><a href='ok.html'>unclosed <div><p><img src=x.png";
        let links = strings(extract_links(html, &page()));
        assert!(links.contains(&"http://example.test/docs/ok.html".to_string()));

        let garbage = [0xff_u8, 0xfe, 0x00, 0x3c];
        assert!(extract_links(&garbage, &page()).is_empty());
    }

    #[test]
    fn test_deeply_nested_document() {
        let mut html = "<div>".repeat(5_000);
        html.push_str(r#"<a href="deep.html">deep</a>"#);
        let links = extract_links(html.as_bytes(), &page());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_discover_applies_filters_and_dedup() {
        let seed = Url::parse("http://example.test/").unwrap();
        let filter = UrlFilter::new(&seed, &["jpg".to_string()], &["/private".to_string()]);
        let frontier = Frontier::new(filter, "out");

        let html = r#"
            <a href="http://example.test/a.html">A</a>
            <a href="/a.html#again">A again</a>
            <a href="http://other.test/x.html">Elsewhere</a>
            <a href="/private/secret.html">Secret</a>
            <img src="/img.JPG">
            <link rel="stylesheet" href="/style.css">
        "#;
        let discovery = discover(&frontier, html.as_bytes(), &seed);

        assert_eq!(
            discovery,
            Discovery {
                found: 6,
                queued: 2,
                duplicates: 1,
                filtered: 3,
            }
        );
        assert_eq!(frontier.in_flight(), 2);
    }
}
