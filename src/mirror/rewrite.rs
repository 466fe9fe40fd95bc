// src/mirror/rewrite.rs
// =============================================================================
// Link conversion for offline browsing.
//
// After a page is saved, every href/src of the four element kinds we crawl
// (<a>, <link>, <img>, <script>) that points at a mirrored resource is
// replaced by a path relative to the page's own directory:
//
//   http://example.test/css/site.css  ->  ../css/site.css
//
// Links to other hosts, filtered URLs and downloads that failed are left
// exactly as written. The rewriter never produces a link to a file that the
// crawl won't have on disk.
//
// lol_html edits attributes while streaming the page through, so everything
// else in the document stays byte-for-byte the same.
// =============================================================================

use lol_html::{element, HtmlRewriter, Settings};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use url::Url;

use super::extract::link_attribute;
use super::resource::canonicalize;
use crate::error::{MirrorError, Result};

// Characters a browser would misread in a relative file link. '?' and '#'
// would start a query or fragment, '%' would be decoded.
const LINK_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// One attribute changed by [`rewrite_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenLink {
    /// Position among all recognized link attributes of the page, in
    /// document order. Stable as long as the page isn't edited otherwise.
    pub ordinal: usize,
    pub original: String,
    pub replacement: String,
    pub target: Url,
}

/// Rewrites the links of the page stored at `path` in place.
///
/// `lookup` answers "where is this URL mirrored?"; URLs it returns `None`
/// for are left alone. Running it twice with the same lookup changes nothing
/// the second time.
pub async fn rewrite_file<F>(path: &Path, page_url: &Url, lookup: F) -> Result<Vec<RewrittenLink>>
where
    F: Fn(&Url) -> Option<PathBuf>,
{
    let html = tokio::fs::read(path)
        .await
        .map_err(|e| MirrorError::io(path, e))?;

    let page_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let (rewritten, links) = rewrite_document(&html, page_url, page_dir, &lookup)
        .map_err(|reason| MirrorError::Rewrite {
            path: path.to_path_buf(),
            reason,
        })?;

    if !links.is_empty() {
        tokio::fs::write(path, rewritten)
            .await
            .map_err(|e| MirrorError::io(path, e))?;
    }

    Ok(links)
}

/// Puts the original text back into the attributes listed in `links`.
/// Returns how many attributes were restored.
pub async fn restore_file(path: &Path, links: &[RewrittenLink]) -> Result<usize> {
    if links.is_empty() {
        return Ok(0);
    }

    let html = tokio::fs::read(path)
        .await
        .map_err(|e| MirrorError::io(path, e))?;

    let (restored, count) = restore_document(&html, links).map_err(|reason| MirrorError::Rewrite {
        path: path.to_path_buf(),
        reason,
    })?;

    if count > 0 {
        tokio::fs::write(path, restored)
            .await
            .map_err(|e| MirrorError::io(path, e))?;
    }

    Ok(count)
}

// Core of the conversion, kept synchronous: lol_html's rewriter isn't Send
// and must never live across an .await
fn rewrite_document<F>(
    html: &[u8],
    page_url: &Url,
    page_dir: &Path,
    lookup: &F,
) -> std::result::Result<(Vec<u8>, Vec<RewrittenLink>), String>
where
    F: Fn(&Url) -> Option<PathBuf>,
{
    let mut output = Vec::with_capacity(html.len());
    let mut links = Vec::new();
    let mut ordinal = 0usize;

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                let Some(attr) = link_attribute(&el.tag_name()) else {
                    return Ok(());
                };
                let Some(value) = el.get_attribute(attr) else {
                    return Ok(());
                };
                let position = ordinal;
                ordinal += 1;

                if let Some((target, replacement)) = convert(&value, page_url, page_dir, lookup) {
                    if replacement != value {
                        el.set_attribute(attr, &replacement)?;
                        links.push(RewrittenLink {
                            ordinal: position,
                            original: value,
                            replacement,
                            target,
                        });
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html).map_err(|e| e.to_string())?;
    rewriter.end().map_err(|e| e.to_string())?;

    Ok((output, links))
}

fn restore_document(html: &[u8], links: &[RewrittenLink]) -> std::result::Result<(Vec<u8>, usize), String> {
    let by_ordinal: HashMap<usize, &RewrittenLink> =
        links.iter().map(|link| (link.ordinal, link)).collect();

    let mut output = Vec::with_capacity(html.len());
    let mut ordinal = 0usize;
    let mut restored = 0usize;

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                let Some(attr) = link_attribute(&el.tag_name()) else {
                    return Ok(());
                };
                let Some(value) = el.get_attribute(attr) else {
                    return Ok(());
                };
                let position = ordinal;
                ordinal += 1;

                if let Some(link) = by_ordinal.get(&position) {
                    // Only undo our own edit; anything else means the page
                    // changed underneath us
                    if value == link.replacement {
                        el.set_attribute(attr, &link.original)?;
                        restored += 1;
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html).map_err(|e| e.to_string())?;
    rewriter.end().map_err(|e| e.to_string())?;

    Ok((output, restored))
}

// Maps one attribute value to (canonical target, relative link), if mirrored
fn convert<F>(value: &str, page_url: &Url, page_dir: &Path, lookup: &F) -> Option<(Url, String)>
where
    F: Fn(&Url) -> Option<PathBuf>,
{
    // lol_html hands out attribute text as written, entities included; the
    // extractor saw it decoded, so decode the same way before the lookup
    let decoded = html_escape::decode_html_entities(value);
    let target = canonicalize(page_url, &decoded)?;
    let target_path = lookup(&target)?;
    let relative = relative_link(page_dir, &target_path)?;
    Some((target, relative))
}

/// Relative URL from a page in `page_dir` to the file `target`.
pub fn relative_link(page_dir: &Path, target: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(target, page_dir)?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                parts.push(utf8_percent_encode(&part.to_string_lossy(), LINK_PATH).to_string())
            }
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            // Absolute or prefixed paths can't be expressed as a link
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
