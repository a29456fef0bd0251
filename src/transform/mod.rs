//! Content transformation: source text → packaged HTML fragment.
//!
//! [`transform`] renders Markdown (or takes HTML as is), parses the result
//! into a mutable tree and rewrites references so that they keep resolving
//! after the file renames done during packaging:
//!
//! - `<a href="x.md">` → `<a href="x.html">` (query and fragment preserved)
//! - `<img src="x.svg">` → `<img src="x.png">` when vector images are rasterized
//!
//! External URLs and absolute filesystem paths are never touched. The
//! function is pure: it performs no filesystem or network access.

mod links;

pub use links::{LinkReference, rewrite_markdown_href, rewrite_vector_src};

use std::collections::BTreeSet;

use crate::dom::{ArenaDom, parse_fragment};
use crate::error::Result;
use crate::markdown::render_markdown;

/// How the source text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    Markdown,
    Html,
}

/// Result of transforming one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transformed {
    /// Contents of the `head` and `body` elements, concatenated.
    pub html: String,
    /// Local link targets referenced by anchors, before rewriting.
    pub links: BTreeSet<LinkReference>,
}

/// Transform source text into a packaged HTML fragment.
///
/// When `rewrite_vector_images` is set, local `.svg` image sources are
/// pointed at their rasterized `.png` counterparts.
pub fn transform(text: &str, mode: ContentMode, rewrite_vector_images: bool) -> Result<Transformed> {
    let html = match mode {
        ContentMode::Markdown => render_markdown(text),
        ContentMode::Html => text.to_string(),
    };

    let mut dom = parse_fragment(&html);
    let links = rewrite_anchors(&mut dom);
    if rewrite_vector_images {
        rewrite_images(&mut dom);
    }
    if mode == ContentMode::Markdown {
        strip_markdown_markers(&mut dom);
    }

    let mut out = String::with_capacity(html.len());
    for section in ["head", "body"] {
        for id in dom.elements_by_tag(section) {
            out.push_str(&dom.inner_html(id)?);
        }
    }

    Ok(Transformed { html: out, links })
}

fn rewrite_anchors(dom: &mut ArenaDom) -> BTreeSet<LinkReference> {
    let mut links = BTreeSet::new();
    for id in dom.elements_by_tag("a") {
        let Some(href) = dom.get_attr(id, "href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let href = href.to_string();

        if let Some(link) = LinkReference::from_href(&href) {
            links.insert(link);
        }
        if let Some(rewritten) = rewrite_markdown_href(&href) {
            tracing::trace!("rewrite link {href} -> {rewritten}");
            dom.set_attr(id, "href", rewritten);
        }
    }
    links
}

fn rewrite_images(dom: &mut ArenaDom) {
    for id in dom.elements_by_tag("img") {
        let Some(src) = dom.get_attr(id, "src").filter(|s| !s.is_empty()) else {
            continue;
        };
        if let Some(rewritten) = rewrite_vector_src(src) {
            tracing::trace!("rewrite image {src} -> {rewritten}");
            dom.set_attr(id, "src", rewritten);
        }
    }
}

/// Drop the `markdown="1"` marker from HTML blocks whose contents were
/// rendered as Markdown.
fn strip_markdown_markers(dom: &mut ArenaDom) {
    for id in dom.elements() {
        if dom.get_attr(id, "markdown").is_some() {
            dom.remove_attr(id, "markdown");
        }
    }
}
