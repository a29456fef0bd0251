//! Reference discovery and rewriting rules.

use crate::classify::{Href, is_absolute_reference};

/// A local link target found in a document: the referenced path (without
/// query or fragment) and the fragment, if any.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkReference {
    pub path: String,
    pub fragment: Option<String>,
}

impl LinkReference {
    pub fn new(path: impl Into<String>, fragment: Option<&str>) -> Self {
        Self {
            path: path.into(),
            fragment: fragment.map(str::to_string),
        }
    }

    /// Extract the link target of a local, relative `href`.
    ///
    /// External URLs and absolute paths yield `None`.
    pub fn from_href(href: &str) -> Option<Self> {
        let parsed = local_relative(href)?;
        Some(Self::new(parsed.path, parsed.fragment))
    }
}

fn local_relative(reference: &str) -> Option<Href<'_>> {
    if is_absolute_reference(reference) {
        return None;
    }
    Href::parse(reference).filter(Href::is_local)
}

fn replace_path_suffix(reference: &str, from: &str, to: &str) -> Option<String> {
    let parsed = local_relative(reference)?;
    let stem = parsed.path.strip_suffix(from)?;
    Some(parsed.with_path(&format!("{stem}{to}")))
}

/// Point a link at a Markdown file to the rendered `.html` page instead.
///
/// Returns `None` when the reference is not a local link to a `.md` file.
///
/// ```
/// use bindery::transform::rewrite_markdown_href;
///
/// assert_eq!(rewrite_markdown_href("a/b.md?x=1#s").as_deref(), Some("a/b.html?x=1#s"));
/// assert_eq!(rewrite_markdown_href("https://host/b.md"), None);
/// ```
pub fn rewrite_markdown_href(href: &str) -> Option<String> {
    replace_path_suffix(href, ".md", ".html")
}

/// Point an image at the rasterized `.png` rendition of a local `.svg` file.
///
/// Returns `None` when the source is not a local `.svg` reference.
pub fn rewrite_vector_src(src: &str) -> Option<String> {
    replace_path_suffix(src, ".svg", ".png")
}
