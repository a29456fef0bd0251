//! In-memory EPUB package under construction.
//!
//! [`Epub`] only records what goes where: page HTML is kept as text, images
//! and other files are remembered by their source path and read when the
//! package is written.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::classify::sniff_file;
use crate::error::{Error, Result};
use crate::path::RelativePath;
use crate::util::media_type;

/// Names generated by the writer inside the content directory.
const RESERVED_PATHS: &[&str] = &["content.opf", "toc.ncx"];

/// Manifest ids generated by the writer.
const RESERVED_IDS: &[&str] = &["ncx", "cover"];

/// Prefixes of the numbered manifest ids (`page-1`, `other-3`) generated by
/// the writer.
const RESERVED_ID_PREFIXES: &[&str] = &["page-", "other-"];

fn is_reserved_id(id: &str) -> bool {
    RESERVED_IDS.contains(&id)
        || RESERVED_ID_PREFIXES.iter().any(|prefix| {
            id.strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
}

/// Package metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub language: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: "en".to_string(),
            ..Default::default()
        }
    }

    /// Stable identifier derived from the descriptive metadata, so that
    /// rebuilding the same book yields the same identifier.
    pub fn identifier(&self) -> String {
        let mut hasher = sha1_smol::Sha1::new();
        for field in [
            self.title.as_str(),
            self.author.as_deref().unwrap_or_default(),
            self.date.as_deref().unwrap_or_default(),
        ] {
            hasher.update(field.as_bytes());
            hasher.update(&[0]);
        }
        format!("urn:sha1:{}", hasher.digest())
    }
}

/// A content document. Returned mutably by [`Epub::add_page`] so the caller
/// can attach stylesheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub dest: RelativePath,
    pub title: String,
    /// HTML fragment: head-level elements (if any) followed by body content.
    pub html: String,
    /// Where the page came from; used in error messages only.
    pub source: PathBuf,
    /// Stylesheet references, either package paths or external URLs.
    pub stylesheets: Vec<String>,
}

/// An image copied from `source` at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub source: PathBuf,
    pub dest: RelativePath,
    pub media_type: &'static str,
}

/// Any other file copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherFile {
    pub source: PathBuf,
    pub dest: RelativePath,
    pub media_type: &'static str,
}

/// EPUB package builder.
#[derive(Debug, Clone, Default)]
pub struct Epub {
    pub metadata: Metadata,
    cover: Option<Page>,
    pages: Vec<Page>,
    images: Vec<Image>,
    others: Vec<OtherFile>,
    dests: HashSet<RelativePath>,
    ids: HashSet<String>,
}

impl Epub {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(title),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.metadata.author = Some(author.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.metadata.date = Some(date.into());
        self
    }

    pub fn cover(&self) -> Option<&Page> {
        self.cover.as_ref()
    }

    /// Content documents in spine order, excluding the cover.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn others(&self) -> &[OtherFile] {
        &self.others
    }

    /// Set the landing page. It precedes every other page in reading order.
    pub fn add_cover_page(
        &mut self,
        dest: RelativePath,
        title: impl Into<String>,
        html: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Result<&mut Page> {
        if let Some(cover) = &self.cover {
            return Err(Error::DuplicateEntry(format!(
                "cover page already set to {}",
                cover.dest
            )));
        }
        self.claim_dest(&dest)?;
        Ok(self.cover.insert(Page {
            dest,
            title: title.into(),
            html: html.into(),
            source: source.into(),
            stylesheets: Vec::new(),
        }))
    }

    /// Append a page to the reading order.
    pub fn add_page(
        &mut self,
        dest: RelativePath,
        title: impl Into<String>,
        html: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Result<&mut Page> {
        self.claim_dest(&dest)?;
        self.pages.push(Page {
            dest,
            title: title.into(),
            html: html.into(),
            source: source.into(),
            stylesheets: Vec::new(),
        });
        let last = self.pages.len() - 1;
        Ok(&mut self.pages[last])
    }

    /// Add an image, preferably under the manifest id `id` (see
    /// [`escape_id`]). An id that is reserved or already taken gets a `-2`,
    /// `-3`, ... suffix. Returns the id actually assigned.
    ///
    /// The media type is sniffed from the file's content, falling back to the
    /// destination's extension.
    pub fn add_image(
        &mut self,
        id: impl Into<String>,
        source: impl Into<PathBuf>,
        dest: RelativePath,
    ) -> Result<&str> {
        let source = source.into();
        let mime = sniff_file(&source)?
            .map(|format| format.mime_type())
            .unwrap_or_else(|| media_type(dest.as_str()));

        self.claim_dest(&dest)?;
        let id = self.claim_id(id.into());
        self.images.push(Image {
            id,
            source,
            dest,
            media_type: mime,
        });
        Ok(&self.images[self.images.len() - 1].id)
    }

    /// Add a file that is neither a page nor an image.
    pub fn add_others(&mut self, source: impl Into<PathBuf>, dest: RelativePath) -> Result<()> {
        self.claim_dest(&dest)?;
        let mime = media_type(dest.as_str());
        self.others.push(OtherFile {
            source: source.into(),
            dest,
            media_type: mime,
        });
        Ok(())
    }

    fn claim_dest(&mut self, dest: &RelativePath) -> Result<()> {
        if dest.is_root() || RESERVED_PATHS.contains(&dest.as_str()) {
            return Err(Error::InvalidEntry(format!("'{dest}' cannot be used as a package path")));
        }
        if !self.dests.insert(dest.clone()) {
            return Err(Error::DuplicateEntry(dest.to_string()));
        }
        Ok(())
    }

    fn claim_id(&mut self, id: String) -> String {
        let mut unique = id.clone();
        let mut n = 2;
        while is_reserved_id(&unique) || self.ids.contains(&unique) {
            unique = format!("{id}-{n}");
            n += 1;
        }
        if unique != id {
            tracing::debug!("manifest id {id} taken, using {unique}");
        }
        self.ids.insert(unique.clone());
        unique
    }

    /// Write the package to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        super::write_epub(self, path)
    }
}

/// Turn a package path into an XML-safe manifest id.
///
/// ASCII alphanumerics are kept, everything else becomes `_`; ids that would
/// not start with a letter get an `img_` prefix.
///
/// ```
/// use bindery::epub::escape_id;
///
/// assert_eq!(escape_id("img/diagram.png"), "img_diagram_png");
/// assert_eq!(escape_id("2024/photo.jpg"), "img_2024_photo_jpg");
/// ```
pub fn escape_id(path: &str) -> String {
    let escaped: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if escaped.starts_with(|c: char| c.is_ascii_alphabetic()) {
        escaped
    } else {
        format!("img_{escaped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelativePath {
        RelativePath::parse(s).unwrap()
    }

    #[test]
    fn test_page_handle_collects_stylesheets() {
        let mut epub = Epub::new("Book");
        let page = epub.add_page(rel("a.html"), "a", "<p>a</p>", "a.md").unwrap();
        page.stylesheets.push("style.css".to_string());
        assert_eq!(epub.pages()[0].stylesheets, vec!["style.css"]);
    }

    #[test]
    fn test_duplicate_destination_rejected() {
        let mut epub = Epub::new("Book");
        epub.add_cover_page(rel("README.html"), "README", "", "README.md")
            .unwrap();
        let err = epub.add_page(rel("README.html"), "README", "", "README.html");
        assert!(matches!(err, Err(Error::DuplicateEntry(_))));
        assert!(epub.add_others("x", rel("README.html")).is_err());
    }

    #[test]
    fn test_second_cover_rejected() {
        let mut epub = Epub::new("Book");
        epub.add_cover_page(rel("a.html"), "a", "", "a").unwrap();
        assert!(matches!(
            epub.add_cover_page(rel("b.html"), "b", "", "b"),
            Err(Error::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_reserved_paths_rejected() {
        let mut epub = Epub::new("Book");
        assert!(matches!(
            epub.add_others("x", rel("toc.ncx")),
            Err(Error::InvalidEntry(_))
        ));
        assert!(epub.add_others("x", rel("sub/toc.ncx")).is_ok());
    }

    #[test]
    fn test_image_media_type_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("anim");
        std::fs::write(&gif, b"GIF89a\x01\x00\x01\x00").unwrap();
        let unknown = dir.path().join("pic.webp");
        std::fs::write(&unknown, b"not really").unwrap();

        let mut epub = Epub::new("Book");
        epub.add_image(escape_id("anim"), &gif, rel("anim")).unwrap();
        epub.add_image(escape_id("pic.webp"), &unknown, rel("pic.webp"))
            .unwrap();
        assert_eq!(epub.images()[0].media_type, "image/gif");
        assert_eq!(epub.images()[1].media_type, "image/webp");

        assert!(matches!(
            epub.add_image("other", &gif, rel("anim")),
            Err(Error::DuplicateEntry(_))
        ));
    }

    #[test]
    fn test_colliding_image_ids_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("anim");
        std::fs::write(&gif, b"GIF89a\x01\x00\x01\x00").unwrap();

        let mut epub = Epub::new("Book");
        for dest in ["a-b.gif", "a_b.gif", "a b.gif", "cover", "ncx"] {
            epub.add_image(escape_id(dest), &gif, rel(dest)).unwrap();
        }
        let ids: Vec<_> = epub.images().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a_b_gif", "a_b_gif-2", "a_b_gif-3", "cover-2", "ncx-2"]);

        assert_eq!(epub.add_image("cover-2", &gif, rel("x.gif")).unwrap(), "cover-2-2");
        epub.add_image("page", &gif, rel("p1.gif")).unwrap();
        assert_eq!(epub.add_image("page", &gif, rel("p2.gif")).unwrap(), "page-3");
        assert_eq!(epub.add_image("other-1", &gif, rel("o.gif")).unwrap(), "other-1-2");
    }

    #[test]
    fn test_escape_id() {
        assert_eq!(escape_id("a-b c.png"), "a_b_c_png");
        assert_eq!(escape_id("_x.png"), "img__x_png");
        assert_eq!(escape_id("héllo.png"), "h_llo_png");
    }

    #[test]
    fn test_identifier_is_stable() {
        let a = Epub::new("T").with_author("A").metadata.identifier();
        let b = Epub::new("T").with_author("A").metadata.identifier();
        let c = Epub::new("T").with_author("B").metadata.identifier();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("urn:sha1:"));
    }
}
