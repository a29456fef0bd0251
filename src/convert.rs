//! Conversion of a source tree into an EPUB package.
//!
//! A run goes through a fixed sequence of steps:
//!
//! 1. detect the cover page among the root's entries and render it;
//! 2. walk the tree (cover excluded) in listing order;
//! 3. dispatch every file: Markdown and HTML become pages, SVGs are
//!    rasterized, raster images and everything else are copied;
//! 4. hand back the package together with the temporary files created.
//!
//! Any failure aborts the run. No partial package is returned, and PNGs
//! rasterized before the failure are removed again.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::epub::{Epub, escape_id};
use crate::error::{Error, Result};
use crate::path::RelativePath;
use crate::raster::Rasterizer;
use crate::source::{FileKind, WalkOptions, detect_cover, walk};
use crate::transform::{ContentMode, LinkReference, transform};
use crate::util::{read_text, truncate_to_date, validate_encoding};

/// Conversion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Book title. Defaults to the name of the root directory.
    pub title: Option<String>,
    pub author: Option<String>,
    /// Publication date; timestamps are cut down to the date.
    pub date: Option<String>,
    /// Encoding label used to decode Markdown and HTML sources.
    pub encoding: String,
    /// Rasterize SVG files and point image references at the PNGs.
    pub convert_svg: bool,
    /// Stylesheet package path (or URL) linked from every Markdown page.
    pub stylesheet: Option<String>,
    /// Report rasterized PNGs in [`Conversion::temp_files`]. Without it the
    /// PNGs stay beside their SVG sources after the run; a later run over the
    /// same tree reuses them as long as they still match their SVGs.
    pub return_temp_files: bool,
    /// Directory names skipped at any depth.
    pub excluded_dirs: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            title: None,
            author: None,
            date: None,
            encoding: "utf8".to_string(),
            convert_svg: true,
            stylesheet: None,
            return_temp_files: false,
            excluded_dirs: WalkOptions::default().excluded_dirs,
        }
    }
}

impl ConvertOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_convert_svg(mut self, convert_svg: bool) -> Self {
        self.convert_svg = convert_svg;
        self
    }

    pub fn with_stylesheet(mut self, stylesheet: impl Into<String>) -> Self {
        self.stylesheet = Some(stylesheet.into());
        self
    }

    pub fn with_return_temp_files(mut self, return_temp_files: bool) -> Self {
        self.return_temp_files = return_temp_files;
        self
    }

    pub fn with_excluded_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_dirs = names.into_iter().map(Into::into).collect();
        self
    }
}

/// One packaged page and the local links found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub source: RelativePath,
    pub dest: RelativePath,
    pub links: BTreeSet<LinkReference>,
}

/// Result of a conversion run.
#[derive(Debug)]
pub struct Conversion {
    pub epub: Epub,
    /// Rasterized PNGs left on disk; empty unless
    /// [`ConvertOptions::return_temp_files`] was set. The caller deletes them
    /// once the package is written.
    pub temp_files: Vec<PathBuf>,
    /// Cover first, then pages in walk order.
    pub pages: Vec<PageReport>,
    pub images: usize,
    pub others: usize,
}

impl Conversion {
    /// Write the package to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.epub.write(path)
    }

    /// Delete the temporary files. Every file is attempted; the first
    /// failure is returned. Files already gone are not an error.
    pub fn remove_temp_files(&mut self) -> Result<()> {
        remove_files(self.temp_files.drain(..))
    }
}

fn remove_files(paths: impl IntoIterator<Item = PathBuf>) -> Result<()> {
    let mut first_error = None;
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!("removed {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("cannot remove {}: {e}", path.display());
                if first_error.is_none() {
                    first_error = Some(Error::read(&path, e));
                }
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Convert the tree rooted at `root` into an EPUB package.
pub fn convert(root: &Path, options: &ConvertOptions) -> Result<Conversion> {
    validate_encoding(&options.encoding)?;

    let mut run = Run::new(root, options);
    match run.execute() {
        Ok(()) => Ok(run.finish()),
        Err(e) => {
            if let Err(cleanup) = remove_files(run.temp_files.drain(..)) {
                tracing::warn!("cleanup after failed run: {cleanup}");
            }
            Err(e)
        }
    }
}

/// State of a single conversion run.
struct Run<'a> {
    root: &'a Path,
    options: &'a ConvertOptions,
    epub: Epub,
    rasterizer: Rasterizer,
    temp_files: Vec<PathBuf>,
    pages: Vec<PageReport>,
    images: usize,
    others: usize,
}

impl<'a> Run<'a> {
    fn new(root: &'a Path, options: &'a ConvertOptions) -> Self {
        let title = options
            .title
            .clone()
            .unwrap_or_else(|| default_title(root));
        let mut epub = Epub::new(title);
        epub.metadata.author = options.author.clone();
        epub.metadata.date = options.date.as_deref().map(|d| truncate_to_date(d).to_string());

        Self {
            root,
            options,
            epub,
            rasterizer: Rasterizer::new(),
            temp_files: Vec::new(),
            pages: Vec::new(),
            images: 0,
            others: 0,
        }
    }

    fn execute(&mut self) -> Result<()> {
        let cover = detect_cover(self.root)?;
        if let Some(cover) = &cover {
            let dest = cover.destination();
            let title = cover.title().to_string();
            self.add_page(&cover.path, dest, title, cover.mode, true)?;
        }

        let walk_options = WalkOptions {
            excluded_dirs: self.options.excluded_dirs.clone(),
        };
        let files = walk(self.root, cover.as_ref().map(|c| &c.path), &walk_options)?;
        tracing::debug!("{} files to package", files.len());

        for path in files {
            self.process(path)?;
        }
        Ok(())
    }

    fn process(&mut self, path: RelativePath) -> Result<()> {
        let fs_path = path.to_path(self.root);
        let kind = FileKind::classify(&path, &fs_path, self.options.convert_svg)?;
        tracing::debug!("{path}: {kind:?}");

        match kind {
            FileKind::Markdown => {
                let dest = path.replace_suffix(".md", ".html");
                let title = path.title().to_string();
                self.add_page(&path, dest, title, ContentMode::Markdown, false)
            }
            FileKind::Html => {
                let title = path.title().to_string();
                self.add_page(&path, path.clone(), title, ContentMode::Html, false)
            }
            FileKind::VectorImage => {
                let raster = self.rasterizer.rasterize(self.root, &path)?;
                if raster.created {
                    self.temp_files.push(raster.path.clone());
                }
                self.epub
                    .add_image(escape_id(raster.output.as_str()), raster.path, raster.output)?;
                self.images += 1;
                Ok(())
            }
            FileKind::RasterImage(_) => {
                self.epub.add_image(escape_id(path.as_str()), fs_path, path)?;
                self.images += 1;
                Ok(())
            }
            FileKind::Other => {
                self.epub.add_others(fs_path, path)?;
                self.others += 1;
                Ok(())
            }
        }
    }

    fn add_page(
        &mut self,
        source: &RelativePath,
        dest: RelativePath,
        title: String,
        mode: ContentMode,
        is_cover: bool,
    ) -> Result<()> {
        let fs_path = source.to_path(self.root);
        let text = read_text(&fs_path, &self.options.encoding)?;
        let transformed = transform(&text, mode, self.options.convert_svg)?;

        let page = if is_cover {
            self.epub
                .add_cover_page(dest.clone(), title, transformed.html, fs_path)?
        } else {
            self.epub
                .add_page(dest.clone(), title, transformed.html, fs_path)?
        };
        if mode == ContentMode::Markdown
            && let Some(stylesheet) = &self.options.stylesheet
        {
            page.stylesheets.push(stylesheet.clone());
        }

        self.pages.push(PageReport {
            source: source.clone(),
            dest,
            links: transformed.links,
        });
        Ok(())
    }

    fn finish(mut self) -> Conversion {
        tracing::info!(
            "packaged {} pages, {} images, {} other files",
            self.pages.len(),
            self.images,
            self.others
        );
        if !self.options.return_temp_files {
            self.temp_files.clear();
        }
        Conversion {
            epub: self.epub,
            temp_files: self.temp_files,
            pages: self.pages,
            images: self.images,
            others: self.others,
        }
    }
}

/// Name of the root directory, resolving `.` and friends.
fn default_title(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| root.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    const SVG: &[u8] =
        br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><rect width="4" height="4"/></svg>"#;

    #[test]
    fn test_options_builder() {
        let options = ConvertOptions::default()
            .with_title("T")
            .with_author("A")
            .with_encoding("latin1")
            .with_convert_svg(false)
            .with_stylesheet("style.css")
            .with_return_temp_files(true)
            .with_excluded_dirs(["target", ".git"]);
        assert_eq!(options.title.as_deref(), Some("T"));
        assert_eq!(options.encoding, "latin1");
        assert!(!options.convert_svg);
        assert_eq!(options.excluded_dirs, vec!["target", ".git"]);

        let defaults = ConvertOptions::default();
        assert_eq!(defaults.encoding, "utf8");
        assert!(defaults.convert_svg);
        assert!(!defaults.return_temp_files);
        assert_eq!(defaults.excluded_dirs, vec![".git"]);
    }

    #[test]
    fn test_dispatch_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "README.md", b"# Welcome\n\nSee [ch](ch.md).");
        write(root, "ch.md", b"Chapter");
        write(root, "extra.htm", b"<p>extra</p>");
        write(root, "photo", b"\xFF\xD8\xFF\xE0\0\x10JFIF");
        write(root, "style.css", b"body {}");
        write(root, "fig.svg", SVG);

        let options = ConvertOptions::default()
            .with_title("Book")
            .with_stylesheet("style.css")
            .with_return_temp_files(true);
        let mut conversion = convert(root, &options).unwrap();
        let epub = &conversion.epub;

        let cover = epub.cover().unwrap();
        assert_eq!(cover.dest.as_str(), "README.html");
        assert_eq!(cover.title, "README");
        assert!(cover.html.contains("href=\"ch.html\""));
        assert_eq!(cover.stylesheets, vec!["style.css"]);

        let mut pages: Vec<_> = epub.pages().iter().map(|p| p.dest.as_str()).collect();
        pages.sort_unstable();
        assert_eq!(pages, vec!["ch.html", "extra.htm"]);
        let extra = epub.pages().iter().find(|p| p.title == "extra").unwrap();
        assert!(extra.stylesheets.is_empty());

        let mut images: Vec<_> = epub.images().iter().map(|i| i.dest.as_str()).collect();
        images.sort_unstable();
        assert_eq!(images, vec!["fig.png", "photo"]);
        assert_eq!(epub.others().len(), 1);
        assert_eq!(conversion.others, 1);
        assert_eq!(conversion.images, 2);

        assert_eq!(conversion.temp_files, vec![root.join("fig.png")]);
        assert!(root.join("fig.png").exists());
        conversion.remove_temp_files().unwrap();
        assert!(!root.join("fig.png").exists());
        assert!(conversion.temp_files.is_empty());
    }

    #[test]
    fn test_svg_copied_when_conversion_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fig.svg", SVG);
        write(dir.path(), "a.md", b"![f](fig.svg)");

        let options = ConvertOptions::default().with_convert_svg(false);
        let conversion = convert(dir.path(), &options).unwrap();
        assert_eq!(conversion.epub.others()[0].dest.as_str(), "fig.svg");
        assert!(conversion.epub.pages()[0].html.contains("src=\"fig.svg\""));
        assert!(!dir.path().join("fig.png").exists());
    }

    #[test]
    fn test_temp_files_hidden_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fig.svg", SVG);

        let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
        assert!(conversion.temp_files.is_empty());
        assert!(dir.path().join("fig.png").exists());
    }

    #[test]
    fn test_repeated_conversion_reuses_leftover_png() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fig.svg", SVG);

        convert(dir.path(), &ConvertOptions::default()).unwrap();
        assert!(dir.path().join("fig.png").exists());

        let options = ConvertOptions::default().with_return_temp_files(true);
        let conversion = convert(dir.path(), &options).unwrap();
        assert_eq!(conversion.epub.images()[0].dest.as_str(), "fig.png");
        assert!(conversion.temp_files.is_empty());
    }

    #[test]
    fn test_existing_png_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fig.svg", SVG);
        write(dir.path(), "fig.png", b"mine");

        let err = convert(dir.path(), &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry(_)));
        assert_eq!(fs::read(dir.path().join("fig.png")).unwrap(), b"mine");
    }

    #[test]
    fn test_failure_removes_rasterized_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/fig.svg", SVG);
        write(dir.path(), "a/b/broken.svg", b"<svg <<");

        let err = convert(dir.path(), &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Rasterize { .. }));
        assert!(!dir.path().join("a/fig.png").exists());
    }

    #[test]
    fn test_encoding() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", b"caf\xE9");

        let latin = ConvertOptions::default().with_encoding("latin1");
        let conversion = convert(dir.path(), &latin).unwrap();
        assert!(conversion.epub.pages()[0].html.contains("café"));

        let err = convert(dir.path(), &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));

        let unknown = ConvertOptions::default().with_encoding("nope");
        assert!(matches!(
            convert(dir.path(), &unknown),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_metadata_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("My Notes");
        write(&root, "a.md", b"x");

        let options = ConvertOptions::default().with_date("2024-03-01T10:00:00Z");
        let conversion = convert(&root, &options).unwrap();
        assert_eq!(conversion.epub.metadata.title, "My Notes");
        assert_eq!(conversion.epub.metadata.date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_page_reports_collect_links() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", b"[b](b.md#top) [web](https://example.com)");
        write(dir.path(), "b.md", b"# B");

        let conversion = convert(dir.path(), &ConvertOptions::default()).unwrap();
        let a = conversion
            .pages
            .iter()
            .find(|p| p.source.as_str() == "a.md")
            .unwrap();
        assert_eq!(a.dest.as_str(), "a.html");
        assert_eq!(
            a.links.iter().collect::<Vec<_>>(),
            vec![&LinkReference::new("b.md", Some("top"))]
        );
    }
}
