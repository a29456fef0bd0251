//! Source tree inspection: directory listings, cover detection, traversal
//! and per-file classification.

mod cover;
mod walk;

pub use cover::{CoverSelection, choose_cover, detect_cover};
pub use walk::{WalkOptions, walk, walk_with};

use std::fs;
use std::path::Path;

use crate::classify::{ImageFormat, sniff_file};
use crate::error::{Error, Result};
use crate::path::RelativePath;

/// What a directory entry is, following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Sockets, devices, dangling symlinks.
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl ListedEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// List a directory below `root` in the filesystem's native order.
pub fn list_dir(root: &Path, dir: &RelativePath) -> Result<Vec<ListedEntry>> {
    let fs_dir = dir.to_path(root);
    let mut entries = Vec::new();
    for entry in fs::read_dir(&fs_dir).map_err(|e| Error::read(&fs_dir, e))? {
        let entry = entry.map_err(|e| Error::read(&fs_dir, e))?;
        let name = entry.file_name().into_string().map_err(|name| {
            Error::InvalidEntry(format!(
                "non UTF-8 file name {:?} in {}",
                name,
                fs_dir.display()
            ))
        })?;
        let kind = match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => EntryKind::File,
            Ok(meta) if meta.is_dir() => EntryKind::Dir,
            _ => EntryKind::Other,
        };
        entries.push(ListedEntry { name, kind });
    }
    Ok(entries)
}

/// How a source file is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Markdown,
    Html,
    /// An SVG to be rasterized; only produced when rasterization is enabled.
    VectorImage,
    RasterImage(ImageFormat),
    Other,
}

impl FileKind {
    /// Classify a file. Markdown, HTML and SVG are recognized by suffix;
    /// raster images by content alone.
    pub fn classify(path: &RelativePath, fs_path: &Path, convert_svg: bool) -> Result<Self> {
        if path.has_suffix(".md") {
            Ok(FileKind::Markdown)
        } else if path.has_suffix(".html") || path.has_suffix(".htm") {
            Ok(FileKind::Html)
        } else if convert_svg && path.has_suffix(".svg") {
            Ok(FileKind::VectorImage)
        } else {
            Ok(sniff_file(fs_path)?.map_or(FileKind::Other, FileKind::RasterImage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_suffix_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("logo"), b"GIF89a\x01\x00\x01\x00").unwrap();
        std::fs::write(root.join("data.bin"), b"\x00\x01\x02").unwrap();
        std::fs::write(root.join("d.svg"), b"<svg/>").unwrap();

        let kind = |name: &str, svg: bool| {
            let rel = RelativePath::parse(name).unwrap();
            FileKind::classify(&rel, &rel.to_path(root), svg).unwrap()
        };

        assert_eq!(kind("a.md", true), FileKind::Markdown);
        assert_eq!(kind("b.html", true), FileKind::Html);
        assert_eq!(kind("c.htm", true), FileKind::Html);
        assert_eq!(kind("d.svg", true), FileKind::VectorImage);
        assert_eq!(kind("d.svg", false), FileKind::Other);
        assert_eq!(kind("logo", true), FileKind::RasterImage(ImageFormat::Gif));
        assert_eq!(kind("data.bin", true), FileKind::Other);
    }

    #[test]
    fn test_list_dir_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("file.md"), "x").unwrap();

        let mut entries = list_dir(dir.path(), &RelativePath::root()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                ListedEntry::new("file.md", EntryKind::File),
                ListedEntry::new("sub", EntryKind::Dir),
            ]
        );
    }
}
