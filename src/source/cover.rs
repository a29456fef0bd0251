//! Cover page detection.
//!
//! Only the root directory's own entries are eligible. A `readme.md` (any
//! case) is preferred over `index.htm`/`index.html`; within each group the
//! first entry in directory-listing order wins. Nested README and index files
//! are ordinary content.

use std::path::Path;

use super::{EntryKind, ListedEntry, list_dir};
use crate::error::Result;
use crate::path::RelativePath;
use crate::transform::ContentMode;

/// The designated landing page of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverSelection {
    pub path: RelativePath,
    pub mode: ContentMode,
}

impl CoverSelection {
    /// Package path of the rendered cover page.
    pub fn destination(&self) -> RelativePath {
        match self.mode {
            ContentMode::Markdown => {
                let name = self.path.file_name();
                let stem = &name[..name.len() - ".md".len()];
                self.path.parent().join(&format!("{stem}.html"))
            }
            ContentMode::Html => self.path.clone(),
        }
    }

    /// Page title: the file name without its final extension.
    pub fn title(&self) -> &str {
        self.path.title()
    }
}

/// Choose the cover among the root directory's entries, in listing order.
pub fn choose_cover(entries: &[ListedEntry]) -> Option<CoverSelection> {
    let files = || entries.iter().filter(|e| e.kind == EntryKind::File);

    if let Some(readme) = files().find(|e| e.name.eq_ignore_ascii_case("readme.md")) {
        return Some(CoverSelection {
            path: RelativePath::root().join(&readme.name),
            mode: ContentMode::Markdown,
        });
    }

    files()
        .find(|e| {
            e.name.eq_ignore_ascii_case("index.htm") || e.name.eq_ignore_ascii_case("index.html")
        })
        .map(|index| CoverSelection {
            path: RelativePath::root().join(&index.name),
            mode: ContentMode::Html,
        })
}

/// Detect the cover of the tree rooted at `root`.
pub fn detect_cover(root: &Path) -> Result<Option<CoverSelection>> {
    let entries = list_dir(root, &RelativePath::root())?;
    let cover = choose_cover(&entries);
    if let Some(cover) = &cover {
        tracing::info!("cover page: {}", cover.path);
    }
    Ok(cover)
}
