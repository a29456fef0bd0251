//! Deterministic directory traversal.
//!
//! The walk is depth-first with an explicit stack and follows the
//! filesystem's own listing order rather than sorting names:
//!
//! 1. Pop a directory and list it.
//! 2. Scan the listing back to front: subdirectories are pushed onto the
//!    stack, files are collected.
//! 3. Emit the collected files reversed again, i.e. in listing order.
//!
//! Because the last-listed subdirectory is pushed first, the first-listed one
//! is popped first: the net effect is a pre-order walk in listing order where
//! each directory's files come before the contents of its subdirectories.
//! Pages are packaged in this order when no table of contents says otherwise,
//! so it must stay stable.

use std::path::Path;

use super::{EntryKind, ListedEntry, list_dir};
use crate::error::Result;
use crate::path::RelativePath;

/// Traversal configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Directory names never descended into, matched exactly at any depth.
    pub excluded_dirs: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            excluded_dirs: vec![".git".to_string()],
        }
    }
}

impl WalkOptions {
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }
}

/// List every regular file under `root`, except `cover`, in walk order.
pub fn walk(
    root: &Path,
    cover: Option<&RelativePath>,
    options: &WalkOptions,
) -> Result<Vec<RelativePath>> {
    walk_with(|dir| list_dir(root, dir), cover, options)
}

/// Walk an arbitrary directory listing source.
///
/// `list` returns the entries of a directory (given relative to the root)
/// in the order they should be considered "native".
pub fn walk_with<F>(
    mut list: F,
    cover: Option<&RelativePath>,
    options: &WalkOptions,
) -> Result<Vec<RelativePath>>
where
    F: FnMut(&RelativePath) -> Result<Vec<ListedEntry>>,
{
    let mut files = Vec::new();
    let mut stack = vec![RelativePath::root()];

    while let Some(dir) = stack.pop() {
        let entries = list(&dir)?;
        let mut collected = Vec::new();
        for entry in entries.iter().rev() {
            let path = dir.join(&entry.name);
            match entry.kind {
                EntryKind::File => {
                    if Some(&path) != cover {
                        collected.push(path);
                    }
                }
                EntryKind::Dir => {
                    if options.is_excluded(&entry.name) {
                        tracing::debug!("skipping excluded directory {path}");
                    } else {
                        stack.push(path);
                    }
                }
                EntryKind::Other => {
                    tracing::debug!("skipping {path}: not a regular file or directory");
                }
            }
        }
        files.extend(collected.into_iter().rev());
    }

    Ok(files)
}
