//! Root-relative paths.
//!
//! Every source file and every rewritten reference is identified by a
//! [`RelativePath`]: a `/`-separated path below the conversion root. The
//! same string doubles as the entry name inside the package, so two values
//! compare equal exactly when they denote the same file.

use std::fmt;
use std::path::{Path, PathBuf};

/// A path relative to the conversion root. Never absolute, never contains
/// `.` or `..` segments. The empty path denotes the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// The conversion root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated relative path.
    ///
    /// Returns `None` for absolute paths or paths that climb out of the root.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with('/') {
            return None;
        }
        let mut segments = Vec::new();
        for segment in s.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                other => segments.push(other),
            }
        }
        Some(Self(segments.join("/")))
    }

    /// Append a single path segment.
    pub fn join(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Final segment (the file or directory name).
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// Everything before the final segment.
    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(pos) => Self(self.0[..pos].to_string()),
            None => Self::root(),
        }
    }

    /// File name without its final extension.
    ///
    /// `notes.tar.gz` gives `notes.tar`; a name without a dot is returned as is.
    pub fn title(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(pos) => &name[..pos],
            None => name,
        }
    }

    /// Case-sensitive check on the file name suffix.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.file_name().ends_with(suffix)
    }

    /// Replace a trailing `old` suffix with `new`. Unchanged if the suffix is absent.
    pub fn replace_suffix(&self, old: &str, new: &str) -> Self {
        match self.0.strip_suffix(old) {
            Some(stem) if self.has_suffix(old) => Self(format!("{stem}{new}")),
            _ => self.clone(),
        }
    }

    /// Resolve against a filesystem root.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
