//! # bindery
//!
//! Bind a directory of Markdown, HTML and images into a single EPUB.
//!
//! ## Features
//!
//! - Markdown rendered with tables, footnotes, definition lists, heading
//!   attributes and abbreviations
//! - Links between Markdown files keep working (`a.md` → `a.html`)
//! - SVG images rasterized to PNG for readers without vector support
//! - Raster images recognized by content, not by extension
//! - A root `README.md` or `index.html` becomes the cover page
//!
//! ## Quick Start
//!
//! ```no_run
//! use bindery::{ConvertOptions, convert};
//!
//! let options = ConvertOptions::default()
//!     .with_title("Field Notes")
//!     .with_return_temp_files(true);
//! let mut conversion = convert("notes/".as_ref(), &options)?;
//! conversion.write("notes.epub".as_ref())?;
//! conversion.remove_temp_files()?;
//! # Ok::<(), bindery::Error>(())
//! ```
//!
//! ## Rewriting references
//!
//! The transformation applied to each document is available on its own:
//!
//! ```
//! use bindery::transform::{ContentMode, transform};
//!
//! let out = transform("[next](chapter-2.md#start)", ContentMode::Markdown, true)?;
//! assert_eq!(out.html, "<p><a href=\"chapter-2.html#start\">next</a></p>\n");
//! # Ok::<(), bindery::Error>(())
//! ```

pub mod classify;
pub mod convert;
pub mod dom;
pub mod epub;
pub mod error;
pub mod markdown;
pub mod path;
pub mod raster;
pub mod source;
pub mod transform;
pub(crate) mod util;

pub use convert::{Conversion, ConvertOptions, PageReport, convert};
pub use epub::{Epub, write_epub};
pub use error::{Error, Result};
pub use path::RelativePath;
