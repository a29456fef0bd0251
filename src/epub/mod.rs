//! EPUB 2 package assembly.

mod builder;
mod writer;

pub use builder::{Epub, Image, Metadata, OtherFile, Page, escape_id};
pub use writer::{write_epub, write_epub_to_writer};
