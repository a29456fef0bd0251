//! Mutable HTML element tree.
//!
//! Markup is parsed with html5ever into an [`ArenaDom`], edited in place and
//! serialized back either as HTML ([`ArenaDom::inner_html`]) or as XHTML for
//! packaging ([`ArenaDom::inner_xhtml`]).

mod arena;
mod serialize;
mod tree_sink;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute};
pub use serialize::SerializableNode;

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;

use tree_sink::ArenaSink;

/// Parse a complete HTML document.
pub fn parse_document(html: &str) -> ArenaDom {
    html5ever::parse_document(ArenaSink::new(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Parse a fragment by wrapping it in a minimal document shell.
///
/// The shell always yields `head` and `body` elements; markup that belongs in
/// the head (`title`, `meta`, `link`, `style`) stays where it appears.
pub fn parse_fragment(html: &str) -> ArenaDom {
    parse_document(&format!("<html><body>{html}</body></html>"))
}
