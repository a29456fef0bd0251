//! Markdown → HTML rendering.
//!
//! Rendering uses pulldown-cmark with the extensions a book source tree is
//! expected to rely on:
//!
//! - **Abbreviations**: `*[HTML]: Hyper Text Markup Language` ([`abbr`])
//! - **Attribute lists** on headings: `# Title {#id .class}`
//! - **Definition lists**, **footnotes** and **tables**
//! - **Fenced code blocks** (CommonMark core)
//! - **Markdown inside HTML**: the contents of HTML blocks marked
//!   `markdown="1"` are rendered ([`html_block`]). The marker itself is
//!   stripped later by the content transformer.
//!
//! The renderer never fails: every input is valid Markdown.

pub mod abbr;
pub mod html_block;

use pulldown_cmark::{Options, Parser, html};

use self::abbr::Abbreviations;

/// Extensions enabled for every Markdown source file.
pub fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
}

/// Render Markdown source to an HTML fragment.
pub fn render_markdown(source: &str) -> String {
    let (body, abbreviations) = abbr::extract(source);
    render_body(&body, &abbreviations)
}

fn render_body(body: &str, abbreviations: &Abbreviations) -> String {
    let (body, blocks) = html_block::stash(body);
    let parser = Parser::new_ext(&body, options());

    let mut out = String::with_capacity(body.len() * 3 / 2);
    if abbreviations.is_empty() {
        html::push_html(&mut out, parser);
    } else {
        html::push_html(&mut out, abbr::apply(parser, abbreviations));
    }

    for (index, block) in blocks.iter().enumerate() {
        let inner = render_body(&block.inner, abbreviations);
        out = html_block::restore(&out, index, &block.wrap(&inner));
    }
    out
}
