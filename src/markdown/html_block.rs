//! Markdown inside HTML blocks.
//!
//! An HTML block whose opening tag carries `markdown="1"` (or `"block"`,
//! `"span"`) has its contents rendered as Markdown, the way Python-Markdown's
//! `md_in_html` extension does. CommonMark on its own passes such contents
//! through untouched unless blank lines separate them from the tags.
//!
//! [`stash`] cuts the marked blocks out of the source and leaves a
//! placeholder paragraph behind. The caller renders what remains, renders
//! each block's contents, and splices them back with [`restore`].

use memchr::memchr;

/// How the contents of a marked block are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Block-level Markdown (paragraphs, lists, ...).
    Block,
    /// Inline Markdown only; no wrapping paragraph.
    Span,
}

/// An HTML block cut out of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedBlock {
    /// The opening tag as written, marker included.
    pub open_tag: String,
    /// Markdown between the tags.
    pub inner: String,
    pub close_tag: String,
    pub mode: BlockMode,
}

impl MarkedBlock {
    /// Wrap the rendered contents back into the block's tags.
    pub fn wrap(&self, rendered: &str) -> String {
        match self.mode {
            BlockMode::Block => format!("{}\n{rendered}{}\n", self.open_tag, self.close_tag),
            BlockMode::Span => {
                let inline = rendered
                    .trim_end()
                    .strip_prefix("<p>")
                    .and_then(|s| s.strip_suffix("</p>"))
                    .filter(|s| !s.contains("<p>"))
                    .unwrap_or(rendered);
                format!("{}{inline}{}\n", self.open_tag, self.close_tag)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenTag {
    end: usize,
    self_closing: bool,
}

fn placeholder(index: usize) -> String {
    format!("\u{E000}{index}\u{E001}")
}

/// Replace every marked HTML block in `source` by a placeholder paragraph.
///
/// Blocks must start a line (up to three spaces of indentation). Fenced
/// code is left alone, and so is a marked tag that is never closed.
pub fn stash(source: &str) -> (String, Vec<MarkedBlock>) {
    let mut out = String::with_capacity(source.len());
    let mut blocks = Vec::new();
    let mut fence: Option<(u8, usize)> = None;
    let mut pos = 0;

    while pos < source.len() {
        let line_end = memchr(b'\n', &source.as_bytes()[pos..]).map_or(source.len(), |i| pos + i + 1);
        let line = &source[pos..line_end];

        if let Some(open) = fence {
            if fence_marker(line).is_some_and(|(c, n)| c == open.0 && n >= open.1) {
                fence = None;
            }
        } else if let Some(marker) = fence_marker(line) {
            fence = Some(marker);
        } else if let Some((block, end)) = marked_block(source, pos) {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
            out.push_str(&placeholder(blocks.len()));
            out.push_str("\n\n");
            blocks.push(block);

            let rest_end = memchr(b'\n', &source.as_bytes()[end..]).map_or(source.len(), |i| end + i + 1);
            pos = if source[end..rest_end].trim().is_empty() { rest_end } else { end };
            continue;
        }

        out.push_str(line);
        pos = line_end;
    }
    (out, blocks)
}

/// Put the rendered block `index` back in place of its placeholder.
pub fn restore(html: &str, index: usize, rendered: &str) -> String {
    let placeholder = placeholder(index);
    let paragraph = format!("<p>{placeholder}</p>\n");
    if html.contains(&paragraph) {
        html.replacen(&paragraph, rendered, 1)
    } else {
        html.replacen(&placeholder, rendered, 1)
    }
}

/// Fence character and length if `line` opens or closes fenced code.
fn fence_marker(line: &str) -> Option<(u8, usize)> {
    let text = strip_indent(line)?;
    let c = *text.as_bytes().first()?;
    if c != b'`' && c != b'~' {
        return None;
    }
    let n = text.bytes().take_while(|&b| b == c).count();
    (n >= 3).then_some((c, n))
}

fn strip_indent(line: &str) -> Option<&str> {
    let text = line.trim_start_matches(' ');
    (line.len() - text.len() <= 3).then_some(text)
}

/// The marked block starting on the line at `start`, and the offset just
/// past its closing tag.
fn marked_block(source: &str, start: usize) -> Option<(MarkedBlock, usize)> {
    let text = strip_indent(&source[start..])?;
    let tag_start = source.len() - text.len();
    let (name, tag, marker) = parse_open_tag(source, tag_start)?;
    let mode = match marker?.as_str() {
        "1" | "block" => BlockMode::Block,
        "span" => BlockMode::Span,
        _ => return None,
    };
    if tag.self_closing {
        return None;
    }
    let (close_start, close_end) = find_close(source, tag.end, &name)?;

    let block = MarkedBlock {
        open_tag: source[tag_start..tag.end].to_string(),
        inner: source[tag.end..close_start].to_string(),
        close_tag: source[close_start..close_end].to_string(),
        mode,
    };
    Some((block, close_end))
}

/// Parse the opening tag at `at`: lowercased name, extent, and the value of
/// its `markdown` attribute.
fn parse_open_tag(source: &str, at: usize) -> Option<(String, OpenTag, Option<String>)> {
    let bytes = source.as_bytes();
    if bytes.get(at).copied() != Some(b'<') {
        return None;
    }
    let name_start = at + 1;
    let mut i = name_start;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }
    let name = source[name_start..i].to_ascii_lowercase();
    let mut marker = None;

    loop {
        let separator = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i).copied()? {
            b'>' => {
                let tag = OpenTag { end: i + 1, self_closing: false };
                return Some((name, tag, marker));
            }
            b'/' if bytes.get(i + 1).copied() == Some(b'>') => {
                let tag = OpenTag { end: i + 2, self_closing: true };
                return Some((name, tag, marker));
            }
            _ if i == separator => return None,
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        if i == attr_start {
            return None;
        }
        let attr = &source[attr_start..i];

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let mut value = "";
        if bytes.get(j).copied() == Some(b'=') {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            match bytes.get(j).copied()? {
                quote @ (b'"' | b'\'') => {
                    let value_start = j + 1;
                    let value_end = value_start + memchr(quote, &bytes[value_start..])?;
                    value = &source[value_start..value_end];
                    i = value_end + 1;
                }
                _ => {
                    let value_start = j;
                    while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    value = &source[value_start..j];
                    i = j;
                }
            }
        }

        if attr.eq_ignore_ascii_case("markdown") {
            marker = Some(value.to_string());
        }
    }
}

/// Offsets of the tag closing an element `name` opened just before `from`,
/// skipping nested elements of the same name.
fn find_close(source: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while let Some(offset) = memchr(b'<', &bytes[i..]) {
        let at = i + offset;
        if let Some(end) = closing_tag_at(source, at, name) {
            depth -= 1;
            if depth == 0 {
                return Some((at, end));
            }
            i = end;
            continue;
        }
        if let Some((nested, tag, _)) = parse_open_tag(source, at)
            && nested == name
        {
            if !tag.self_closing {
                depth += 1;
            }
            i = tag.end;
            continue;
        }
        i = at + 1;
    }
    None
}

/// End offset of `</name>` if it starts at `at`.
fn closing_tag_at(source: &str, at: usize, name: &str) -> Option<usize> {
    let rest = source.get(at..)?.strip_prefix("</")?;
    let candidate = rest.get(..name.len())?;
    if !candidate.eq_ignore_ascii_case(name) {
        return None;
    }
    let after = rest[name.len()..].trim_start();
    after
        .starts_with('>')
        .then(|| source.len() - after.len() + 1)
}
