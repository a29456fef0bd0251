//! Abbreviation definitions.
//!
//! A definition line has the form `*[HTML]: Hyper Text Markup Language`.
//! Definition lines are removed from the source, and every whole-word
//! occurrence of a defined abbreviation in ordinary text becomes
//! `<abbr title="Hyper Text Markup Language">HTML</abbr>`. Code spans,
//! code blocks and image alt text are left alone.

use memchr::memmem;
use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use quick_xml::escape::escape;

/// Abbreviation → expansion, later definitions overriding earlier ones.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Abbreviations {
    entries: Vec<(String, String)>,
}

impl Abbreviations {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, abbr: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a == abbr)
            .map(|(_, title)| title.as_str())
    }

    fn insert(&mut self, abbr: &str, title: &str) {
        match self.entries.iter_mut().find(|(a, _)| a == abbr) {
            Some(entry) => entry.1 = title.to_string(),
            None => self.entries.push((abbr.to_string(), title.to_string())),
        }
    }

    /// Wrap every whole-word occurrence in `text` with an `<abbr>` element.
    ///
    /// Returns `None` when nothing matched, so the caller can keep the
    /// original text event. Overlapping candidates resolve to the leftmost,
    /// then longest, match.
    pub fn expand(&self, text: &str) -> Option<String> {
        let bytes = text.as_bytes();
        let mut matches: Vec<(usize, usize, usize)> = Vec::new();
        for (index, (abbr, _)) in self.entries.iter().enumerate() {
            for start in memmem::find_iter(bytes, abbr.as_bytes()) {
                let end = start + abbr.len();
                if is_boundary(text, start, end) {
                    matches.push((start, end, index));
                }
            }
        }
        if matches.is_empty() {
            return None;
        }
        matches.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut out = String::with_capacity(text.len() + matches.len() * 32);
        let mut cursor = 0;
        for (start, end, index) in matches {
            if start < cursor {
                continue;
            }
            let (abbr, title) = &self.entries[index];
            out.push_str(&escape(&text[cursor..start]));
            out.push_str("<abbr title=\"");
            out.push_str(&escape(title.as_str()));
            out.push_str("\">");
            out.push_str(&escape(abbr.as_str()));
            out.push_str("</abbr>");
            cursor = end;
        }
        out.push_str(&escape(&text[cursor..]));
        Some(out)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// Parse a `*[ABBR]: title` line.
fn parse_definition(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix("*[")?;
    let close = rest.find("]:")?;
    let abbr = rest[..close].trim();
    if abbr.is_empty() {
        return None;
    }
    Some((abbr, rest[close + 2..].trim()))
}

/// Remove definition lines from `source`, returning the remaining text and
/// the collected definitions. Lines inside fenced code blocks are kept.
pub fn extract(source: &str) -> (String, Abbreviations) {
    let mut abbreviations = Abbreviations::default();
    let mut body = String::with_capacity(source.len());
    let mut fence: Option<&str> = None;

    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None => {
                if trimmed.starts_with("```") {
                    fence = Some("```");
                } else if trimmed.starts_with("~~~") {
                    fence = Some("~~~");
                } else if let Some((abbr, title)) = parse_definition(line) {
                    abbreviations.insert(abbr, title);
                    continue;
                }
            }
        }
        body.push_str(line);
    }

    // Longest first so that "HTML5" wins over "HTML" at the same position.
    abbreviations
        .entries
        .sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    (body, abbreviations)
}

/// Apply abbreviation expansion to a Markdown event stream.
pub fn apply<'a, I>(events: I, abbreviations: &'a Abbreviations) -> impl Iterator<Item = Event<'a>>
where
    I: Iterator<Item = Event<'a>> + 'a,
{
    let mut in_code = false;
    let mut image_depth = 0usize;
    events.map(move |event| {
        match &event {
            Event::Start(Tag::CodeBlock(_)) => in_code = true,
            Event::End(TagEnd::CodeBlock) => in_code = false,
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Text(text) if !in_code && image_depth == 0 => {
                if let Some(html) = abbreviations.expand(text) {
                    return Event::InlineHtml(CowStr::from(html));
                }
            }
            _ => {}
        }
        event
    })
}
