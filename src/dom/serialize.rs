//! Serialization of arena nodes back to markup.
//!
//! - HTML: html5ever's serializer driven through the [`Serialize`] trait, so
//!   void elements, raw-text elements and escaping follow the HTML
//!   serialization algorithm.
//! - XHTML: a small XML writer used when a page is packaged, since EPUB
//!   content documents must be well-formed XML.

use std::collections::VecDeque;
use std::io;

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};
use html5ever::{QualName, ns};

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};
use crate::error::{Error, Result};

/// A node borrowed from its arena, ready for html5ever's serializer.
pub struct SerializableNode<'a> {
    dom: &'a ArenaDom,
    id: ArenaNodeId,
}

impl<'a> SerializableNode<'a> {
    pub fn new(dom: &'a ArenaDom, id: ArenaNodeId) -> Self {
        Self { dom, id }
    }
}

enum Op {
    Open(ArenaNodeId),
    Close(QualName),
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let mut ops = VecDeque::new();
        match traversal_scope {
            TraversalScope::IncludeNode => ops.push_back(Op::Open(self.id)),
            TraversalScope::ChildrenOnly(_) => ops.extend(self.dom.children(self.id).map(Op::Open)),
        }

        while let Some(op) = ops.pop_front() {
            let id = match op {
                Op::Close(name) => {
                    serializer.end_elem(name)?;
                    continue;
                }
                Op::Open(id) => id,
            };
            let Some(node) = self.dom.get(id) else {
                continue;
            };

            match &node.data {
                ArenaNodeData::Element { name, attrs } => {
                    serializer.start_elem(
                        name.clone(),
                        attrs.iter().map(|a| (&a.name, a.value.as_str())),
                    )?;
                    ops.push_front(Op::Close(name.clone()));
                }
                ArenaNodeData::Document => {}
                ArenaNodeData::Text(text) => {
                    serializer.write_text(text)?;
                    continue;
                }
                ArenaNodeData::Comment(text) => {
                    serializer.write_comment(text)?;
                    continue;
                }
                ArenaNodeData::Doctype { name, .. } => {
                    serializer.write_doctype(name)?;
                    continue;
                }
            }

            let children: Vec<_> = self.dom.children(id).collect();
            for child in children.into_iter().rev() {
                ops.push_front(Op::Open(child));
            }
        }
        Ok(())
    }
}

impl ArenaDom {
    /// Serialize the children of `id` as HTML.
    pub fn inner_html(&self, id: ArenaNodeId) -> Result<String> {
        let mut bytes = Vec::new();
        let opts = SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        };
        serialize(&mut bytes, &SerializableNode::new(self, id), opts)
            .map_err(|e| Error::Html(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| Error::Html(e.to_string()))
    }

    /// Serialize the children of `id` as well-formed XHTML.
    pub fn inner_xhtml(&self, id: ArenaNodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_xhtml(child, &mut out);
        }
        out
    }

    fn write_xhtml(&self, id: ArenaNodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            ArenaNodeData::Element { name, attrs } => {
                let local = name.local.as_ref();
                out.push('<');
                out.push_str(local);

                // Foreign content needs its namespace declared where it starts.
                let parent_ns = match self.get(node.parent).map(|p| &p.data) {
                    Some(ArenaNodeData::Element { name, .. }) => Some(&name.ns),
                    _ => None,
                };
                if name.ns == ns!(svg) && parent_ns != Some(&ns!(svg)) {
                    out.push_str(r#" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink""#);
                } else if name.ns == ns!(mathml) && parent_ns != Some(&ns!(mathml)) {
                    out.push_str(r#" xmlns="http://www.w3.org/1998/Math/MathML""#);
                }

                for attr in attrs {
                    // Namespace declarations are emitted above.
                    if attr.name.local.as_ref() == "xmlns"
                        || attr.name.prefix.as_ref().is_some_and(|p| p.as_ref() == "xmlns")
                    {
                        continue;
                    }
                    out.push(' ');
                    if let Some(prefix) = &attr.name.prefix {
                        out.push_str(prefix.as_ref());
                        out.push(':');
                    }
                    out.push_str(attr.name.local.as_ref());
                    out.push_str("=\"");
                    out.push_str(&quick_xml::escape::escape(attr.value.as_str()));
                    out.push('"');
                }

                if node.first_child.is_none() && is_void(local) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                let raw_text = matches!(local, "script" | "style");
                for child in self.children(id) {
                    match self.get(child).map(|c| &c.data) {
                        Some(ArenaNodeData::Text(text)) if raw_text => push_cdata(out, text),
                        _ => self.write_xhtml(child, out),
                    }
                }
                out.push_str("</");
                out.push_str(local);
                out.push('>');
            }
            ArenaNodeData::Text(text) => {
                out.push_str(&quick_xml::escape::partial_escape(text.as_str()));
            }
            ArenaNodeData::Comment(text) => {
                out.push_str("<!--");
                push_comment_text(out, text);
                out.push_str("-->");
            }
            ArenaNodeData::Document => {
                for child in self.children(id) {
                    self.write_xhtml(child, out);
                }
            }
            ArenaNodeData::Doctype { .. } => {}
        }
    }
}

/// XML comments may not contain `--` or end in `-`; a space goes after
/// every `-` that would form either.
fn push_comment_text(out: &mut String, text: &str) {
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '-' && matches!(chars.peek(), Some('-') | None) {
            out.push(' ');
        }
    }
}

fn push_cdata(out: &mut String, text: &str) {
    if text.contains('<') || text.contains('&') {
        out.push_str("<![CDATA[");
        out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
        out.push_str("]]>");
    } else {
        out.push_str(text);
    }
}

fn is_void(local: &str) -> bool {
    matches!(
        local,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}
