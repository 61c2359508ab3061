//! HTML fragment serialization.

use crate::DocumentData;
use crate::NodeId;
use crate::NodeKind;

impl DocumentData {
    /// Appends the markup of `id` to `out`. `raw` marks text whose parent
    /// is a raw-text element and must not be escaped.
    pub(crate) fn serialize(&self, id: NodeId, raw: bool, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };

        match &node.kind {
            NodeKind::Text(text) if raw => out.push_str(text),
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Document => {
                for child in &node.children {
                    self.serialize(*child, false, out);
                }
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');

                if is_void(&el.tag) {
                    return;
                }

                let raw_children = is_raw_text(&el.tag);
                for child in &node.children {
                    self.serialize(*child, raw_children, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

fn escape_into(input: &str, attribute: bool, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Elements whose text children serialize verbatim.
pub(crate) fn is_raw_text(tag: &str) -> bool {
    matches!(
        tag,
        "script" | "style" | "noscript" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext"
    )
}

pub(crate) fn is_void(tag: &str) -> bool {
    matches!(
        tag,
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
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}
