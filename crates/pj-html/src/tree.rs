//! Tree construction with implied `<html>`, `<head>` and `<body>`.

use crate::tokenizer::Token;
use crate::tokenizer::is_void;
use pj_dom::Document;
use pj_dom::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    BeforeHead,
    InHead,
    AfterHead,
    InBody,
}

struct TreeBuilder<'a> {
    doc: &'a Document,
    html: Option<NodeId>,
    head: Option<NodeId>,
    body: Option<NodeId>,
    /// Open elements below `<head>`/`<body>`.
    stack: Vec<NodeId>,
    mode: Mode,
}

pub(crate) fn build_tree(doc: &Document, tokens: Vec<Token>) {
    let mut builder = TreeBuilder {
        doc,
        html: None,
        head: None,
        body: None,
        stack: Vec::new(),
        mode: Mode::BeforeHead,
    };

    for token in tokens {
        match token {
            Token::Text(text) => builder.text(&text),
            Token::Start { name, attrs } => builder.start(&name, attrs),
            Token::End { name } => builder.end(&name),
        }
    }

    builder.ensure_body();
}

impl TreeBuilder<'_> {
    fn ensure_html(&mut self) -> NodeId {
        if let Some(html) = self.html {
            return html;
        }
        let html = self.doc.create_element("html");
        self.doc.append_child(self.doc.root(), html);
        self.html = Some(html);
        html
    }

    fn ensure_head(&mut self) -> NodeId {
        if let Some(head) = self.head {
            return head;
        }
        let html = self.ensure_html();
        let head = self.doc.create_element("head");
        self.doc.append_child(html, head);
        self.head = Some(head);
        head
    }

    fn ensure_body(&mut self) -> NodeId {
        if let Some(body) = self.body {
            return body;
        }
        self.ensure_head();
        let html = self.ensure_html();
        let body = self.doc.create_element("body");
        self.doc.append_child(html, body);
        self.body = Some(body);
        self.stack.clear();
        self.mode = Mode::InBody;
        body
    }

    fn current(&self) -> Option<NodeId> {
        self.stack.last().copied().or(match self.mode {
            Mode::InHead => self.head,
            Mode::InBody => self.body,
            Mode::BeforeHead | Mode::AfterHead => self.html,
        })
    }

    fn text(&mut self, text: &str) {
        let whitespace = text.chars().all(|ch| ch.is_ascii_whitespace());
        if whitespace && self.mode == Mode::BeforeHead {
            return;
        }
        if !whitespace && self.mode != Mode::InBody && self.stack.is_empty() {
            self.ensure_body();
        }

        let Some(parent) = self.current() else {
            return;
        };

        // Adjacent text merges into one node.
        if let Some(last) = self.doc.children(parent).last().copied() {
            if let Some(pj_dom::NodeKind::Text(existing)) = self.doc.kind(last) {
                self.doc.set_text_content(last, &format!("{existing}{text}"));
                return;
            }
        }
        let node = self.doc.create_text(text);
        self.doc.append_child(parent, node);
    }

    fn start(&mut self, name: &str, attrs: Vec<(String, String)>) {
        match name {
            "html" => {
                let html = self.ensure_html();
                self.merge_attributes(html, attrs);
                return;
            }
            "head" if self.head.is_none() => {
                let head = self.ensure_head();
                self.merge_attributes(head, attrs);
                self.mode = Mode::InHead;
                return;
            }
            "head" => return,
            "body" => {
                let body = self.ensure_body();
                self.merge_attributes(body, attrs);
                return;
            }
            _ => {}
        }

        if self.stack.is_empty() && self.mode != Mode::InBody {
            if is_head_content(name) {
                self.ensure_head();
                self.mode = Mode::InHead;
            } else {
                self.ensure_body();
            }
        }

        if self.mode == Mode::InBody {
            self.close_implied(name);
        }

        let Some(parent) = self.current() else {
            return;
        };
        let element = self.doc.create_element(name);
        for (attr, value) in &attrs {
            self.doc.set_attribute(element, attr, value);
        }
        self.doc.append_child(parent, element);

        if !is_void(name) {
            self.stack.push(element);
        }
    }

    fn end(&mut self, name: &str) {
        match name {
            "head" if self.mode == Mode::InHead && self.stack.is_empty() => {
                self.mode = Mode::AfterHead;
                return;
            }
            "html" | "body" | "head" => return,
            _ => {}
        }

        let Some(position) = self
            .stack
            .iter()
            .rposition(|open| self.doc.tag_name(*open).as_deref() == Some(name))
        else {
            if name == "p" && self.mode == Mode::InBody {
                // `</p>` without an open paragraph produces an empty one.
                if let Some(parent) = self.current() {
                    let p = self.doc.create_element("p");
                    self.doc.append_child(parent, p);
                }
            }
            return;
        };
        self.stack.truncate(position);
    }

    fn close_implied(&mut self, name: &str) {
        let closes: &[&str] = match name {
            "li" => &["li"],
            "dt" | "dd" => &["dt", "dd"],
            "option" => &["option"],
            "tr" => &["tr", "td", "th"],
            "td" | "th" => &["td", "th"],
            _ if closes_paragraph(name) => &["p"],
            _ => &[],
        };
        if closes.is_empty() {
            return;
        }

        if let Some(position) = self.stack.iter().rposition(|open| {
            self.doc
                .tag_name(*open)
                .is_some_and(|tag| closes.contains(&tag.as_str()))
        }) {
            self.stack.truncate(position);
        }
    }

    fn merge_attributes(&self, node: NodeId, attrs: Vec<(String, String)>) {
        for (name, value) in attrs {
            if !self.doc.has_attribute(node, &name) {
                self.doc.set_attribute(node, &name, &value);
            }
        }
    }
}

fn is_head_content(tag: &str) -> bool {
    matches!(
        tag,
        "base" | "link" | "meta" | "title" | "style" | "script" | "noscript" | "template"
    )
}

fn closes_paragraph(tag: &str) -> bool {
    matches!(
        tag,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "details"
            | "div"
            | "dl"
            | "fieldset"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hr"
            | "main"
            | "nav"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "ul"
    )
}
