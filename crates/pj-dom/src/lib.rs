//! DOM tree data structures.
//!
//! A [`Document`] is a cheap, clonable handle to an arena of nodes. Node ids
//! are only meaningful for the document that produced them; use
//! [`Document::import_node`] to copy a subtree across documents.

pub mod selector;
mod serialize;

use pj_core::PjaxResult;
use selector::Combinator;
use selector::ComplexSelector;
use selector::CompoundSelector;
use selector::PseudoClass;
use selector::SelectorList;
use std::cell::RefCell;
use std::rc::Rc;

pub use selector::split_top_level;

/// ID used to address nodes in the DOM arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lower-case local name.
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct DocumentData {
    nodes: Vec<NodeData>,
    url: String,
    focused: Option<NodeId>,
}

/// Owned copy of a subtree, used to move nodes between arenas.
#[derive(Debug, Clone)]
enum Snapshot {
    Document(Vec<Snapshot>),
    Element(ElementData, Vec<Snapshot>),
    Text(String),
}

const ROOT: NodeId = NodeId(0);

/// Shared handle to an HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    data: Rc<RefCell<DocumentData>>,
}

impl Document {
    pub fn new(url: &str) -> Self {
        Self {
            data: Rc::new(RefCell::new(DocumentData {
                nodes: vec![NodeData {
                    kind: NodeKind::Document,
                    parent: None,
                    children: Vec::new(),
                }],
                url: url.to_owned(),
                focused: None,
            })),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn url(&self) -> String {
        self.data.borrow().url.clone()
    }

    pub fn set_url(&self, url: &str) {
        self.data.borrow_mut().url = url.to_owned();
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    fn push(&self, kind: NodeKind) -> NodeId {
        let mut data = self.data.borrow_mut();
        let id = NodeId(data.nodes.len());
        data.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.data.borrow().node(node).map(|data| data.kind.clone())
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.data.borrow().element(node).is_some()
    }

    /// Lower-case tag name of an element.
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.data.borrow().element(node).map(|el| el.tag.clone())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data.borrow().node(node).and_then(|data| data.parent)
    }

    /// Parent only when it is an element.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.data.borrow().parent_element(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.data
            .borrow()
            .node(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        let data = self.data.borrow();
        data.node(node)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|child| data.element(*child).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `node` is attached to this document's root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.data.borrow().is_connected(node)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let data = self.data.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = data.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Appends `child` to `parent`, detaching it from its old position first.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Inserts `child` before `reference`, or at the end when `reference`
    /// is `None` or not a child of `parent`.
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if parent == child || self.contains(child, parent) {
            return;
        }

        let mut data = self.data.borrow_mut();
        if data.node(parent).is_none() || data.node(child).is_none() {
            return;
        }
        data.detach(child);

        let position = reference.and_then(|reference| {
            data.nodes[parent.0]
                .children
                .iter()
                .position(|candidate| *candidate == reference)
        });
        let siblings = &mut data.nodes[parent.0].children;
        match position {
            Some(index) => siblings.insert(index, child),
            None => siblings.push(child),
        }
        data.nodes[child.0].parent = Some(parent);
    }

    /// Detaches `node` from its parent.
    pub fn remove(&self, node: NodeId) {
        self.data.borrow_mut().detach(node);
    }

    /// Puts `replacement` where `old` is and detaches `old`.
    pub fn replace_with(&self, old: NodeId, replacement: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        if old == replacement {
            return;
        }
        self.insert_before(parent, replacement, Some(old));
        self.remove(old);
    }

    /// Deep-copies `node` from `source` into this document. The copy is
    /// detached; `source` may be this document.
    pub fn import_node(&self, source: &Document, node: NodeId) -> Option<NodeId> {
        let snapshot = source.data.borrow().snapshot(node)?;
        Some(self.materialize(snapshot))
    }

    pub fn clone_node(&self, node: NodeId) -> Option<NodeId> {
        self.import_node(self, node)
    }

    fn materialize(&self, snapshot: Snapshot) -> NodeId {
        match snapshot {
            Snapshot::Text(text) => self.create_text(&text),
            Snapshot::Element(element, children) => {
                let id = self.push(NodeKind::Element(element));
                for child in children {
                    let child = self.materialize(child);
                    self.append_child(id, child);
                }
                id
            }
            Snapshot::Document(children) => {
                let id = self.push(NodeKind::Document);
                for child in children {
                    let child = self.materialize(child);
                    self.append_child(id, child);
                }
                id
            }
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.data
            .borrow()
            .element(node)
            .and_then(|el| el.attribute(name))
            .map(ToOwned::to_owned)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.data
            .borrow()
            .element(node)
            .map(|el| el.attrs.clone())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut data = self.data.borrow_mut();
        let Some(NodeKind::Element(el)) = data.nodes.get_mut(node.0).map(|n| &mut n.kind) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        match el.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => el.attrs.push((name, value.to_owned())),
        }
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let mut data = self.data.borrow_mut();
        if let Some(NodeKind::Element(el)) = data.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            el.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let data = self.data.borrow();
        let mut out = String::new();
        data.collect_text(node, &mut out);
        out
    }

    /// Replaces all children of `node` with a single text node.
    pub fn set_text_content(&self, node: NodeId, text: &str) {
        if let Some(NodeKind::Text(_)) = self.kind(node) {
            let mut data = self.data.borrow_mut();
            data.nodes[node.0].kind = NodeKind::Text(text.to_owned());
            return;
        }

        for child in self.children(node) {
            self.remove(child);
        }
        if !text.is_empty() {
            let text = self.create_text(text);
            self.append_child(node, text);
        }
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let data = self.data.borrow();
        let mut out = String::new();
        if let Some(n) = data.node(node) {
            let raw = data.element(node).is_some_and(|el| serialize::is_raw_text(&el.tag));
            for child in &n.children {
                data.serialize(*child, raw, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let data = self.data.borrow();
        let mut out = String::new();
        let raw = data
            .node(node)
            .and_then(|n| n.parent)
            .and_then(|parent| data.element(parent))
            .is_some_and(|el| serialize::is_raw_text(&el.tag));
        data.serialize(node, raw, &mut out);
        out
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(ROOT).into_iter().next()
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_of_html("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_of_html("body")
    }

    fn child_of_html(&self, tag: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html)
            .into_iter()
            .find(|child| self.tag_name(*child).as_deref() == Some(tag))
    }

    /// `document.title`: the first `<title>` text with whitespace collapsed.
    pub fn title(&self) -> String {
        let Some(title) = self.first_by_tag("title") else {
            return String::new();
        };
        self.text_content(title)
            .split_ascii_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn set_title(&self, value: &str) {
        if let Some(title) = self.first_by_tag("title") {
            self.set_text_content(title, value);
            return;
        }
        if let Some(head) = self.head() {
            let title = self.create_element("title");
            self.set_text_content(title, value);
            self.append_child(head, title);
        }
    }

    fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        let data = self.data.borrow();
        data.descendants(ROOT)
            .into_iter()
            .find(|id| data.element(*id).is_some_and(|el| el.tag == tag))
    }

    /// Focused element, falling back to `<body>`.
    pub fn active_element(&self) -> Option<NodeId> {
        let focused = self.data.borrow().focused;
        focused
            .filter(|node| self.is_connected(*node))
            .or_else(|| self.body())
    }

    pub fn focus(&self, node: NodeId) {
        if self.is_element(node) {
            self.data.borrow_mut().focused = Some(node);
        }
    }

    pub fn blur(&self, node: NodeId) {
        let mut data = self.data.borrow_mut();
        if data.focused == Some(node) {
            data.focused = None;
        }
    }

    /// Elements below `scope` in document order.
    pub fn descendant_elements(&self, scope: NodeId) -> Vec<NodeId> {
        let data = self.data.borrow();
        data.descendants(scope)
            .into_iter()
            .filter(|id| data.element(*id).is_some())
            .collect()
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> PjaxResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        let data = self.data.borrow();
        Ok(data
            .descendants(scope)
            .into_iter()
            .filter(|id| data.matches_list(&list, *id))
            .collect())
    }

    pub fn query_selector(&self, scope: NodeId, selector: &str) -> PjaxResult<Option<NodeId>> {
        Ok(self.query_selector_all(scope, selector)?.into_iter().next())
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> PjaxResult<bool> {
        let list = SelectorList::parse(selector)?;
        Ok(self.data.borrow().matches_list(&list, node))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &str) -> PjaxResult<Option<NodeId>> {
        let list = SelectorList::parse(selector)?;
        let data = self.data.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if data.matches_list(&list, id) {
                return Ok(Some(id));
            }
            current = data.node(id).and_then(|n| n.parent);
        }
        Ok(None)
    }
}

impl DocumentData {
    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get(id.0).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
        self.nodes[id.0].parent = None;
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ROOT {
                return true;
            }
            current = self.node(node).and_then(|n| n.parent);
        }
        false
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .node(scope)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.node(id) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn snapshot(&self, id: NodeId) -> Option<Snapshot> {
        let node = self.node(id)?;
        let children = || {
            node.children
                .iter()
                .filter_map(|child| self.snapshot(*child))
                .collect()
        };
        Some(match &node.kind {
            NodeKind::Text(text) => Snapshot::Text(text.clone()),
            NodeKind::Element(el) => Snapshot::Element(el.clone(), children()),
            NodeKind::Document => Snapshot::Document(children()),
        })
    }

    fn element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .and_then(|n| n.parent)
            .and_then(|parent| self.node(parent))
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .copied()
                    .filter(|child| self.element(*child).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn matches_list(&self, list: &SelectorList, id: NodeId) -> bool {
        self.element(id).is_some()
            && list
                .selectors
                .iter()
                .any(|selector| self.matches_complex(selector, selector.compounds.len() - 1, id))
    }

    fn matches_complex(&self, selector: &ComplexSelector, index: usize, id: NodeId) -> bool {
        if !self.matches_compound(&selector.compounds[index], id) {
            return false;
        }
        if index == 0 {
            return true;
        }

        let next = index - 1;
        match selector.combinators[next] {
            Combinator::Child => self
                .parent_element(id)
                .is_some_and(|parent| self.matches_complex(selector, next, parent)),
            Combinator::Descendant => {
                let mut current = self.parent_element(id);
                while let Some(ancestor) = current {
                    if self.matches_complex(selector, next, ancestor) {
                        return true;
                    }
                    current = self.parent_element(ancestor);
                }
                false
            }
            Combinator::NextSibling => {
                let siblings = self.element_siblings(id);
                siblings
                    .iter()
                    .position(|sibling| *sibling == id)
                    .and_then(|position| position.checked_sub(1))
                    .is_some_and(|previous| self.matches_complex(selector, next, siblings[previous]))
            }
            Combinator::SubsequentSibling => {
                let siblings = self.element_siblings(id);
                siblings
                    .iter()
                    .take_while(|sibling| **sibling != id)
                    .any(|sibling| self.matches_complex(selector, next, *sibling))
            }
        }
    }

    fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .and_then(|n| n.parent)
            .filter(|parent| self.element(*parent).is_some())
    }

    fn matches_compound(&self, compound: &CompoundSelector, id: NodeId) -> bool {
        let Some(el) = self.element(id) else {
            return false;
        };

        if compound.tag.as_ref().is_some_and(|tag| *tag != el.tag) {
            return false;
        }

        if let Some(expected) = &compound.id {
            if el.attribute("id") != Some(expected.as_str()) {
                return false;
            }
        }

        if !compound.classes.is_empty() {
            let classes = el.attribute("class").unwrap_or_default();
            let all = compound
                .classes
                .iter()
                .all(|class| classes.split_ascii_whitespace().any(|item| item == class));
            if !all {
                return false;
            }
        }

        if !compound
            .attributes
            .iter()
            .all(|attribute| attribute.matches(el.attribute(&attribute.name)))
        {
            return false;
        }

        compound.pseudos.iter().all(|pseudo| match pseudo {
            PseudoClass::Not(list) => !self.matches_list(list, id),
            PseudoClass::FirstChild => self.element_siblings(id).first() == Some(&id),
            PseudoClass::LastChild => self.element_siblings(id).last() == Some(&id),
        })
    }
}
