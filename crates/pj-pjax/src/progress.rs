//! Progress indicator driven by the lifecycle events.

use crate::events::EventBus;
use crate::events::PJAX_FETCH;
use crate::events::PJAX_LOAD;
use crate::events::PJAX_READY;
use crate::events::PJAX_UNLOAD;
use pj_dom::Document;
use pj_dom::NodeId;
use std::cell::RefCell;
use std::rc::Rc;

struct Bar {
    node: NodeId,
    style: String,
    width: &'static str,
}

/// A `div` shown at the bottom of the document element while navigating.
#[derive(Clone)]
pub struct Progressbar {
    document: Document,
    bar: Rc<RefCell<Bar>>,
}

impl Progressbar {
    /// Creates the bar and binds it to the lifecycle events of `events`.
    pub fn install(document: &Document, events: &EventBus) -> Self {
        let node = document.create_element("div");
        let progressbar = Self {
            document: document.clone(),
            bar: Rc::new(RefCell::new(Bar {
                node,
                style: String::new(),
                width: "0",
            })),
        };

        let bar = progressbar.clone();
        events.on(PJAX_FETCH, move |_| {
            if let Some(root) = bar.document.document_element() {
                bar.document.append_child(root, bar.node());
            }
            bar.set_width("5%");
        });
        let bar = progressbar.clone();
        events.on(PJAX_UNLOAD, move |_| bar.set_width("80%"));
        let bar = progressbar.clone();
        events.on(PJAX_READY, move |_| bar.set_width("90%"));
        let bar = progressbar.clone();
        events.on(PJAX_LOAD, move |_| {
            bar.set_width("100%");
            bar.document.remove(bar.node());
        });
        progressbar
    }

    /// Sets the inline style the width is appended to.
    pub fn set_style(&self, style: &str) {
        self.bar.borrow_mut().style = style.to_owned();
        self.render();
    }

    pub fn width(&self) -> &'static str {
        self.bar.borrow().width
    }

    pub fn node(&self) -> NodeId {
        self.bar.borrow().node
    }

    fn set_width(&self, width: &'static str) {
        self.bar.borrow_mut().width = width;
        self.render();
    }

    fn render(&self) {
        let bar = self.bar.borrow();
        let style = format!("{}display:block;width:{};", bar.style, bar.width);
        self.document.set_attribute(bar.node, "style", &style);
    }
}
