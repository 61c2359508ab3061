//! Fixtures shared by the unit tests.

use crate::events::DomEvent;
use crate::events::EventBus;
use crate::events::EventTarget;
use crate::host::Host;
use crate::memory::MemoryFetcher;
use crate::memory::MemoryHistory;
use crate::memory::MemoryWindow;
use pj_dom::Document;
use pj_js::JsRuntimeConfig;
use pj_js::PageRuntime;
use pj_js::ScriptHost;
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) fn parse(html: &str, url: &str) -> Document {
    let document = pj_html::parse(html, url);
    assert!(document.is_ok());
    match document {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

pub(crate) fn runtime() -> PageRuntime {
    let runtime = PageRuntime::new(JsRuntimeConfig::default());
    assert!(runtime.is_ok());
    match runtime {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

/// A live page on the in-memory host, with handles to every fake.
pub(crate) struct TestHost {
    pub host: Host,
    pub history: Rc<MemoryHistory>,
    pub window: Rc<MemoryWindow>,
    pub fetcher: Rc<MemoryFetcher>,
    pub runtime: Rc<RefCell<PageRuntime>>,
}

impl TestHost {
    pub fn new(url: &str, html: &str) -> Self {
        let history = Rc::new(MemoryHistory::new(url));
        let window = Rc::new(MemoryWindow::new());
        let fetcher = Rc::new(MemoryFetcher::new());
        let runtime = Rc::new(RefCell::new(runtime()));
        let scripts: Rc<RefCell<dyn ScriptHost>> = runtime.clone();
        let host = Host::new(
            parse(html, url),
            history.clone(),
            window.clone(),
            fetcher.clone(),
            scripts,
            EventBus::new(),
        );
        Self {
            host,
            history,
            window,
            fetcher,
            runtime,
        }
    }

    pub fn document(&self) -> &Document {
        &self.host.document
    }

    /// Records the names of the listed window and document events.
    pub fn record(&self, names: &[&'static str]) -> Rc<RefCell<Vec<&'static str>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for &name in names {
            let log = Rc::clone(&seen);
            self.host.events.on(name, move |event: &DomEvent| {
                if event.target != EventTarget::Window && event.target != EventTarget::Document {
                    return;
                }
                log.borrow_mut().push(event.name);
            });
        }
        seen
    }

    /// Text of the first element matching `selector` in the live document.
    pub fn text(&self, selector: &str) -> String {
        let document = self.document();
        match document.query_selector(document.root(), selector) {
            Ok(Some(node)) => document.text_content(node),
            Ok(None) => String::new(),
            Err(error) => panic!("{error}"),
        }
    }

    /// Evaluates `code` in the page runtime and returns its string value.
    pub fn eval(&self, code: &str) -> String {
        let value = self.runtime.borrow_mut().eval(code);
        assert!(value.is_ok());
        match value {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }
}
