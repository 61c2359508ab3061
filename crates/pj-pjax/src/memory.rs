//! In-memory host: history stack, headless window and a scripted fetcher.

use crate::host::FetchRequest;
use crate::host::FetchResponse;
use crate::host::Fetcher;
use crate::host::History;
use crate::host::Position;
use crate::host::ResourceEvent;
use crate::host::ResourceEventKind;
use crate::host::ScrollRestoration;
use crate::host::Window;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    url: String,
    title: String,
    state: Value,
}

#[derive(Debug)]
struct HistoryData {
    entries: Vec<Entry>,
    index: usize,
    restoration: ScrollRestoration,
}

impl HistoryData {
    fn current(&self) -> Option<&Entry> {
        self.entries.get(self.index)
    }
}

/// History stack with `back`/`forward` traversal.
///
/// Traversal only moves the cursor; the embedder reports it to the router as
/// a popstate.
#[derive(Debug)]
pub struct MemoryHistory {
    data: RefCell<HistoryData>,
}

impl MemoryHistory {
    pub fn new(url: &str) -> Self {
        Self {
            data: RefCell::new(HistoryData {
                entries: vec![Entry {
                    url: url.to_owned(),
                    title: String::new(),
                    state: Value::Null,
                }],
                index: 0,
                restoration: ScrollRestoration::Auto,
            }),
        }
    }

    pub fn back(&self) -> bool {
        let mut data = self.data.borrow_mut();
        if data.index == 0 {
            return false;
        }
        data.index = data.index.saturating_sub(1);
        true
    }

    pub fn forward(&self) -> bool {
        let mut data = self.data.borrow_mut();
        if data.index.saturating_add(1) >= data.entries.len() {
            return false;
        }
        data.index = data.index.saturating_add(1);
        true
    }

    pub fn len(&self) -> usize {
        self.data.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().entries.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        self.data
            .borrow()
            .entries
            .iter()
            .map(|entry| entry.url.clone())
            .collect()
    }

    pub fn title(&self) -> String {
        self.data
            .borrow()
            .current()
            .map(|entry| entry.title.clone())
            .unwrap_or_default()
    }
}

impl History for MemoryHistory {
    fn location(&self) -> String {
        self.data
            .borrow()
            .current()
            .map(|entry| entry.url.clone())
            .unwrap_or_default()
    }

    fn state(&self) -> Value {
        self.data
            .borrow()
            .current()
            .map(|entry| entry.state.clone())
            .unwrap_or(Value::Null)
    }

    fn push_state(&self, state: Value, title: &str, url: &str) {
        let mut data = self.data.borrow_mut();
        let keep = data.index.saturating_add(1);
        data.entries.truncate(keep);
        data.entries.push(Entry {
            url: url.to_owned(),
            title: title.to_owned(),
            state,
        });
        data.index = data.entries.len().saturating_sub(1);
    }

    fn replace_state(&self, state: Value, title: &str, url: Option<&str>) {
        let mut data = self.data.borrow_mut();
        let index = data.index;
        if let Some(entry) = data.entries.get_mut(index) {
            entry.state = state;
            entry.title = title.to_owned();
            if let Some(url) = url {
                entry.url = url.to_owned();
            }
        }
    }

    fn scroll_restoration(&self) -> ScrollRestoration {
        self.data.borrow().restoration
    }

    fn set_scroll_restoration(&self, mode: ScrollRestoration) {
        self.data.borrow_mut().restoration = mode;
    }
}

#[derive(Debug, Default)]
struct WindowData {
    offset: Position,
    positions: HashMap<String, i64>,
    assignments: Vec<String>,
    reloads: usize,
}

/// Headless window.
///
/// Element positions are programmed per `id` (or `name`) as distances from
/// the top of the document; every resource settles with `load` at once.
#[derive(Debug, Default)]
pub struct MemoryWindow {
    data: RefCell<WindowData>,
}

impl MemoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, id: &str, top: i64) {
        self.data.borrow_mut().positions.insert(id.to_owned(), top);
    }

    pub fn assignments(&self) -> Vec<String> {
        self.data.borrow().assignments.clone()
    }

    pub fn reloads(&self) -> usize {
        self.data.borrow().reloads
    }
}

impl Window for MemoryWindow {
    fn page_offset(&self) -> Position {
        self.data.borrow().offset
    }

    fn scroll_to(&self, left: i64, top: i64) {
        self.data.borrow_mut().offset = Position {
            top: top.max(0),
            left: left.max(0),
        };
    }

    fn element_top(&self, document: &Document, node: NodeId) -> i64 {
        let data = self.data.borrow();
        let absolute = ["id", "name"]
            .iter()
            .filter_map(|attribute| document.attribute(node, attribute))
            .find_map(|key| data.positions.get(&key).copied())
            .unwrap_or(0);
        absolute.saturating_sub(data.offset.top)
    }

    fn assign(&self, url: &str) {
        self.data.borrow_mut().assignments.push(url.to_owned());
    }

    fn reload(&self) {
        let mut data = self.data.borrow_mut();
        data.reloads = data.reloads.saturating_add(1);
    }

    fn resource_settled(
        &self,
        _document: &Document,
        node: NodeId,
    ) -> LocalBoxFuture<'static, ResourceEvent> {
        let event = ResourceEvent {
            node,
            kind: ResourceEventKind::Load,
        };
        async move { event }.boxed_local()
    }
}

#[derive(Debug, Clone)]
struct Route {
    response: FetchResponse,
    delay: Duration,
}

/// Fetcher answering from a fixed table of URLs.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    routes: RefCell<HashMap<String, Route>>,
    requests: RefCell<Vec<FetchRequest>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: FetchResponse) {
        self.respond_after(url, response, Duration::ZERO);
    }

    /// Like [`Self::respond`], answering only after `delay`.
    pub fn respond_after(&self, url: &str, response: FetchResponse, delay: Duration) {
        self.routes
            .borrow_mut()
            .insert(url.to_owned(), Route { response, delay });
    }

    /// Serves `body` as a `200 OK` HTML document from `url`.
    pub fn html(&self, url: &str, body: &str) {
        self.respond(url, html_response(url, body));
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.borrow().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

/// `200 OK` response carrying an HTML body.
pub fn html_response(url: &str, body: &str) -> FetchResponse {
    FetchResponse {
        url: url.to_owned(),
        status: 200,
        status_text: "OK".to_owned(),
        headers: vec![(
            "Content-Type".to_owned(),
            "text/html; charset=utf-8".to_owned(),
        )],
        body: body.to_owned(),
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, PjaxResult<FetchResponse>> {
        let route = self.routes.borrow().get(&request.url).cloned();
        let url = request.url.clone();
        self.requests.borrow_mut().push(request);

        async move {
            let Some(route) = route else {
                return Err(PjaxError::new(
                    "net.memory.unreachable",
                    format!("no response registered for `{url}`"),
                ));
            };
            if !route.delay.is_zero() {
                tokio::time::sleep(route.delay).await;
            }
            Ok(route.response)
        }
        .boxed_local()
    }
}
