//! Seams to the embedding environment.
//!
//! The pipeline never touches a real browser: history, viewport, transport
//! and script evaluation are reached through the traits below, and
//! [`crate::memory`] provides in-memory implementations of the first two.

use crate::events::EventBus;
use crate::interface::Session;
use futures_util::future::LocalBoxFuture;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use pj_js::ScriptHost;
use pj_net::HttpMethod;
use serde_json::Value;
use std::cell::OnceCell;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRestoration {
    Auto,
    Manual,
}

/// Viewport offsets, as `window.pageXOffset` and `window.pageYOffset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub top: i64,
    pub left: i64,
}

/// Session history of the live document.
pub trait History {
    /// Absolute URL of the current entry.
    fn location(&self) -> String;
    fn state(&self) -> Value;
    fn push_state(&self, state: Value, title: &str, url: &str);
    /// Replaces the current entry; `None` keeps its URL.
    fn replace_state(&self, state: Value, title: &str, url: Option<&str>);
    fn scroll_restoration(&self) -> ScrollRestoration;
    fn set_scroll_restoration(&self, mode: ScrollRestoration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEventKind {
    Load,
    Abort,
    Error,
}

/// Settlement of an `img`, `iframe` or `frame` inserted by a content swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEvent {
    pub node: NodeId,
    pub kind: ResourceEventKind,
}

/// Viewport and top-level navigation of the live document.
pub trait Window {
    fn page_offset(&self) -> Position;
    fn scroll_to(&self, left: i64, top: i64);
    /// `getBoundingClientRect().top` of `node`.
    fn element_top(&self, document: &Document, node: NodeId) -> i64;
    fn assign(&self, url: &str);
    fn reload(&self);
    /// Resolves once `node` fires `load`, `abort` or `error`.
    fn resource_settled(&self, document: &Document, node: NodeId)
    -> LocalBoxFuture<'static, ResourceEvent>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `application/x-www-form-urlencoded` body of a POST.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Final URL after redirects; empty when the transport cannot tell.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Asynchronous HTTP transport.
///
/// Errors mean the request never produced a response. Aborts and timeouts
/// are applied by the caller, which drops the returned future.
pub trait Fetcher {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, PjaxResult<FetchResponse>>;
}

/// Everything a navigation needs from its environment.
#[derive(Clone)]
pub struct Host {
    pub document: Document,
    pub history: Rc<dyn History>,
    pub window: Rc<dyn Window>,
    pub fetcher: Rc<dyn Fetcher>,
    pub scripts: Rc<RefCell<dyn ScriptHost>>,
    pub events: EventBus,
    /// Shared by every clone; see [`Session::new`].
    pub(crate) session: Rc<OnceCell<Session>>,
}

impl Host {
    pub fn new(
        document: Document,
        history: Rc<dyn History>,
        window: Rc<dyn Window>,
        fetcher: Rc<dyn Fetcher>,
        scripts: Rc<RefCell<dyn ScriptHost>>,
        events: EventBus,
    ) -> Self {
        Self {
            document,
            history,
            window,
            fetcher,
            scripts,
            events,
            session: Rc::new(OnceCell::new()),
        }
    }
}
