//! The interface router: supersession, session bookkeeping and fallback.

use crate::config::Config;
use crate::config::FallbackContext;
use crate::entity::RouterEntityState;
use crate::entity::ScriptSet;
use crate::event::EventSource;
use crate::event::RouterEvent;
use crate::event::RouterEventType;
use crate::events::PJAX_UNLOAD;
use crate::fetch::ResponseCache;
use crate::host::Host;
use crate::host::ScrollRestoration;
use crate::progress::Progressbar;
use crate::supervisor::Supervisor;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use pj_core::Cancellation;
use pj_core::ErrorLayer;
use pj_core::PjaxError;
use pj_dom::NodeId;
use pj_net::standardize;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

/// How a navigation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Completed,
    /// Superseded by a newer navigation.
    Canceled,
    /// Failed and handed to the fallback, which succeeded.
    FellBack(PjaxError),
    /// Failed, and the fallback failed too.
    Failed(PjaxError),
    /// Refused by configuration; the host performs its default action.
    Declined(PjaxError),
}

/// A navigation started by the embedder or an adapter.
pub type Navigation = LocalBoxFuture<'static, NavigationOutcome>;

/// What started a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub kind: RouterEventType,
    pub source: EventSource,
}

/// Page-wide state shared by every navigation of one live document.
#[derive(Clone)]
pub struct Session {
    pub scripts: ScriptSet,
    document_url: Rc<RefCell<String>>,
    supervisor: Supervisor,
    cache: ResponseCache,
    progress: Progressbar,
    anchor: Rc<Cell<Option<NodeId>>>,
    pub(crate) scrolling: Rc<Cell<bool>>,
}

impl Session {
    /// The session of the page `host` shows.
    ///
    /// The first call seeds the script set from the live document and binds
    /// the session listeners to `host.events`; later calls on the same host,
    /// or any clone of it, return that session.
    pub fn new(host: &Host) -> Self {
        host.session.get_or_init(|| Self::install(host)).clone()
    }

    fn install(host: &Host) -> Self {
        let document = &host.document;
        let scripts = ScriptSet::new();
        let base = document.url();
        for script in document
            .query_selector_all(document.root(), "script[src]")
            .unwrap_or_default()
        {
            let src = document.attribute(script, "src").unwrap_or_default();
            match standardize(&src, &base) {
                Ok(url) => {
                    scripts.insert(url);
                }
                Err(error) => log::debug!("ignoring script `{src}`: {error}"),
            }
        }

        let history = Rc::clone(&host.history);
        host.events.on(PJAX_UNLOAD, move |_| {
            history.set_scroll_restoration(ScrollRestoration::Auto);
        });

        let session = Self {
            scripts,
            document_url: Rc::new(RefCell::new(String::new())),
            supervisor: Supervisor::new(),
            cache: ResponseCache::new(),
            progress: Progressbar::install(document, &host.events),
            anchor: Rc::new(Cell::new(None)),
            scrolling: Rc::new(Cell::new(false)),
        };
        session.sync_document_url(host);
        session
    }

    /// Canonical URL of the page the live document shows.
    pub fn document_url(&self) -> String {
        self.document_url.borrow().clone()
    }

    pub fn sync_document_url(&self, host: &Host) {
        let location = host.history.location();
        let url = standardize(&location, &location).unwrap_or(location);
        *self.document_url.borrow_mut() = url;
    }

    pub fn is_navigating(&self) -> bool {
        self.supervisor.is_running()
    }

    pub fn progressbar(&self) -> &Progressbar {
        &self.progress
    }

    /// A detached link to `href`, reused by every programmatic navigation.
    pub(crate) fn anchor(&self, host: &Host, href: &str) -> NodeId {
        let node = match self.anchor.get() {
            Some(node) => node,
            None => {
                let node = host.document.create_element("a");
                self.anchor.set(Some(node));
                node
            }
        };
        host.document.set_attribute(node, "href", href);
        node
    }

    /// Aborts the running navigation, if any.
    pub fn abort(&self) {
        self.supervisor.cast(abort());
    }
}

fn abort() -> PjaxError {
    PjaxError::new("interface.navigation.abort", "Abort.")
}

/// Starts a navigation for `trigger`, superseding the running one.
///
/// The previous navigation is cancelled before this function returns; the
/// returned future drives the new one to its outcome.
pub fn route(config: Rc<Config>, trigger: Trigger, session: &Session, host: &Host) -> Navigation {
    let cancellation = Cancellation::new();
    session.supervisor.cast(abort());
    let token = cancellation.clone();
    let slot = session.supervisor.register(move |reason| {
        token.cancel(reason);
    });
    host.history
        .set_scroll_restoration(ScrollRestoration::Manual);
    session.progress.set_style(&config.progressbar);

    let event = RouterEvent::new(
        trigger.kind,
        trigger.source,
        &host.document,
        &host.history.location(),
    );
    let state = RouterEntityState {
        scripts: session.scripts.clone(),
        cancellation: cancellation.clone(),
    };
    let session = session.clone();
    let host = host.clone();
    async move {
        let result = match event {
            Ok(event) => {
                crate::route::route(&config, event, state, &host, &session.cache).await
            }
            Err(error) => Err(error),
        };
        match result.and_then(|outcome| cancellation.either(outcome)) {
            Ok(outcome) => {
                for script in &outcome.scripts {
                    if let Some(src) = &script.src {
                        session.scripts.insert(src.clone());
                    }
                }
                session.supervisor.terminate(slot);
                session.sync_document_url(&host);
                log::info!("navigated to {}", session.document_url());
                if let Err(error) = outcome.load.await {
                    log::warn!("load hook failed: {error}");
                }
                NavigationOutcome::Completed
            }
            Err(error) if cancellation.is_canceled() => {
                log::debug!("navigation canceled: {error}");
                session.supervisor.terminate(slot);
                NavigationOutcome::Canceled
            }
            Err(error) => {
                session.supervisor.terminate(slot);
                host.history
                    .set_scroll_restoration(ScrollRestoration::Auto);
                session.sync_document_url(&host);
                match error.layer() {
                    ErrorLayer::Interface | ErrorLayer::Application => {
                        log::debug!("navigation declined: {error}");
                        return NavigationOutcome::Declined(error);
                    }
                    ErrorLayer::Domain | ErrorLayer::Runtime => {
                        log::warn!("navigation failed, falling back: {error}");
                    }
                }
                let context = FallbackContext {
                    document: &host.document,
                    window: host.window.as_ref(),
                    target: trigger.source,
                    reason: &error,
                };
                match (config.fallback)(&context) {
                    Ok(()) => NavigationOutcome::FellBack(error),
                    Err(error) => NavigationOutcome::Failed(error),
                }
            }
        }
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::NavigationOutcome;
    use super::Session;
    use super::Trigger;
    use super::route;
    use crate::config::Config;
    use crate::event::EventSource;
    use crate::event::RouterEventType;
    use crate::host::History;
    use crate::host::ScrollRestoration;
    use crate::memory::html_response;
    use crate::testing::TestHost;
    use std::rc::Rc;

    const PAGE: &str = "https://example.test/a";

    #[test]
    fn sessions_start_from_the_live_page() {
        let test = TestHost::new(
            PAGE,
            r#"<head><script src="x.js"></script></head><body><script>inline()</script></body>"#,
        );
        let session = Session::new(&test.host);
        assert_eq!(session.scripts.to_vec(), vec!["https://example.test/x.js".to_owned()]);
        assert_eq!(session.document_url(), PAGE);
        assert!(!session.is_navigating());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failures_fall_back_to_native_navigation() {
        let test = TestHost::new(PAGE, "<body><main>1</main><a href=\"/b\">b</a></body>");
        let mut json = html_response("https://example.test/b", "{}");
        json.headers = vec![("Content-Type".to_owned(), "application/json".to_owned())];
        test.fetcher.respond("https://example.test/b", json);
        let session = Session::new(&test.host);
        let anchor = match test.document().query_selector(test.document().root(), "a") {
            Ok(Some(node)) => node,
            _ => panic!("anchor missing"),
        };

        let navigation = route(
            Rc::new(Config::default()),
            Trigger {
                kind: RouterEventType::Click,
                source: EventSource::Element(anchor),
            },
            &session,
            &test.host,
        );
        assert!(session.is_navigating());
        assert_eq!(test.history.scroll_restoration(), ScrollRestoration::Manual);

        let outcome = navigation.await;
        assert!(matches!(outcome, NavigationOutcome::FellBack(_)));
        assert_eq!(test.window.assignments(), vec!["https://example.test/b".to_owned()]);
        assert_eq!(test.history.scroll_restoration(), ScrollRestoration::Auto);
        assert!(!session.is_navigating());
    }
}
