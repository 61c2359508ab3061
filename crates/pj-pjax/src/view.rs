//! Event source adapters.
//!
//! Each adapter decides whether a host event becomes a navigation. `None`
//! means the adapter declined and the host should perform its default
//! action.

use crate::config::Config;
use crate::event::EventSource;
use crate::event::RouterEventType;
use crate::event::form_action;
use crate::host::Host;
use crate::interface::Navigation;
use crate::interface::Session;
use crate::interface::Trigger;
use crate::interface::route;
use crate::scope::scope;
use crate::store;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use pj_dom::NodeId;
use pj_net::UrlParts;
use pj_net::standardize;
use std::rc::Rc;
use std::time::Duration;

const SCROLL_DEBOUNCE: Duration = Duration::from_millis(300);

/// Mouse button and modifier keys of a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// `event.which`; `0` or `1` for the primary button.
    pub which: u16,
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(self) -> bool {
        self.which > 1 || self.meta || self.ctrl || self.shift || self.alt
    }
}

fn parts(url: &str) -> Option<UrlParts> {
    UrlParts::parse(url).ok()
}

fn is_accessible(orig: &UrlParts, dest: &UrlParts) -> bool {
    orig.domain() == dest.domain()
}

fn is_hash_change(orig: &UrlParts, dest: &UrlParts) -> bool {
    orig.domain() == dest.domain()
        && orig.path() == dest.path()
        && orig.fragment() != dest.fragment()
}

/// Leaves navigations outside a shared, enabled scope to the host.
fn is_in_scope(config: &Config, session: &Session, orig: &UrlParts, dest: &UrlParts) -> bool {
    if scope(config, orig.pathname(), dest.pathname()).is_some() {
        return true;
    }
    session.abort();
    false
}

/// Routes a click on `target` through the nearest link.
pub fn click(
    config: &Rc<Config>,
    session: &Session,
    host: &Host,
    target: NodeId,
    modifiers: Modifiers,
) -> Option<Navigation> {
    let document = &host.document;
    let link = document.closest(target, &config.link).ok().flatten()?;
    let navigation = match document.tag_name(link).as_deref() {
        Some("a" | "area") => {
            let href = document.attribute(link, "href").unwrap_or_default();
            let dest = standardize(&href, &document.url()).ok().and_then(|url| parts(&url));
            let orig = parts(&session.document_url());
            match (orig, dest) {
                (Some(orig), Some(dest))
                    if is_accessible(&orig, &dest)
                        && !is_hash_change(&orig, &dest)
                        && !modifiers.any()
                        && (config.filter)(document, link)
                        && is_in_scope(config, session, &orig, &dest) =>
                {
                    Some(trigger(config, session, host, RouterEventType::Click, link))
                }
                _ => None,
            }
        }
        _ => None,
    };
    if navigation.is_none() {
        session.sync_document_url(host);
    }
    navigation
}

/// Routes a submission of the form enclosing `target`.
pub fn submit(
    config: &Rc<Config>,
    session: &Session,
    host: &Host,
    target: NodeId,
) -> Option<Navigation> {
    let document = &host.document;
    let form = document.closest(target, &config.form).ok().flatten()?;
    let dest = form_action(document, form)
        .ok()
        .and_then(|action| standardize(&action, &document.url()).ok())
        .and_then(|url| parts(&url));
    let orig = parts(&session.document_url());
    let navigation = match (orig, dest) {
        (Some(orig), Some(dest))
            if is_accessible(&orig, &dest) && is_in_scope(config, session, &orig, &dest) =>
        {
            Some(trigger(config, session, host, RouterEventType::Submit, form))
        }
        _ => None,
    };
    if navigation.is_none() {
        session.sync_document_url(host);
    }
    navigation
}

/// Routes a history traversal to the current location.
pub fn popstate(config: &Rc<Config>, session: &Session, host: &Host) -> Option<Navigation> {
    let location = host.history.location();
    let location = standardize(&location, &location).unwrap_or(location);
    let document_url = session.document_url();
    if location == document_url {
        return None;
    }
    let routable = match (parts(&document_url), parts(&location)) {
        (Some(orig), Some(dest)) => {
            is_accessible(&orig, &dest)
                && !is_hash_change(&orig, &dest)
                && is_in_scope(config, session, &orig, &dest)
        }
        _ => false,
    };
    if !routable {
        session.sync_document_url(host);
        return None;
    }
    let title = store::load_title(host);
    if !title.is_empty() {
        host.document.set_title(&title);
    }
    Some(route(
        Rc::clone(config),
        Trigger {
            kind: RouterEventType::Popstate,
            source: EventSource::Window,
        },
        session,
        host,
    ))
}

/// Saves the scroll position once scrolling has been idle for a while.
///
/// Returns the pending save, or `None` while one is already scheduled.
pub fn scroll(session: &Session, host: &Host) -> Option<LocalBoxFuture<'static, ()>> {
    if session.scrolling.replace(true) {
        return None;
    }
    let session = session.clone();
    let host = host.clone();
    Some(
        async move {
            tokio::time::sleep(SCROLL_DEBOUNCE).await;
            session.scrolling.set(false);
            let location = host.history.location();
            let location = standardize(&location, &location).unwrap_or(location);
            if location == session.document_url() {
                store::save_position(&host);
            }
        }
        .boxed_local(),
    )
}

fn trigger(
    config: &Rc<Config>,
    session: &Session,
    host: &Host,
    kind: RouterEventType,
    node: NodeId,
) -> Navigation {
    route(
        Rc::clone(config),
        Trigger {
            kind,
            source: EventSource::Element(node),
        },
        session,
        host,
    )
}

#[cfg(test)]
mod tests {
    use super::Modifiers;
    use super::click;
    use super::popstate;
    use super::scroll;
    use super::submit;
    use crate::config::Config;
    use crate::config::Options;
    use crate::config::ScopeTable;
    use crate::host::History;
    use crate::host::Position;
    use crate::host::Window;
    use crate::interface::NavigationOutcome;
    use crate::interface::Session;
    use crate::store;
    use crate::testing::TestHost;
    use pj_dom::NodeId;
    use serde_json::Value;
    use std::rc::Rc;

    const PAGE: &str = "https://example.test/a";

    fn node(test: &TestHost, selector: &str) -> NodeId {
        match test.document().query_selector(test.document().root(), selector) {
            Ok(Some(node)) => node,
            Ok(None) => panic!("`{selector}` missing"),
            Err(error) => panic!("{error}"),
        }
    }

    fn links() -> TestHost {
        TestHost::new(
            PAGE,
            concat!(
                "<body><main>",
                "<a id=\"same\" href=\"/b\"><span>b</span></a>",
                "<a id=\"other\" href=\"https://other.test/b\">o</a>",
                "<a id=\"hash\" href=\"#top\">t</a>",
                "<a id=\"blank\" href=\"/b\" target=\"_blank\">n</a>",
                "<p id=\"text\">x</p>",
                "</main></body>"
            ),
        )
    }

    #[test]
    fn clicks_route_through_the_enclosing_link() {
        let test = links();
        let session = Session::new(&test.host);
        let config = Rc::new(Config::default());

        let span = node(&test, "#same span");
        assert!(click(&config, &session, &test.host, span, Modifiers::default()).is_some());
        assert!(session.is_navigating());
    }

    #[test]
    fn clicks_decline_what_the_browser_should_handle() {
        let test = links();
        let session = Session::new(&test.host);
        let config = Rc::new(Config::default());
        let plain = Modifiers::default();

        for selector in ["#other", "#hash", "#blank", "#text"] {
            let target = node(&test, selector);
            assert!(
                click(&config, &session, &test.host, target, plain).is_none(),
                "{selector}"
            );
        }
        let same = node(&test, "#same");
        let modified = [
            Modifiers { which: 2, ..plain },
            Modifiers { meta: true, ..plain },
            Modifiers { ctrl: true, ..plain },
            Modifiers { shift: true, ..plain },
            Modifiers { alt: true, ..plain },
        ];
        for modifiers in modified {
            assert!(click(&config, &session, &test.host, same, modifiers).is_none());
        }
        assert!(!session.is_navigating());
        assert!(test.fetcher.requests().is_empty());
    }

    #[test]
    fn submits_require_a_same_domain_action() {
        let test = TestHost::new(
            PAGE,
            concat!(
                "<body><form id=\"local\" action=\"/s\"><input name=\"q\"></form>",
                "<form id=\"remote\" action=\"https://other.test/s\"><input name=\"q\"></form>",
                "</body>"
            ),
        );
        let session = Session::new(&test.host);
        let config = Rc::new(Config::default());

        let remote = node(&test, "#remote input");
        assert!(submit(&config, &session, &test.host, remote).is_none());
        let local = node(&test, "#local input");
        assert!(submit(&config, &session, &test.host, local).is_some());
    }

    #[test]
    fn popstate_ignores_the_current_page_and_hash_moves() {
        let test = links();
        let session = Session::new(&test.host);
        let config = Rc::new(Config::default());

        assert!(popstate(&config, &session, &test.host).is_none());
        test.history
            .push_state(Value::Null, "", "https://example.test/a#top");
        assert!(popstate(&config, &session, &test.host).is_none());
        test.history
            .push_state(Value::Null, "", "https://example.test/b");
        assert!(popstate(&config, &session, &test.host).is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_scopes_are_declined_and_abort_the_running_navigation() {
        let test = TestHost::new(
            PAGE,
            concat!(
                "<body><main>",
                "<a id=\"admin\" href=\"/admin/x\">x</a>",
                "<a id=\"same\" href=\"/b\">b</a>",
                "<form action=\"/admin/s\"><input name=\"q\"></form>",
                "</main></body>"
            ),
        );
        test.fetcher
            .html("https://example.test/b", "<body><main>b</main></body>");
        let session = Session::new(&test.host);
        let mut scope = ScopeTable::new();
        scope.insert("/admin/".to_owned(), None);
        let config = Rc::new(Config::new(&Options {
            scope: Some(scope),
            ..Options::default()
        }));
        let plain = Modifiers::default();

        assert!(submit(&config, &session, &test.host, node(&test, "input")).is_none());
        test.history
            .push_state(Value::Null, "", "https://example.test/admin/y");
        assert!(popstate(&config, &session, &test.host).is_none());
        assert!(test.history.back());
        session.sync_document_url(&test.host);

        let running = match click(&config, &session, &test.host, node(&test, "#same"), plain) {
            Some(navigation) => navigation,
            None => panic!("click declined"),
        };
        assert!(click(&config, &session, &test.host, node(&test, "#admin"), plain).is_none());
        assert_eq!(running.await, NavigationOutcome::Canceled);
        assert_eq!(test.fetcher.requested_urls().len(), 0);
    }

    #[test]
    fn popstate_restores_the_saved_title() {
        let test = TestHost::new(PAGE, "<title>A</title><body><main></main></body>");
        let session = Session::new(&test.host);
        let config = Rc::new(Config::default());
        test.history.push_state(
            serde_json::json!({ "title": "B" }),
            "B",
            "https://example.test/b",
        );

        assert!(popstate(&config, &session, &test.host).is_some());
        assert_eq!(test.document().title(), "B");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn scrolling_saves_the_position_once_idle() {
        let test = links();
        let session = Session::new(&test.host);
        store::ensure_state(&test.host);
        test.window.scroll_to(0, 120);

        let pending = scroll(&session, &test.host);
        assert!(pending.is_some());
        assert!(scroll(&session, &test.host).is_none());
        assert_eq!(store::saved_position(&test.host), None);
        if let Some(pending) = pending {
            pending.await;
        }
        assert_eq!(
            store::saved_position(&test.host),
            Some(Position { top: 120, left: 0 })
        );
        assert!(scroll(&session, &test.host).is_some());
    }
}
