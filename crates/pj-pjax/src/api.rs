//! Public entry point.

use crate::config::Config;
use crate::config::Options;
use crate::event::EventSource;
use crate::event::RouterEventType;
use crate::host::Host;
use crate::interface::Navigation;
use crate::interface::Session;
use crate::interface::Trigger;
use crate::interface::route;
use crate::store;
use crate::view;
use crate::view::Modifiers;
use futures_util::future::LocalBoxFuture;
use pj_dom::NodeId;
use std::rc::Rc;

/// PJAX bound to one live document.
///
/// The embedder forwards click, submit, popstate and scroll events to the
/// `on_*` methods. A returned [`Navigation`] means the event was taken over
/// and its default action must be prevented; drive the future to completion
/// on the current thread.
pub struct Pjax {
    config: Rc<Config>,
    session: Session,
    host: Host,
}

impl Pjax {
    pub fn new(options: &Options, host: Host) -> Self {
        store::ensure_state(&host);
        store::save_title(&host);
        store::save_position(&host);
        let session = Session::new(&host);
        log::debug!("pjax installed on {}", session.document_url());
        Self {
            config: Rc::new(Config::new(options)),
            session,
            host,
        }
    }

    pub fn on_click(&self, target: NodeId, modifiers: Modifiers) -> Option<Navigation> {
        view::click(&self.config, &self.session, &self.host, target, modifiers)
    }

    pub fn on_submit(&self, target: NodeId) -> Option<Navigation> {
        view::submit(&self.config, &self.session, &self.host, target)
    }

    pub fn on_popstate(&self) -> Option<Navigation> {
        view::popstate(&self.config, &self.session, &self.host)
    }

    pub fn on_scroll(&self) -> Option<LocalBoxFuture<'static, ()>> {
        view::scroll(&self.session, &self.host)
    }

    /// Navigates to `url` as if a link to it was clicked.
    pub fn assign(&self, url: &str) -> Navigation {
        navigate(Rc::clone(&self.config), url, &self.host, &self.session)
    }

    /// Like [`Self::assign`], replacing the current history entry.
    pub fn replace(&self, url: &str) -> Navigation {
        let config = self.config.merge(&replacing());
        navigate(Rc::new(config), url, &self.host, &self.session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Canonical URL of the page the live document shows.
    pub fn document_url(&self) -> String {
        self.session.document_url()
    }

    /// Canonical URLs of the external scripts evaluated on this page.
    pub fn scripts(&self) -> Vec<String> {
        self.session.scripts.to_vec()
    }
}

/// Navigates to `url` with `options`, outside any [`Pjax`] instance.
pub fn assign(url: &str, options: &Options, host: &Host, session: &Session) -> Navigation {
    navigate(Rc::new(Config::new(options)), url, host, session)
}

/// Like [`assign`], replacing the current history entry.
pub fn replace(url: &str, options: &Options, host: &Host, session: &Session) -> Navigation {
    let config = Config::new(options).merge(&replacing());
    navigate(Rc::new(config), url, host, session)
}

fn replacing() -> Options {
    Options {
        replace: Some("*".to_owned()),
        ..Options::default()
    }
}

fn navigate(config: Rc<Config>, url: &str, host: &Host, session: &Session) -> Navigation {
    let anchor = session.anchor(host, url);
    route(
        config,
        Trigger {
            kind: RouterEventType::Click,
            source: EventSource::Element(anchor),
        },
        session,
        host,
    )
}
