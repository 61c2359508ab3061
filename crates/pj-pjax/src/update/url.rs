//! History entry update.

use crate::config::selector_or_nothing;
use crate::event::EventSource;
use crate::event::RouterEventLocation;
use crate::event::RouterEventType;
use crate::host::History;
use pj_dom::Document;

/// Whether the navigation replaces the current entry instead of pushing.
fn replaceable(
    kind: RouterEventType,
    source: EventSource,
    document: &Document,
    selector: &str,
) -> bool {
    match (kind, source) {
        (RouterEventType::Popstate, _) | (_, EventSource::Window) => false,
        (_, EventSource::Element(node)) => document
            .matches(node, selector_or_nothing(selector))
            .unwrap_or(false),
    }
}

/// Pushes or replaces the history entry for `location.dest`, then points
/// the live document at the current entry.
pub fn url(
    history: &dyn History,
    document: &Document,
    location: &RouterEventLocation,
    title: &str,
    kind: RouterEventType,
    source: EventSource,
    replace: &str,
) {
    let dest = location.dest.href();
    if replaceable(kind, source, document, replace) {
        log::debug!("replacing history entry with {dest}");
        history.replace_state(history.state(), title, Some(dest));
    } else if kind != RouterEventType::Popstate && location.orig.href() != dest {
        log::debug!("pushing history entry {dest}");
        history.push_state(serde_json::Value::Null, title, dest);
    }
    document.set_url(&history.location());
}
