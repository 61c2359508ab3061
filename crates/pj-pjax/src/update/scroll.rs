//! Scroll policy after a swap.

use crate::event::RouterEventType;
use crate::host::Position;
use crate::host::Window;
use pj_dom::Document;

/// Scrolls the window for a navigation of `kind` towards `fragment`.
///
/// `saved` is the position stored in the history entry being restored.
pub fn scroll(
    kind: RouterEventType,
    document: &Document,
    window: &dyn Window,
    fragment: &str,
    saved: Option<Position>,
) {
    match kind {
        RouterEventType::Click => {
            if !hash(document, window, fragment) {
                scroll_to(window, Position::default());
            }
        }
        RouterEventType::Submit => scroll_to(window, Position::default()),
        RouterEventType::Popstate => scroll_to(window, saved.unwrap_or_default()),
    }
}

/// Scrolls to the element named by the last `#` segment of `fragment`.
/// Returns whether such an element exists.
pub fn hash(document: &Document, window: &dyn Window, fragment: &str) -> bool {
    let name = fragment.rsplit('#').next().unwrap_or_default();
    if name.is_empty() {
        return false;
    }
    let selector = format!("#{name}, [name=\"{name}\"]");
    let target = match document.query_selector(document.root(), &selector) {
        Ok(Some(target)) => target,
        Ok(None) => return false,
        Err(error) => {
            log::debug!("fragment `{name}` is not addressable: {error}");
            return false;
        }
    };
    let offset = window.page_offset();
    let top = offset
        .top
        .saturating_add(window.element_top(document, target));
    window.scroll_to(offset.left, top);
    true
}

/// Negative coordinates keep the current offset on that axis.
fn scroll_to(window: &dyn Window, position: Position) {
    let offset = window.page_offset();
    let left = if position.left >= 0 {
        position.left
    } else {
        offset.left
    };
    let top = if position.top >= 0 {
        position.top
    } else {
        offset.top
    };
    window.scroll_to(left, top);
}
