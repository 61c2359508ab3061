//! Focus handling around the content swap.

use pj_dom::Document;

/// Moves focus from whatever holds it back to `<body>`.
pub fn blur(document: &Document) {
    let body = document.body();
    let Some(active) = document.active_element() else {
        return;
    };
    if Some(active) == body {
        return;
    }
    document.blur(active);
    if let Some(body) = body {
        document.focus(body);
    }
}

/// Focuses the last `[autofocus]` element, or `<body>` when there is none.
pub fn focus(document: &Document) {
    let candidates = document
        .query_selector_all(document.root(), "body, [autofocus]")
        .unwrap_or_default();
    let Some(&target) = candidates.last() else {
        return;
    };
    if document.active_element() != Some(target) {
        document.focus(target);
    }
}
