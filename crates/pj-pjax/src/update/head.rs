//! Head synchronisation.

use super::sync::pair;
use super::sync::sync;
use crate::config::selector_or_nothing;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;

const STYLESHEET: &str = r#"link[rel~="stylesheet"]"#;

/// Ignore selector of the head phase; stylesheet links are left to the
/// stylesheet phase whenever the head selector reaches links.
pub fn head_ignore(selector: &str, ignore: &str) -> String {
    if !selector.contains("link") {
        return ignore.to_owned();
    }
    if ignore.trim().is_empty() {
        STYLESHEET.to_owned()
    } else {
        format!("{ignore}, {STYLESHEET}")
    }
}

/// Elements under `scope` matching `selector` but not `ignore`.
pub(super) fn collect(
    document: &Document,
    scope: NodeId,
    selector: &str,
    ignore: &str,
) -> PjaxResult<Vec<NodeId>> {
    let ignore = selector_or_nothing(ignore);
    let mut kept = Vec::new();
    for node in document.query_selector_all(scope, selector_or_nothing(selector))? {
        if !document.matches(node, ignore)? {
            kept.push(node);
        }
    }
    Ok(kept)
}

/// Makes the elements of `dst`'s head selected by `selector` equal to those
/// of `src`, comparing by serialization.
pub fn head(src: &Document, dst: &Document, selector: &str, ignore: &str) -> PjaxResult<()> {
    let (Some(src_head), Some(dst_head)) = (src.head(), dst.head()) else {
        return Ok(());
    };
    let ignore = head_ignore(selector, ignore);
    let srcs = collect(src, src_head, selector, &ignore)?;
    let dsts = collect(dst, dst_head, selector, &ignore)?;
    let pairs = pair(&srcs, &dsts, |a, b| src.outer_html(a) == dst.outer_html(b));
    log::debug!(
        "head sync: {} source and {} live element(s)",
        srcs.len(),
        dsts.len()
    );
    sync(src, dst, &pairs, dst_head);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::head;
    use super::head_ignore;
    use crate::testing::parse;

    #[test]
    fn link_selectors_leave_stylesheets_alone() {
        assert_eq!(head_ignore("meta", "x"), "x");
        assert_eq!(
            head_ignore("base, meta, link", ""),
            r#"link[rel~="stylesheet"]"#
        );
        assert_eq!(
            head_ignore("link", "[data-keep]"),
            r#"[data-keep], link[rel~="stylesheet"]"#
        );
    }

    #[test]
    fn replaces_changed_head_elements() {
        let src = parse(
            concat!(
                r#"<head><meta name="description" content="B">"#,
                r#"<link rel="stylesheet" href="/b.css"><link rel="next" href="/c"></head>"#
            ),
            "https://example.test/b",
        );
        let dst = parse(
            concat!(
                r#"<head><meta name="description" content="A">"#,
                r#"<link rel="stylesheet" href="/a.css"><meta name="keep" data-pin></head>"#
            ),
            "https://example.test/a",
        );

        let result = head(&src, &dst, "base, meta, link", "[data-pin]");
        assert!(result.is_ok());

        let live = dst.head().map(|node| dst.inner_html(node)).unwrap_or_default();
        assert_eq!(
            live,
            concat!(
                r#"<link rel="stylesheet" href="/a.css"><meta name="keep" data-pin="">"#,
                r#"<meta name="description" content="B"><link rel="next" href="/c">"#
            )
        );
    }
}
