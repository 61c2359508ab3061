//! Stylesheet synchronisation for `<head>` and `<body>`.

use super::head::collect;
use super::sync::pair;
use super::sync::sync;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use pj_net::standardize;

const STYLESHEETS: &str = r#"link[rel~="stylesheet"], style"#;

/// Syncs stylesheets of the heads, then of the bodies.
pub fn css(src: &Document, dst: &Document, ignore: &str) -> PjaxResult<()> {
    for (src_scope, dst_scope) in [(src.head(), dst.head()), (src.body(), dst.body())] {
        if let (Some(src_scope), Some(dst_scope)) = (src_scope, dst_scope) {
            scope(src, src_scope, dst, dst_scope, ignore)?;
        }
    }
    Ok(())
}

fn scope(
    src: &Document,
    src_scope: NodeId,
    dst: &Document,
    dst_scope: NodeId,
    ignore: &str,
) -> PjaxResult<()> {
    let srcs = collect(src, src_scope, STYLESHEETS, ignore)?;
    let dsts = collect(dst, dst_scope, STYLESHEETS, ignore)?;
    let pairs = pair(&srcs, &dsts, |a, b| same_stylesheet(src, a, dst, b));
    sync(src, dst, &pairs, dst_scope);
    Ok(())
}

fn same_stylesheet(src: &Document, a: NodeId, dst: &Document, b: NodeId) -> bool {
    let tag = src.tag_name(a);
    if tag != dst.tag_name(b) {
        return false;
    }
    match tag.as_deref() {
        Some("link") => match (href(src, a), href(dst, b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        Some("style") => src.inner_html(a).trim() == dst.inner_html(b).trim(),
        _ => false,
    }
}

fn href(document: &Document, link: NodeId) -> Option<String> {
    let href = document.attribute(link, "href")?;
    standardize(&href, &document.url()).ok()
}
