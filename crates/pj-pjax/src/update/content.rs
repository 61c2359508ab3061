//! Area separation and the content swap.

use crate::host::ResourceEvent;
use crate::host::Window;
use futures_util::future::LocalBoxFuture;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use pj_dom::split_top_level;

const RESOURCES: &str = "img, iframe, frame";

/// Elements selected by one selector of an area, in both documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaPair {
    pub src: Vec<NodeId>,
    pub dst: Vec<NodeId>,
}

/// Selectors of a comma-delimited area entry.
pub fn split(area: &str) -> Vec<&str> {
    split_top_level(area, b',')
        .into_iter()
        .map(str::trim)
        .filter(|selector| !selector.is_empty())
        .collect()
}

/// First area entry whose every selector selects the same, non-zero number
/// of elements in both documents.
pub fn separate(
    src: &Document,
    dst: &Document,
    areas: &[String],
) -> PjaxResult<Option<(String, Vec<AreaPair>)>> {
    'areas: for area in areas {
        let selectors = split(area);
        if selectors.is_empty() {
            continue;
        }
        let mut pairs = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let pair = AreaPair {
                src: src.query_selector_all(src.root(), selector)?,
                dst: dst.query_selector_all(dst.root(), selector)?,
            };
            if pair.src.is_empty() || pair.src.len() != pair.dst.len() {
                continue 'areas;
            }
            pairs.push(pair);
        }
        return Ok(Some((area.clone(), pairs)));
    }
    Ok(None)
}

/// Whether some area entry selects at least one element per selector in
/// `document`.
pub fn match_areas(document: &Document, areas: &[String]) -> PjaxResult<bool> {
    for area in areas {
        let selectors = split(area);
        if selectors.is_empty() {
            continue;
        }
        let mut matched = true;
        for selector in selectors {
            if document.query_selector(document.root(), selector)?.is_none() {
                matched = false;
                break;
            }
        }
        if matched {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Result of the swap: the inserted areas and the settlement of the
/// resources they carry.
pub struct Swapped {
    pub areas: Vec<NodeId>,
    pub waits: Vec<LocalBoxFuture<'static, ResourceEvent>>,
}

/// Replaces every destination area with an imported copy of its source.
///
/// Scripts of the copy are emptied while it is inserted and restored
/// afterwards, so nothing runs until the script phase.
pub fn content(
    src: &Document,
    dst: &Document,
    pairs: &[AreaPair],
    window: &dyn Window,
) -> PjaxResult<Swapped> {
    let mut swapped = Swapped {
        areas: Vec::new(),
        waits: Vec::new(),
    };
    for pair in pairs {
        for (&from, &to) in pair.src.iter().zip(&pair.dst) {
            let Some(clone) = dst.import_node(src, from) else {
                continue;
            };
            let escaped = dst
                .query_selector_all(clone, "script")?
                .into_iter()
                .map(|script| escape(dst, script))
                .collect::<Vec<_>>();
            dst.replace_with(to, clone);
            for script in escaped {
                script.restore(dst);
            }
            for resource in dst.query_selector_all(clone, RESOURCES)? {
                swapped.waits.push(window.resource_settled(dst, resource));
            }
            swapped.areas.push(clone);
        }
    }
    Ok(swapped)
}

struct Escaped {
    node: NodeId,
    src: Option<String>,
    code: String,
}

impl Escaped {
    fn restore(self, document: &Document) {
        document.set_text_content(self.node, &self.code);
        if let Some(src) = self.src {
            document.set_attribute(self.node, "src", &src);
        }
    }
}

fn escape(document: &Document, script: NodeId) -> Escaped {
    let escaped = Escaped {
        node: script,
        src: document.attribute(script, "src"),
        code: document.text_content(script),
    };
    document.remove_attribute(script, "src");
    document.set_text_content(script, "");
    escaped
}
