//! Sequence diff used by the head and stylesheet phases.

use pj_dom::Document;
use pj_dom::NodeId;

/// Source elements to insert before a destination element, or at the end of
/// the fallback parent when there is none.
pub type Pair = (Vec<NodeId>, Option<NodeId>);

/// Greedy left-to-right pairing of `srcs` with compatible `dsts`.
///
/// Sources without a partner accumulate under the `None` key and move in
/// front of the next matched destination. Destinations that never matched
/// are appended with no sources, which removes them.
pub fn pair(
    srcs: &[NodeId],
    dsts: &[NodeId],
    compare: impl Fn(NodeId, NodeId) -> bool,
) -> Vec<Pair> {
    let mut link = Link::default();
    for &src in srcs {
        let partner = dsts
            .iter()
            .copied()
            .find(|&dst| !link.has(Some(dst)) && compare(src, dst));
        match partner {
            Some(dst) => {
                let mut pending = link.take(None);
                pending.push(src);
                link.set(Some(dst), pending);
            }
            None => {
                let mut pending = link.take(None);
                pending.push(src);
                link.set(None, pending);
            }
        }
    }
    for &dst in dsts {
        if !link.has(Some(dst)) {
            link.set(Some(dst), Vec::new());
        }
    }
    link.entries
        .into_iter()
        .map(|(dst, srcs)| (srcs, dst))
        .collect()
}

/// Insertion-ordered map keyed by destination.
#[derive(Default)]
struct Link {
    entries: Vec<(Option<NodeId>, Vec<NodeId>)>,
}

impl Link {
    fn has(&self, key: Option<NodeId>) -> bool {
        self.entries.iter().any(|(dst, _)| *dst == key)
    }

    /// Removes `key`; a later `set` appends it at the end.
    fn take(&mut self, key: Option<NodeId>) -> Vec<NodeId> {
        match self.entries.iter().position(|(dst, _)| *dst == key) {
            Some(index) => self.entries.remove(index).1,
            None => Vec::new(),
        }
    }

    fn set(&mut self, key: Option<NodeId>, srcs: Vec<NodeId>) {
        match self.entries.iter_mut().find(|(dst, _)| *dst == key) {
            Some(entry) => entry.1 = srcs,
            None => self.entries.push((key, srcs)),
        }
    }
}

/// Applies `pairs` from `src` into `dst`.
///
/// When the last source of a pair serializes like its destination, only the
/// sources before it are inserted; the destination stays in place.
pub fn sync(src: &Document, dst: &Document, pairs: &[Pair], fallback: NodeId) {
    for (srcs, target) in pairs {
        let unchanged = match (srcs.last(), target) {
            (Some(last), Some(target)) => src.outer_html(*last) == dst.outer_html(*target),
            _ => false,
        };
        let inserted = if unchanged {
            &srcs[..srcs.len().saturating_sub(1)]
        } else {
            &srcs[..]
        };
        let parent = target
            .and_then(|target| dst.parent_element(target))
            .unwrap_or(fallback);
        for &node in inserted {
            if let Some(clone) = dst.import_node(src, node) {
                dst.insert_before(parent, clone, *target);
            }
        }
        if let (Some(target), true) = (target, srcs.is_empty()) {
            dst.remove(*target);
        }
    }
}
