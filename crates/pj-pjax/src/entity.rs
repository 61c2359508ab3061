//! The ticket handed through one navigation.

use crate::config::Config;
use crate::event::RouterEvent;
use pj_core::Cancellation;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Canonical URLs of external scripts evaluated in the live document.
///
/// Shared by every navigation of a page; entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct ScriptSet {
    urls: Rc<RefCell<BTreeSet<String>>>,
}

impl ScriptSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.borrow().contains(url)
    }

    pub fn insert(&self, url: String) -> bool {
        self.urls.borrow_mut().insert(url)
    }

    pub fn len(&self) -> usize {
        self.urls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.urls.borrow().iter().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct RouterEntityState {
    pub scripts: ScriptSet,
    pub cancellation: Cancellation,
}

#[derive(Clone)]
pub struct RouterEntity {
    pub config: Rc<Config>,
    pub event: RouterEvent,
    pub state: RouterEntityState,
}

#[cfg(test)]
mod tests {
    use super::ScriptSet;

    #[test]
    fn clones_share_one_set() {
        let scripts = ScriptSet::new();
        let shared = scripts.clone();
        assert!(shared.insert("https://example.test/x.js".to_owned()));
        assert!(!scripts.insert("https://example.test/x.js".to_owned()));
        assert!(scripts.contains("https://example.test/x.js"));
        assert_eq!(scripts.len(), 1);
    }
}
