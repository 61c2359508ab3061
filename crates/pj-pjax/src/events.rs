//! Lifecycle and element events raised by the pipeline.

use pj_dom::NodeId;
use std::cell::RefCell;
use std::rc::Rc;

pub const PJAX_FETCH: &str = "pjax:fetch";
pub const PJAX_UNLOAD: &str = "pjax:unload";
pub const PJAX_CONTENT: &str = "pjax:content";
pub const PJAX_READY: &str = "pjax:ready";
pub const PJAX_LOAD: &str = "pjax:load";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Window,
    Document,
    Element(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomEvent {
    pub name: &'static str,
    pub target: EventTarget,
}

impl DomEvent {
    pub fn window(name: &'static str) -> Self {
        Self {
            name,
            target: EventTarget::Window,
        }
    }

    pub fn document(name: &'static str) -> Self {
        Self {
            name,
            target: EventTarget::Document,
        }
    }

    pub fn element(name: &'static str, node: NodeId) -> Self {
        Self {
            name,
            target: EventTarget::Element(node),
        }
    }
}

type Listener = Rc<dyn Fn(&DomEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, &'static str, Listener)>,
}

/// Synchronous event dispatcher shared by the pipeline and its observers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, name: &'static str, listener: impl Fn(&DomEvent) + 'static) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id = registry.next_id.saturating_add(1);
        registry.listeners.push((id, name, Rc::new(listener)));
        id
    }

    pub fn off(&self, id: ListenerId) {
        self.registry
            .borrow_mut()
            .listeners
            .retain(|(listener, _, _)| *listener != id);
    }

    /// Calls every listener registered for `event.name`, in registration
    /// order. Listeners may register or remove listeners while running.
    pub fn dispatch(&self, event: DomEvent) {
        let listeners: Vec<Listener> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        log::trace!("dispatching {} to {} listener(s)", event.name, listeners.len());
        for listener in listeners {
            listener(&event);
        }
    }
}
