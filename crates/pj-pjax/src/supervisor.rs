//! Single-slot navigation supervisor.
//!
//! At most one navigation owns the slot. Starting a navigation casts an
//! abort to the current owner, whose handler cancels its token, and then
//! registers the newcomer.

use pj_core::PjaxError;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(u64);

struct Slot {
    id: SlotId,
    abort: Box<dyn FnOnce(PjaxError)>,
}

#[derive(Clone, Default)]
pub struct Supervisor {
    slot: Rc<RefCell<Option<Slot>>>,
    next_id: Rc<Cell<u64>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives the slot to a new navigation; `abort` runs if it is cast out.
    pub fn register(&self, abort: impl FnOnce(PjaxError) + 'static) -> SlotId {
        let id = SlotId(self.next_id.get());
        self.next_id.set(self.next_id.get().saturating_add(1));
        let previous = self.slot.replace(Some(Slot {
            id,
            abort: Box::new(abort),
        }));
        if let Some(previous) = previous {
            log::debug!("slot {:?} replaced without an abort", previous.id);
        }
        id
    }

    /// Aborts the running navigation, if any.
    pub fn cast(&self, reason: PjaxError) -> bool {
        let slot = self.slot.borrow_mut().take();
        match slot {
            Some(slot) => {
                log::debug!("aborting slot {:?}: {reason}", slot.id);
                (slot.abort)(reason);
                true
            }
            None => false,
        }
    }

    /// Releases the slot if `id` still owns it.
    pub fn terminate(&self, id: SlotId) -> bool {
        let mut slot = self.slot.borrow_mut();
        if slot.as_ref().is_some_and(|slot| slot.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot.borrow().is_some()
    }
}
