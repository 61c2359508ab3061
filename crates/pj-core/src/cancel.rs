//! Single-shot cancellation token with abort hooks.

use crate::PjaxError;
use crate::PjaxResult;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

type Hook = Box<dyn FnOnce(&PjaxError)>;

#[derive(Default)]
struct CancelState {
    reason: Option<PjaxError>,
    hooks: Vec<Hook>,
    wakers: Vec<Waker>,
}

/// Cancellation token shared by every phase of one navigation.
///
/// Cancelling is monotonic: the first reason wins and later calls are ignored.
/// Hooks registered after cancellation run immediately with the stored reason.
#[derive(Clone, Default)]
pub struct Cancellation {
    state: Rc<RefCell<CancelState>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token. Returns `false` when it was already cancelled.
    pub fn cancel(&self, reason: PjaxError) -> bool {
        let (hooks, wakers) = {
            let mut state = self.state.borrow_mut();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason.clone());
            (
                std::mem::take(&mut state.hooks),
                std::mem::take(&mut state.wakers),
            )
        };

        for hook in hooks {
            hook(&reason);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub fn is_canceled(&self) -> bool {
        self.state.borrow().reason.is_some()
    }

    pub fn reason(&self) -> Option<PjaxError> {
        self.state.borrow().reason.clone()
    }

    pub fn register(&self, hook: impl FnOnce(&PjaxError) + 'static) {
        let reason = {
            let mut state = self.state.borrow_mut();
            match &state.reason {
                Some(reason) => reason.clone(),
                None => {
                    state.hooks.push(Box::new(hook));
                    return;
                }
            }
        };
        hook(&reason);
    }

    /// `Ok(value)` while live, `Err(reason)` once cancelled.
    pub fn either<T>(&self, value: T) -> PjaxResult<T> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(value),
        }
    }

    /// `Some(value)` while live, `None` once cancelled.
    pub fn maybe<T>(&self, value: T) -> Option<T> {
        if self.is_canceled() {
            None
        } else {
            Some(value)
        }
    }

    /// Resolves with the reason once the token is cancelled.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            state: Rc::clone(&self.state),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellation")
            .field("reason", &self.state.borrow().reason)
            .finish()
    }
}

/// Future returned by [`Cancellation::cancelled`].
pub struct Cancelled {
    state: Rc<RefCell<CancelState>>,
}

impl Future for Cancelled {
    type Output = PjaxError;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.reason {
            return Poll::Ready(reason.clone());
        }
        if !state.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
