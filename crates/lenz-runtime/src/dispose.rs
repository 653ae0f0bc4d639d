#![forbid(unsafe_code)]

//! Idempotent teardown handles.
//!
//! A [`Disposer`] wraps a one-shot finalizer. Every subscription in this
//! crate (ref effects, scope disposers, port listeners) hands one back.
//!
//! # Invariants
//!
//! 1. The wrapped finalizer runs at most once, no matter how many clones
//!    of the handle call [`Disposer::dispose`].
//! 2. Dropping a `Disposer` does **not** run the finalizer. Use
//!    [`Disposer::into_guard`] when RAII teardown is wanted.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Finalizer = Box<dyn FnOnce()>;

/// Idempotent zero-argument teardown handle.
///
/// Cloning shares the same finalizer slot.
#[derive(Clone)]
pub struct Disposer {
    slot: Rc<RefCell<Option<Finalizer>>>,
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Disposer {
    /// Wrap a finalizer.
    #[must_use]
    pub fn new(finalizer: impl FnOnce() + 'static) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(Box::new(finalizer)))),
        }
    }

    /// A disposer with nothing to release.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }

    /// Run the finalizer if it has not run yet.
    pub fn dispose(&self) {
        // Take before calling so a finalizer that disposes itself again
        // finds an empty slot instead of a live borrow.
        let finalizer = self.slot.borrow_mut().take();
        if let Some(finalizer) = finalizer {
            finalizer();
        }
    }

    /// Whether the finalizer has already run (or there never was one).
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Convert into a guard that disposes on drop.
    #[must_use]
    pub fn into_guard(self) -> DisposeGuard {
        DisposeGuard {
            disposer: Some(self),
        }
    }
}

/// RAII wrapper that calls [`Disposer::dispose`] when dropped.
#[derive(Debug)]
pub struct DisposeGuard {
    disposer: Option<Disposer>,
}

impl DisposeGuard {
    /// Give up the guard without disposing.
    #[must_use]
    pub fn release(mut self) -> Disposer {
        self.disposer.take().unwrap_or_else(Disposer::noop)
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer.dispose();
        }
    }
}
