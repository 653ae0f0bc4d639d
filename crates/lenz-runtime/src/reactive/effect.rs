#![forbid(unsafe_code)]

//! Re-runnable effect closures.
//!
//! An [`Effect`] is the unit a [`Ref`](super::Ref) notifies on write. Refs
//! only hold [`WeakEffect`] back-references, so whoever created the effect
//! (usually an [`EffectScope`](super::EffectScope)) decides how long it
//! lives.
//!
//! # Failure Modes
//!
//! - **Re-entrant run**: an effect that writes a ref it depends on is
//!   triggered while it is still running. The nested run is skipped
//!   instead of recursing; [`Effect::run`] returns `false` for it.
//! - **Panicking body**: the panic unwinds through `run` and the effect
//!   stays usable for the next trigger.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) struct EffectInner {
    callback: RefCell<Box<dyn FnMut()>>,
}

/// A closure re-run whenever a ref it subscribed to changes.
///
/// Cloning shares the same effect; identity is pointer identity.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Effect {
    /// Wrap a closure as an effect.
    #[must_use]
    pub fn new(callback: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(EffectInner {
                callback: RefCell::new(Box::new(callback)),
            }),
        }
    }

    /// Build an effect whose body needs a handle to itself.
    pub(crate) fn new_cyclic<F>(make: impl FnOnce(WeakEffect) -> F) -> Self
    where
        F: FnMut() + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<EffectInner>| EffectInner {
            callback: RefCell::new(Box::new(make(WeakEffect(weak.clone())))),
        });
        Self { inner }
    }

    /// Invoke the effect. Returns `false` if it was already running.
    pub fn run(&self) -> bool {
        let Ok(mut callback) = self.inner.callback.try_borrow_mut() else {
            tracing::trace!("effect already running; skipping nested run");
            return false;
        };
        (callback)();
        true
    }

    /// Whether the effect body is executing right now.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.callback.try_borrow_mut().is_err()
    }

    /// Whether two handles refer to the same effect.
    #[must_use]
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        WeakEffect(Rc::downgrade(&self.inner))
    }
}

/// Non-owning effect handle stored in subscriber lists.
#[derive(Clone)]
pub(crate) struct WeakEffect(Weak<EffectInner>);

impl WeakEffect {
    pub(crate) fn upgrade(&self) -> Option<Effect> {
        self.0.upgrade().map(|inner| Effect { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn points_to(&self, effect: &Effect) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&effect.inner))
    }

    pub(crate) fn ptr_eq(&self, other: &WeakEffect) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn run_invokes_callback() {
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        let effect = Effect::new(move || h.set(h.get() + 1));

        assert!(effect.run());
        assert!(effect.run());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn nested_run_is_skipped() {
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let nested = Rc::new(Cell::new(None));
        let s = Rc::clone(&slot);
        let n = Rc::clone(&nested);
        let effect = Effect::new(move || {
            if let Some(me) = s.borrow().as_ref() {
                n.set(Some(me.run()));
            }
        });
        *slot.borrow_mut() = Some(effect.clone());

        assert!(effect.run());
        assert_eq!(nested.get(), Some(false));
        slot.borrow_mut().take();
    }

    #[test]
    fn weak_handle_does_not_keep_alive() {
        let effect = Effect::new(|| {});
        let weak = effect.downgrade();
        assert!(weak.is_alive());
        assert!(weak.points_to(&effect));
        drop(effect);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn cyclic_effect_sees_itself() {
        let saw_self = Rc::new(Cell::new(false));
        let s = Rc::clone(&saw_self);
        let effect = Effect::new_cyclic(move |me| {
            move || {
                if let Some(me) = me.upgrade() {
                    s.set(me.is_running());
                }
            }
        });
        effect.run();
        assert!(saw_self.get());
    }
}
