#![forbid(unsafe_code)]

//! Effect scopes: ownership trees of disposers, effects and child scopes.
//!
//! # Design
//!
//! An [`EffectScope`] exclusively owns its disposers, the effects created
//! through [`EffectScope::run_tracked`], and its child scopes. A child keeps
//! only a `Weak` link to its parent, so the tree has no reference cycles.
//!
//! Teardown order on [`EffectScope::dispose`]:
//!
//! ```text
//! disposers (reverse registration) -> children (newest first) -> effects
//! ```
//!
//! # Invariants
//!
//! 1. Every disposer registered before disposal runs exactly once.
//! 2. `dispose()` is idempotent; a scope disposed on its own detaches from
//!    its parent so the parent never disposes it a second time.
//! 3. Disposers registered after disposal are dropped without running.
//!
//! # Failure Modes
//!
//! - **Panicking disposer**: teardown stops at the panic; the scope is
//!   already marked disposed and will not retry.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::Effect;
use super::runtime::{Frame, WeakRuntime};
use crate::dispose::Disposer;

struct ScopeState {
    disposed: bool,
    next_id: u64,
    disposers: Vec<(u64, Disposer)>,
    children: Vec<EffectScope>,
    effects: Vec<Effect>,
}

pub(crate) struct ScopeInner {
    runtime: WeakRuntime,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    state: RefCell<ScopeState>,
}

/// Lifecycle container for reactive subscriptions.
///
/// Cloning creates another handle to the **same** scope.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<ScopeInner>,
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("EffectScope")
            .field("disposed", &state.disposed)
            .field("disposers", &state.disposers.len())
            .field("children", &state.children.len())
            .field("effects", &state.effects.len())
            .finish()
    }
}

impl EffectScope {
    pub(crate) fn new(runtime: WeakRuntime, parent: Option<&EffectScope>) -> Self {
        let scope = Self {
            inner: Rc::new(ScopeInner {
                runtime,
                parent: RefCell::new(None),
                state: RefCell::new(ScopeState {
                    disposed: false,
                    next_id: 0,
                    disposers: Vec::new(),
                    children: Vec::new(),
                    effects: Vec::new(),
                }),
            }),
        };

        if let Some(parent) = parent {
            let mut parent_state = parent.inner.state.borrow_mut();
            if parent_state.disposed {
                tracing::warn!("creating a scope under a disposed parent; it will not be owned");
            } else {
                parent_state.children.push(scope.clone());
                *scope.inner.parent.borrow_mut() = Some(Rc::downgrade(&parent.inner));
            }
        }

        scope
    }

    /// Create a scope owned by this one.
    #[must_use]
    pub fn child(&self) -> EffectScope {
        EffectScope::new(self.inner.runtime.clone(), Some(self))
    }

    /// Register a finalizer to run when this scope is disposed.
    ///
    /// The returned disposer deregisters the finalizer without running it.
    /// On an already disposed scope the finalizer is dropped unrun and a
    /// no-op disposer is returned.
    pub fn add_disposer(&self, finalizer: impl FnOnce() + 'static) -> Disposer {
        let id = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                tracing::warn!("disposer added to a disposed scope; dropping it");
                return Disposer::noop();
            }
            let id = state.next_id;
            state.next_id += 1;
            state.disposers.push((id, Disposer::new(finalizer)));
            id
        };

        let scope = Rc::downgrade(&self.inner);
        Disposer::new(move || {
            if let Some(scope) = scope.upgrade() {
                scope
                    .state
                    .borrow_mut()
                    .disposers
                    .retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Run `f` with this scope as the ambient scope, without tracking.
    ///
    /// Returns `None` (and runs nothing) if the scope is disposed.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        self.run_with(None, f)
    }

    /// Run `f` as a tracked effect of this scope.
    ///
    /// Refs read during the call subscribe the effect; later writes to them
    /// re-invoke `f`. The effect lives as long as this scope. Returns the
    /// result of the first invocation, or `None` if the scope is disposed.
    pub fn run_tracked<R: 'static>(&self, mut f: impl FnMut() -> R + 'static) -> Option<R> {
        if self.is_disposed() {
            tracing::warn!("run_tracked on a disposed scope; nothing was run");
            return None;
        }

        let slot: Rc<RefCell<Option<R>>> = Rc::new(RefCell::new(None));
        let capture = Rc::clone(&slot);
        let scope = self.downgrade();
        let effect = Effect::new_cyclic(move |me| {
            move || {
                let (Some(scope), Some(me)) = (scope.upgrade(), me.upgrade()) else {
                    return;
                };
                scope.run_with(Some(me), || {
                    let result = f();
                    // Only the first invocation hands its result back to the caller.
                    if Rc::strong_count(&capture) > 1 {
                        *capture.borrow_mut() = Some(result);
                    }
                });
            }
        });

        self.keep_effect(effect.clone());
        effect.run();
        let result = slot.borrow_mut().take();
        result
    }

    pub(crate) fn run_with<R>(&self, effect: Option<Effect>, f: impl FnOnce() -> R) -> Option<R> {
        if self.is_disposed() {
            tracing::warn!("run on a disposed scope; nothing was run");
            return None;
        }
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return Some(f());
        };
        let _frame = runtime.enter(Frame {
            scope: self.clone(),
            effect,
        });
        Some(f())
    }

    /// Keep `effect` alive until this scope is disposed.
    pub(crate) fn keep_effect(&self, effect: Effect) {
        let mut state = self.inner.state.borrow_mut();
        if !state.disposed {
            state.effects.push(effect);
        }
    }

    /// Dispose every disposer, child scope and effect owned by this scope.
    pub fn dispose(&self) {
        let (disposers, children, effects) = {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                std::mem::take(&mut state.disposers),
                std::mem::take(&mut state.children),
                std::mem::take(&mut state.effects),
            )
        };
        tracing::trace!(
            disposers = disposers.len(),
            children = children.len(),
            "disposing effect scope"
        );

        for (_, disposer) in disposers.into_iter().rev() {
            disposer.dispose();
        }
        for child in children.into_iter().rev() {
            child.dispose();
        }
        drop(effects);

        let parent = self.inner.parent.borrow_mut().take();
        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent
                .state
                .borrow_mut()
                .children
                .retain(|child| !Rc::ptr_eq(&child.inner, &self.inner));
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Number of registered, not yet run disposers.
    #[must_use]
    pub fn disposer_count(&self) -> usize {
        self.inner.state.borrow().disposers.len()
    }

    /// Number of live child scopes.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.state.borrow().children.len()
    }

    /// Whether two handles refer to the same scope.
    #[must_use]
    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.inner))
    }
}

/// Non-owning scope handle.
#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<EffectScope> {
        self.0.upgrade().map(|inner| EffectScope { inner })
    }
}
