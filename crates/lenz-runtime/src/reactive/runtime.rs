#![forbid(unsafe_code)]

//! Explicit reactive context.
//!
//! A [`Runtime`] owns the root [`EffectScope`] and the ambient frame stack
//! consulted by [`Ref`](super::Ref) reads. There is no process-wide state:
//! two runtimes never see each other's scopes or effects.
//!
//! # Invariants
//!
//! 1. The frame stack is only pushed through [`FrameGuard`], which pops on
//!    drop. Ambient state is restored on every exit path, unwinding
//!    included.
//! 2. With an empty stack the current scope is the root scope and there is
//!    no active effect.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::Effect;
use super::scope::EffectScope;
use crate::dispose::Disposer;

/// One ambient slot: the scope being run and, when tracking, its effect.
#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) scope: EffectScope,
    pub(crate) effect: Option<Effect>,
}

pub(crate) struct RuntimeInner {
    root: EffectScope,
    frames: RefCell<Vec<Frame>>,
}

/// Handle to an independent reactive runtime.
///
/// Cloning shares the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("depth", &self.inner.frames.borrow().len())
            .field("root", &self.inner.root)
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with a fresh root scope.
    #[must_use]
    pub fn new() -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<RuntimeInner>| RuntimeInner {
            root: EffectScope::new(WeakRuntime(weak.clone()), None),
            frames: RefCell::new(Vec::new()),
        });
        Self { inner }
    }

    /// The scope every top-level scope hangs off.
    #[must_use]
    pub fn root_scope(&self) -> EffectScope {
        self.inner.root.clone()
    }

    /// The scope currently running, or the root scope.
    #[must_use]
    pub fn current_scope(&self) -> EffectScope {
        self.current_frame().scope
    }

    /// The effect that ref reads would subscribe right now, if any.
    #[must_use]
    pub fn active_effect(&self) -> Option<Effect> {
        self.current_frame().effect
    }

    /// Create a scope owned by the current scope.
    #[must_use]
    pub fn create_scope(&self) -> EffectScope {
        EffectScope::new(self.downgrade(), Some(&self.current_scope()))
    }

    /// Create a scope owned by the current scope and run `setup` inside it.
    pub fn create_scope_with(&self, setup: impl FnOnce()) -> EffectScope {
        let scope = self.create_scope();
        scope.run(setup);
        scope
    }

    /// Register a finalizer on the current scope.
    pub fn on_dispose(&self, finalizer: impl FnOnce() + 'static) -> Disposer {
        self.current_scope().add_disposer(finalizer)
    }

    /// Run `f` in the current scope with tracking switched off.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let scope = self.current_scope();
        let _frame = self.enter(Frame {
            scope,
            effect: None,
        });
        f()
    }

    pub(crate) fn current_frame(&self) -> Frame {
        self.inner
            .frames
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| Frame {
                scope: self.inner.root.clone(),
                effect: None,
            })
    }

    pub(crate) fn enter(&self, frame: Frame) -> FrameGuard {
        self.inner.frames.borrow_mut().push(frame);
        FrameGuard {
            runtime: Rc::clone(&self.inner),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }
}

/// Pops the frame it pushed when dropped.
pub(crate) struct FrameGuard {
    runtime: Rc<RuntimeInner>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.runtime.frames.borrow_mut().pop();
    }
}

/// Non-owning runtime handle held by scopes and refs.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }

    /// Run `f` untracked if the runtime is still alive, plainly otherwise.
    pub(crate) fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.upgrade() {
            Some(runtime) => runtime.untracked(f),
            None => f(),
        }
    }
}
