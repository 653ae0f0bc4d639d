#![forbid(unsafe_code)]

//! Reactive references with dependency tracking.
//!
//! # Design
//!
//! A [`Ref<T>`] pairs a storage strategy ([`RefGetSet<T>`]) with a
//! dependency node. The node keeps the ref's subscribers as weak effect
//! handles, so subscribing never extends an effect's life. Plain refs come
//! from [`Runtime::create_ref`]; [`Runtime::create_custom_ref`] lets any
//! storage join the same graph by calling the `track`/`trigger` hooks it is
//! handed.
//!
//! # Performance
//!
//! | Operation     | Complexity                  |
//! |---------------|-----------------------------|
//! | `get()`       | O(S) when tracking, else O(1) |
//! | `set()`       | O(S) where S = subscribers  |
//! | `add_effect`  | O(S)                        |
//!
//! # Failure Modes
//!
//! - **Subscriber mutation during trigger**: the subscriber list is
//!   snapshotted first. Effects added mid-trigger wait for the next write;
//!   effects removed mid-trigger are skipped.
//! - **Panicking effect**: the panic unwinds out of `set()` and the
//!   remaining subscribers of that write are not notified.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{Effect, WeakEffect};
use super::runtime::{Runtime, WeakRuntime};
use crate::dispose::Disposer;

/// Callback handed to custom ref factories (`track` or `trigger`).
pub type Hook = Rc<dyn Fn()>;

/// Storage strategy behind a [`Ref`].
///
/// `get` is expected to call the factory's `track` hook and `set` its
/// `trigger` hook.
pub trait RefGetSet<T> {
    /// Read the current value.
    fn get(&self) -> T;
    /// Store a new value.
    fn set(&self, value: T);
}

/// A [`RefGetSet`] built from a getter and a setter closure.
pub struct GetSet<G, S> {
    /// Getter.
    pub get: G,
    /// Setter.
    pub set: S,
}

impl<T, G, S> RefGetSet<T> for GetSet<G, S>
where
    G: Fn() -> T,
    S: Fn(T),
{
    fn get(&self) -> T {
        (self.get)()
    }

    fn set(&self, value: T) {
        (self.set)(value);
    }
}

/// Default storage: a cell that ignores writes of an equal value.
struct PlainRef<T> {
    value: RefCell<T>,
    track: Hook,
    trigger: Hook,
}

impl<T: Clone + PartialEq> RefGetSet<T> for PlainRef<T> {
    fn get(&self) -> T {
        (self.track)();
        self.value.borrow().clone()
    }

    fn set(&self, value: T) {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        (self.trigger)();
    }
}

struct DepInner {
    runtime: WeakRuntime,
    subscribers: RefCell<Vec<WeakEffect>>,
}

/// Dependency node shared by a ref and its hooks.
#[derive(Clone)]
struct Dep {
    inner: Rc<DepInner>,
}

impl Dep {
    fn new(runtime: WeakRuntime) -> Self {
        Self {
            inner: Rc::new(DepInner {
                runtime,
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    fn is_subscribed(&self, effect: &Effect) -> bool {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .any(|w| w.points_to(effect))
    }

    fn track(&self) {
        let Some(runtime) = self.inner.runtime.upgrade() else {
            tracing::warn!("ref read after its runtime was dropped; not tracked");
            return;
        };
        let frame = runtime.current_frame();
        let Some(effect) = frame.effect else {
            return;
        };
        if self.is_subscribed(&effect) {
            return;
        }

        let subscription = self.add_effect(&effect);
        if frame.scope.is_disposed() {
            subscription.dispose();
            return;
        }
        let _ = frame.scope.add_disposer(move || subscription.dispose());
    }

    fn add_effect(&self, effect: &Effect) -> Disposer {
        let weak = effect.downgrade();
        {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(WeakEffect::is_alive);
            if !subscribers.iter().any(|w| w.ptr_eq(&weak)) {
                subscribers.push(weak.clone());
            }
        }

        let dep: Weak<DepInner> = Rc::downgrade(&self.inner);
        Disposer::new(move || {
            if let Some(dep) = dep.upgrade() {
                dep.subscribers.borrow_mut().retain(|w| !w.ptr_eq(&weak));
            }
        })
    }

    fn trigger(&self) {
        let snapshot: Vec<Effect> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(WeakEffect::is_alive);
            subscribers.iter().filter_map(WeakEffect::upgrade).collect()
        };

        for effect in snapshot {
            if self.is_subscribed(&effect) {
                effect.run();
            }
        }
    }

    fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|w| w.is_alive())
            .count()
    }
}

/// A reactive cell.
///
/// Reading inside an active effect subscribes that effect; writing
/// synchronously re-runs every subscribed effect before returning.
///
/// Cloning creates a new handle to the **same** cell.
pub struct Ref<T> {
    dep: Dep,
    def: Rc<dyn RefGetSet<T>>,
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            dep: self.dep.clone(),
            def: Rc::clone(&self.def),
        }
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("subscribers", &self.dep.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Ref<T> {
    /// Read the value, subscribing the active effect (if any).
    pub fn get(&self) -> T {
        self.def.get()
    }

    /// Read the value without subscribing anything.
    pub fn get_untracked(&self) -> T {
        self.dep.inner.runtime.untracked(|| self.def.get())
    }

    /// Write the value, notifying subscribers.
    pub fn set(&self, value: T) {
        self.def.set(value);
    }

    /// Replace the value with `f(current)`. The read is untracked.
    pub fn update(&self, f: impl FnOnce(T) -> T) {
        let next = f(self.get_untracked());
        self.set(next);
    }

    /// Subscribe the active effect of the ref's runtime, if there is one.
    pub fn track(this: &Self) {
        this.dep.track();
    }

    /// Re-run every effect subscribed at the time of the call.
    pub fn trigger(this: &Self) {
        this.dep.trigger();
    }

    /// Subscribe `effect` directly. The disposer removes exactly this
    /// subscription.
    pub fn add_effect(this: &Self, effect: &Effect) -> Disposer {
        this.dep.add_effect(effect)
    }

    /// Number of live subscribed effects.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.dep.subscriber_count()
    }

    /// The runtime this ref was created in, if it is still alive.
    #[must_use]
    pub fn runtime(&self) -> Option<Runtime> {
        self.dep.inner.runtime.upgrade()
    }
}

impl Runtime {
    /// Create a plain reactive cell.
    ///
    /// Writing a value equal to the current one is ignored.
    pub fn create_ref<T: Clone + PartialEq + 'static>(&self, value: T) -> Ref<T> {
        self.create_custom_ref(|track, trigger| PlainRef {
            value: RefCell::new(value),
            track,
            trigger,
        })
    }

    /// Create a ref backed by custom storage.
    ///
    /// `factory` receives the `track` and `trigger` hooks of the new ref.
    pub fn create_custom_ref<T, G>(&self, factory: impl FnOnce(Hook, Hook) -> G) -> Ref<T>
    where
        T: 'static,
        G: RefGetSet<T> + 'static,
    {
        let dep = Dep::new(self.downgrade());
        let track: Hook = {
            let dep = dep.clone();
            Rc::new(move || dep.track())
        };
        let trigger: Hook = {
            let dep = dep.clone();
            Rc::new(move || dep.trigger())
        };
        Ref {
            def: Rc::new(factory(track, trigger)),
            dep,
        }
    }
}
