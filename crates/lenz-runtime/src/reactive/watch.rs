#![forbid(unsafe_code)]

//! Watchers built on tracked effects.
//!
//! [`Runtime::watch_effect`] re-runs a closure whenever a ref it read during
//! its **latest** run changes; dependencies are collected afresh on every
//! run. [`Runtime::watch`] layers change detection on top: it reads a
//! [`WatchSource`] and calls back with the new and previous values.
//!
//! Both return a [`Disposer`] that stops the watcher. Watchers are also
//! owned by the scope that was current when they were created, so
//! disposing that scope stops them too.

use std::fmt;

use super::effect::Effect;
use super::reference::Ref;
use super::runtime::Runtime;
use super::scope::EffectScope;
use crate::dispose::Disposer;

/// Something a watcher can read: a ref, a getter, or a collection of them.
pub trait WatchSource: 'static {
    /// The value produced by one read.
    type Value: Clone + PartialEq + 'static;

    /// Read the source. Called inside the watcher's tracked run.
    fn read(&self) -> Self::Value;
}

impl<T: Clone + PartialEq + 'static> WatchSource for Ref<T> {
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

/// Getter closure usable as a [`WatchSource`]. Build it with [`getter`].
pub struct Getter<F>(F);

impl<F> fmt::Debug for Getter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter").finish_non_exhaustive()
    }
}

/// Wrap a closure as a watch source.
pub fn getter<F, T>(f: F) -> Getter<F>
where
    F: Fn() -> T + 'static,
    T: Clone + PartialEq + 'static,
{
    Getter(f)
}

impl<F, T> WatchSource for Getter<F>
where
    F: Fn() -> T + 'static,
    T: Clone + PartialEq + 'static,
{
    type Value = T;

    fn read(&self) -> T {
        (self.0)()
    }
}

impl<S: WatchSource> WatchSource for Vec<S> {
    type Value = Vec<S::Value>;

    fn read(&self) -> Self::Value {
        self.iter().map(S::read).collect()
    }
}

impl<S: WatchSource, const N: usize> WatchSource for [S; N] {
    type Value = Vec<S::Value>;

    fn read(&self) -> Self::Value {
        self.iter().map(S::read).collect()
    }
}

impl<A: WatchSource, B: WatchSource> WatchSource for (A, B) {
    type Value = (A::Value, B::Value);

    fn read(&self) -> Self::Value {
        (self.0.read(), self.1.read())
    }
}

impl<A: WatchSource, B: WatchSource, C: WatchSource> WatchSource for (A, B, C) {
    type Value = (A::Value, B::Value, C::Value);

    fn read(&self) -> Self::Value {
        (self.0.read(), self.1.read(), self.2.read())
    }
}

/// Options for [`Runtime::watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Call the callback once at creation with no previous value.
    pub immediate: bool,
}

impl WatchOptions {
    /// Options with `immediate` set.
    #[must_use]
    pub fn immediate() -> Self {
        Self { immediate: true }
    }
}

impl Runtime {
    /// Run `effect` now and again whenever a ref it read in its latest run
    /// changes.
    pub fn watch_effect(&self, effect: impl FnMut() + 'static) -> Disposer {
        let owner = self.create_scope();
        let weak_owner = owner.downgrade();

        let runner = Effect::new_cyclic(move |me| {
            let mut body = effect;
            let mut deps: Option<EffectScope> = None;
            move || {
                // Drop the previous run's subscriptions before re-collecting.
                if let Some(previous) = deps.take() {
                    previous.dispose();
                }
                let (Some(owner), Some(me)) = (weak_owner.upgrade(), me.upgrade()) else {
                    return;
                };
                if owner.is_disposed() {
                    return;
                }
                let run_scope = owner.child();
                run_scope.run_with(Some(me), &mut body);
                deps = Some(run_scope);
            }
        });

        owner.keep_effect(runner.clone());
        runner.run();
        Disposer::new(move || owner.dispose())
    }

    /// Call `callback(new, old)` whenever the value read from `source`
    /// changes.
    ///
    /// With [`WatchOptions::immediate`] the callback also fires once at
    /// creation with `old == None`. The callback runs untracked; writes it
    /// makes to the watched source do not re-enter the watcher.
    pub fn watch<S, F>(&self, source: S, callback: F, options: WatchOptions) -> Disposer
    where
        S: WatchSource,
        F: FnMut(&S::Value, Option<&S::Value>) + 'static,
    {
        let runtime = self.downgrade();
        let mut callback = callback;
        let mut last: Option<S::Value> = None;

        self.watch_effect(move || {
            let value = source.read();
            let Some(previous) = last.take() else {
                if options.immediate {
                    runtime.untracked(|| callback(&value, None));
                }
                last = Some(value);
                return;
            };
            if previous == value {
                last = Some(previous);
                return;
            }
            runtime.untracked(|| callback(&value, Some(&previous)));
            last = Some(value);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn watch_effect_runs_immediately_and_on_change() {
        let rt = Runtime::new();
        let r = rt.create_ref(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let reader = r.clone();
        let _stop = rt.watch_effect(move || log.borrow_mut().push(reader.get()));

        r.set(2);
        r.set(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn watch_effect_drops_stale_dependencies() {
        let rt = Runtime::new();
        let use_a = rt.create_ref(true);
        let a = rt.create_ref(0);
        let b = rt.create_ref(0);
        let runs = Rc::new(Cell::new(0u32));

        let (flag, ra, rb, count) = (use_a.clone(), a.clone(), b.clone(), Rc::clone(&runs));
        let _stop = rt.watch_effect(move || {
            count.set(count.get() + 1);
            if flag.get() {
                let _ = ra.get();
            } else {
                let _ = rb.get();
            }
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        use_a.set(false);
        assert_eq!(runs.get(), 2);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        a.set(5);
        assert_eq!(runs.get(), 2);
        b.set(5);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn watch_effect_disposer_stops_reruns() {
        let rt = Runtime::new();
        let r = rt.create_ref(0);
        let runs = Rc::new(Cell::new(0u32));
        let (reader, count) = (r.clone(), Rc::clone(&runs));
        let stop = rt.watch_effect(move || {
            let _ = reader.get();
            count.set(count.get() + 1);
        });

        stop.dispose();
        stop.dispose();
        r.set(1);
        assert_eq!(runs.get(), 1);
        assert_eq!(r.subscriber_count(), 0);
    }

    #[test]
    fn watch_reports_new_and_old() {
        let rt = Runtime::new();
        let r = rt.create_ref(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _stop = rt.watch(
            r.clone(),
            move |new: &i32, old: Option<&i32>| log.borrow_mut().push((*new, old.copied())),
            WatchOptions::default(),
        );

        assert!(seen.borrow().is_empty());
        r.set(1);
        r.set(2);
        assert_eq!(*seen.borrow(), vec![(1, Some(0)), (2, Some(1))]);
    }

    #[test]
    fn watch_immediate_fires_with_no_old_value() {
        let rt = Runtime::new();
        let r = rt.create_ref("a");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _stop = rt.watch(
            r.clone(),
            move |new, old| log.borrow_mut().push((*new, old.copied())),
            WatchOptions::immediate(),
        );
        r.set("b");
        assert_eq!(*seen.borrow(), vec![("a", None), ("b", Some("a"))]);
    }

    #[test]
    fn watch_getter_skips_unchanged_results() {
        let rt = Runtime::new();
        let r = rt.create_ref(1);
        let calls = Rc::new(Cell::new(0u32));
        let (reader, count) = (r.clone(), Rc::clone(&calls));
        let _stop = rt.watch(
            getter(move || reader.get() % 2 == 0),
            move |_: &bool, _: Option<&bool>| count.set(count.get() + 1),
            WatchOptions::default(),
        );

        r.set(3);
        assert_eq!(calls.get(), 0);
        r.set(4);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn watch_multiple_sources() {
        let rt = Runtime::new();
        let a = rt.create_ref(1);
        let b = rt.create_ref(10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _stop = rt.watch(
            vec![a.clone(), b.clone()],
            move |new: &Vec<i32>, old: Option<&Vec<i32>>| {
                log.borrow_mut().push((new.clone(), old.cloned()));
            },
            WatchOptions::default(),
        );

        b.set(20);
        assert_eq!(
            *seen.borrow(),
            vec![(vec![1, 20], Some(vec![1, 10]))]
        );
    }

    #[test]
    fn watch_tuple_source() {
        let rt = Runtime::new();
        let name = rt.create_ref("x".to_string());
        let size = rt.create_ref(3usize);
        let latest = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&latest);
        let _stop = rt.watch(
            (name.clone(), size.clone()),
            move |new: &(String, usize), _: Option<&(String, usize)>| {
                *sink.borrow_mut() = Some(new.clone());
            },
            WatchOptions::default(),
        );
        size.set(4);
        assert_eq!(*latest.borrow(), Some(("x".to_string(), 4)));
    }

    #[test]
    fn callback_reads_are_not_tracked() {
        let rt = Runtime::new();
        let source = rt.create_ref(0);
        let other = rt.create_ref(0);
        let calls = Rc::new(Cell::new(0u32));
        let (peek, count) = (other.clone(), Rc::clone(&calls));
        let _stop = rt.watch(
            source.clone(),
            move |_: &i32, _: Option<&i32>| {
                let _ = peek.get();
                count.set(count.get() + 1);
            },
            WatchOptions::immediate(),
        );
        assert_eq!(other.subscriber_count(), 0);
        other.set(1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn disposing_owner_scope_stops_watchers() {
        let rt = Runtime::new();
        let r = rt.create_ref(0);
        let runs = Rc::new(Cell::new(0u32));
        let (reader, count, rt2) = (r.clone(), Rc::clone(&runs), rt.clone());
        let scope = rt.create_scope_with(move || {
            let _ = rt2.watch_effect(move || {
                let _ = reader.get();
                count.set(count.get() + 1);
            });
        });

        scope.dispose();
        r.set(1);
        assert_eq!(runs.get(), 1);
    }
}
