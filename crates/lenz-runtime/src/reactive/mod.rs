#![forbid(unsafe_code)]

//! Reactive dependency tracking for Lenz.
//!
//! This module provides the change-tracking primitives the editor host
//! builds on:
//!
//! - [`Runtime`]: explicit context owning the root scope and the ambient
//!   scope/effect stack.
//! - [`Ref`]: a reactive cell that records the effects reading it and
//!   re-runs them on write.
//! - [`EffectScope`]: an ownership tree of disposers, effects and child
//!   scopes, torn down deterministically by `dispose()`.
//! - [`Runtime::watch`] / [`Runtime::watch_effect`]: watchers with
//!   per-run dependency collection.
//!
//! # Architecture
//!
//! Everything is single-threaded and uses `Rc<RefCell<..>>`. Refs store
//! their subscribers as `Weak` effect handles; scopes hold the strong
//! handles. Ambient state lives in the [`Runtime`] frame stack, pushed and
//! popped by a guard.
//!
//! # Invariants
//!
//! 1. A read inside an active effect subscribes it at most once.
//! 2. A write notifies every subscriber synchronously, before `set`
//!    returns, in subscription order.
//! 3. Setting a plain ref to an equal value is a no-op.
//! 4. Disposing a scope disposes every registered disposer and child scope
//!    exactly once; repeated calls do nothing.

mod effect;
mod reference;
mod runtime;
mod scope;
mod watch;

pub use effect::Effect;
pub use reference::{GetSet, Hook, Ref, RefGetSet};
pub use runtime::Runtime;
pub use scope::EffectScope;
pub use watch::{Getter, WatchOptions, WatchSource, getter};
