#![forbid(unsafe_code)]

//! Runtime core for the Lenz editor: change tracking, undo history and
//! message ports.
//!
//! # Role in Lenz
//! `lenz-runtime` owns ephemeral state on behalf of the editor host. The
//! host registers commands, menus and windows elsewhere; this crate gives
//! those adapters the primitives they build on.
//!
//! # Primary responsibilities
//! - **Reactive core** ([`reactive`]): [`Ref`] cells, [`EffectScope`]
//!   ownership trees and watchers, all driven by an explicit [`Runtime`].
//! - **Undo history** ([`undo`]): bounded snapshot timelines, one per
//!   document in a [`HistoryStore`].
//! - **Channel ports** ([`channel`]): synchronous send/notify with async
//!   `next`, `wait_close` and `listen`, cancellable per call.
//! - **Disposers** ([`dispose`]): idempotent teardown handles returned by
//!   every subscription.
//!
//! # Threading
//! Everything is single-threaded (`Rc`/`RefCell`). Async operations only
//! suspend consumers; they do not require a particular executor.

pub mod channel;
pub mod dispose;
pub mod reactive;
pub mod undo;

pub use channel::{ChannelError, ChannelPort, Listen, create_channel, create_channel_port};
pub use dispose::{DisposeGuard, Disposer};
pub use reactive::{
    Effect, EffectScope, GetSet, Hook, Ref, RefGetSet, Runtime, WatchOptions, WatchSource, getter,
};
pub use undo::{History, HistoryConfig, HistoryError, HistoryStore, SnapShot};
