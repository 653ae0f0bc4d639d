#![forbid(unsafe_code)]

//! Message conduits between the editor core and isolated UI surfaces.
//!
//! - [`ChannelPort`]: one endpoint with synchronous `send`/`notify` and
//!   asynchronous `next`, `wait_close` and [`listen`](ChannelPort::listen).
//! - [`create_channel`]: two cross-wired ports; sending on one notifies the
//!   other, and closing either closes both.
//! - [`Ref::as_port`](crate::reactive::Ref::as_port): exposes a ref as a port.
//!
//! # Concurrency
//!
//! Ports never spawn tasks. `send` and `notify` run receivers and listeners
//! inline on the caller's turn; only consumers suspend. Cancellation comes
//! from a caller-supplied [`CancellationToken`](tokio_util::sync::CancellationToken)
//! and affects only the call it was passed to.
//!
//! # Invariants
//!
//! 1. `closed` is monotonic.
//! 2. Each `notify` resolves at most one pending `next`, the oldest.
//! 3. A closed port holds no listener, receiver or waiter.

mod bridge;
mod port;

pub use port::{ChannelError, ChannelPort, Listen, create_channel, create_channel_port};
