#![forbid(unsafe_code)]

//! Channel port endpoint and its listening stream.
//!
//! # Design
//!
//! A [`ChannelPort`] is an `Rc` handle over a single `RefCell`ed state:
//! the inbound receiver, the listener list, and two queues of parked
//! consumers (`next` and `wait_close`). Parked consumers hold the receiving
//! half of a [`oneshot`] channel; the port keeps the sending half.
//!
//! No borrow of the state is held while user code runs: receivers and
//! listeners are cloned out first, so they may freely call back into the
//! port (including closing it).
//!
//! # Failure Modes
//!
//! - Sending or notifying on a closed port does nothing.
//! - Adding a listener to a closed port logs a warning and returns a no-op
//!   [`Disposer`].
//! - A `next` that is cancelled or dropped leaves the queue before the next
//!   `notify`, so it never swallows a value.
//! - Dropping the last handle of an open port runs its close hooks, as
//!   [`close`](ChannelPort::close) would.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::{mpsc, oneshot};
use futures::stream::{FusedStream, Stream, StreamExt};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::dispose::{DisposeGuard, Disposer};

/// Why a pending port operation settled without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The port closed before a value arrived.
    #[error("channel port is closed")]
    Closed,
    /// The caller's cancellation token fired.
    #[error("wait on channel port was cancelled")]
    Cancelled,
}

type Receiver<I> = Rc<dyn Fn(I)>;
type Listener<O> = Rc<dyn Fn(&O)>;
type NextSender<O> = oneshot::Sender<Result<O, ChannelError>>;

struct PortState<I, O> {
    closed: bool,
    next_id: u64,
    receiver: Option<Receiver<I>>,
    listeners: Vec<(u64, Listener<O>)>,
    waiters: VecDeque<(u64, NextSender<O>)>,
    close_waiters: Vec<(u64, oneshot::Sender<()>)>,
    close_hooks: Vec<Box<dyn FnOnce()>>,
}

impl<I, O> PortState<I, O> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

struct PortInner<I, O> {
    state: RefCell<PortState<I, O>>,
}

impl<I, O> Drop for PortInner<I, O> {
    // A port dropped while open still runs its close hooks, so peers and
    // watchers wired to it are released.
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.closed {
            return;
        }
        state.closed = true;
        let hooks = mem::take(&mut state.close_hooks);
        if !hooks.is_empty() {
            tracing::debug!(hooks = hooks.len(), "channel port dropped while open");
        }
        for hook in hooks {
            hook();
        }
    }
}

/// One endpoint of a bidirectional conduit.
///
/// `I` is what this side sends, `O` is what it is notified with. Cloning
/// yields another handle to the same endpoint.
pub struct ChannelPort<I, O = I> {
    inner: Rc<PortInner<I, O>>,
}

impl<I, O> Clone for ChannelPort<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I, O> fmt::Debug for ChannelPort<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ChannelPort")
            .field("closed", &state.closed)
            .field("listeners", &state.listeners.len())
            .field("pending_next", &state.waiters.len())
            .finish()
    }
}

impl<I: 'static, O: 'static> ChannelPort<I, O> {
    /// Create a port whose `send` calls `receiver`.
    #[must_use]
    pub fn new(receiver: impl Fn(I) + 'static) -> Self {
        let port = Self::unbound();
        port.bind(receiver);
        port
    }

    fn unbound() -> Self {
        Self {
            inner: Rc::new(PortInner {
                state: RefCell::new(PortState {
                    closed: false,
                    next_id: 0,
                    receiver: None,
                    listeners: Vec::new(),
                    waiters: VecDeque::new(),
                    close_waiters: Vec::new(),
                    close_hooks: Vec::new(),
                }),
            }),
        }
    }

    fn bind(&self, receiver: impl Fn(I) + 'static) {
        let mut state = self.inner.state.borrow_mut();
        if !state.closed {
            state.receiver = Some(Rc::new(receiver));
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Hand `data` to the receiver. No-op once closed.
    pub fn send(&self, data: I) {
        let receiver = {
            let state = self.inner.state.borrow();
            if state.closed {
                tracing::trace!("send on closed channel port dropped");
                return;
            }
            state.receiver.clone()
        };
        if let Some(receiver) = receiver {
            receiver(data);
        }
    }

    /// Deliver `data` to every listener in registration order, then to the
    /// oldest pending [`next`](Self::next). No-op once closed.
    pub fn notify(&self, data: O) {
        let listeners = {
            let state = self.inner.state.borrow();
            if state.closed {
                return;
            }
            state.listeners.clone()
        };
        for (id, listener) in listeners {
            // Skip listeners removed by an earlier listener in this round.
            if self.has_listener(id) {
                listener(&data);
            }
        }
        self.resolve_next(data);
    }

    fn resolve_next(&self, data: O) {
        let mut outcome = Ok(data);
        loop {
            let waiter = self.inner.state.borrow_mut().waiters.pop_front();
            let Some((_, sender)) = waiter else {
                return;
            };
            match sender.send(outcome) {
                Ok(()) => return,
                Err(unsent) => outcome = unsent,
            }
        }
    }

    /// Register a persistent listener.
    ///
    /// The returned disposer removes only this listener and may be called
    /// any number of times, also after the port closed.
    pub fn add_listener(&self, listener: impl Fn(&O) + 'static) -> Disposer {
        let id = {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                drop(state);
                tracing::warn!("listener added to a closed channel port; ignored");
                return Disposer::noop();
            }
            let id = state.allocate_id();
            state.listeners.push((id, Rc::new(listener)));
            id
        };
        let port = self.downgrade();
        Disposer::new(move || {
            if let Some(port) = port.upgrade() {
                port.remove_listener(id);
            }
        })
    }

    fn remove_listener(&self, id: u64) {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            state
                .listeners
                .iter()
                .position(|(entry, _)| *entry == id)
                .map(|index| state.listeners.remove(index))
        };
        drop(removed);
    }

    fn has_listener(&self, id: u64) -> bool {
        self.inner
            .state
            .borrow()
            .listeners
            .iter()
            .any(|(entry, _)| *entry == id)
    }

    /// Wait for the next notified value.
    ///
    /// Settles with exactly one of: the value, [`ChannelError::Closed`], or
    /// [`ChannelError::Cancelled`] when `cancel` fires. Cancelling or
    /// dropping this future does not affect other pending calls.
    pub async fn next(&self, cancel: Option<&CancellationToken>) -> Result<O, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ChannelError::Cancelled);
        }

        let (sender, receiver) = oneshot::channel();
        let _waiter = {
            let mut state = self.inner.state.borrow_mut();
            let id = state.allocate_id();
            state.waiters.push_back((id, sender));
            WaiterGuard {
                port: self,
                id,
                kind: WaiterKind::Next,
            }
        };

        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                outcome = receiver => outcome,
                () = token.cancelled() => return Err(ChannelError::Cancelled),
            },
            None => receiver.await,
        };
        outcome.unwrap_or(Err(ChannelError::Closed))
    }

    /// Wait until the port closes. Returns at once if it already has.
    ///
    /// For a port from [`create_channel`] this also settles when every
    /// handle of the peer is dropped.
    pub async fn wait_close(&self, cancel: Option<&CancellationToken>) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Ok(());
        }
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ChannelError::Cancelled);
        }

        let (sender, receiver) = oneshot::channel();
        let _waiter = {
            let mut state = self.inner.state.borrow_mut();
            let id = state.allocate_id();
            state.close_waiters.push((id, sender));
            WaiterGuard {
                port: self,
                id,
                kind: WaiterKind::Close,
            }
        };

        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = receiver => Ok(()),
                () = token.cancelled() => Err(ChannelError::Cancelled),
            },
            None => {
                let _ = receiver.await;
                Ok(())
            }
        }
    }

    /// Stream every value notified from now on.
    ///
    /// The stream ends when the port closes (after yielding values already
    /// delivered to it) or as soon as `cancel` fires. Its internal listener
    /// is released when the stream ends or is dropped.
    pub fn listen(&self, cancel: Option<CancellationToken>) -> Listen<O>
    where
        O: Clone,
    {
        let (sender, items) = mpsc::unbounded();
        let cancelled = cancel.map(|token| Box::pin(token.cancelled_owned()));
        if self.is_closed() {
            return Listen {
                items,
                cancelled,
                registration: None,
                done: true,
            };
        }

        let listener = self.add_listener(move |data: &O| {
            let _ = sender.unbounded_send(data.clone());
        });
        // The stream keeps its port alive.
        let port = self.clone();
        let registration = Disposer::new(move || {
            listener.dispose();
            drop(port);
        });
        Listen {
            items,
            cancelled,
            registration: Some(registration.into_guard()),
            done: false,
        }
    }

    /// Close the port.
    ///
    /// Drops the receiver and every listener, fails pending `next` calls
    /// with [`ChannelError::Closed`] and resolves pending `wait_close`
    /// calls. Idempotent.
    pub fn close(&self) {
        let (receiver, listeners, waiters, close_waiters, hooks) = {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return;
            }
            state.closed = true;
            (
                state.receiver.take(),
                mem::take(&mut state.listeners),
                mem::take(&mut state.waiters),
                mem::take(&mut state.close_waiters),
                mem::take(&mut state.close_hooks),
            )
        };
        tracing::debug!(
            listeners = listeners.len(),
            pending_next = waiters.len(),
            "channel port closed"
        );

        drop(receiver);
        drop(listeners);
        for (_, sender) in waiters {
            let _ = sender.send(Err(ChannelError::Closed));
        }
        for (_, sender) in close_waiters {
            let _ = sender.send(());
        }
        for hook in hooks {
            hook();
        }
    }

    /// Run `hook` once when the port closes; immediately if it already has.
    pub(crate) fn on_close(&self, hook: impl FnOnce() + 'static) {
        let mut state = self.inner.state.borrow_mut();
        if state.closed {
            drop(state);
            hook();
            return;
        }
        state.close_hooks.push(Box::new(hook));
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.borrow().closed
    }

    /// Number of registered listeners, including those backing streams.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.state.borrow().listeners.len()
    }

    /// Number of parked [`next`](Self::next) calls.
    #[must_use]
    pub fn pending_next_count(&self) -> usize {
        self.inner.state.borrow().waiters.len()
    }

    pub(crate) fn downgrade(&self) -> WeakPort<I, O> {
        WeakPort(Rc::downgrade(&self.inner))
    }
}

pub(crate) struct WeakPort<I, O>(Weak<PortInner<I, O>>);

impl<I, O> WeakPort<I, O> {
    pub(crate) fn upgrade(&self) -> Option<ChannelPort<I, O>> {
        self.0.upgrade().map(|inner| ChannelPort { inner })
    }
}

enum WaiterKind {
    Next,
    Close,
}

/// Removes a parked consumer from its queue when its future finishes or is
/// dropped.
struct WaiterGuard<'a, I, O> {
    port: &'a ChannelPort<I, O>,
    id: u64,
    kind: WaiterKind,
}

impl<I, O> Drop for WaiterGuard<'_, I, O> {
    fn drop(&mut self) {
        let mut state = self.port.inner.state.borrow_mut();
        let id = self.id;
        match self.kind {
            WaiterKind::Next => state.waiters.retain(|(entry, _)| *entry != id),
            WaiterKind::Close => state.close_waiters.retain(|(entry, _)| *entry != id),
        }
    }
}

/// Stream returned by [`ChannelPort::listen`].
pub struct Listen<O> {
    items: mpsc::UnboundedReceiver<O>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    registration: Option<DisposeGuard>,
    done: bool,
}

impl<O> fmt::Debug for Listen<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listen")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<O> Listen<O> {
    fn finish(&mut self) {
        self.done = true;
        self.cancelled = None;
        // Dropping the guard unregisters the listener.
        self.registration = None;
    }
}

impl<O> Stream for Listen<O> {
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<O>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if let Some(cancelled) = this.cancelled.as_mut()
            && cancelled.as_mut().poll(cx).is_ready()
        {
            this.finish();
            return Poll::Ready(None);
        }
        match this.items.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            poll => poll,
        }
    }
}

impl<O> FusedStream for Listen<O> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

/// Create a port whose `send` calls `receiver`.
pub fn create_channel_port<I: 'static, O: 'static>(
    receiver: impl Fn(I) + 'static,
) -> ChannelPort<I, O> {
    ChannelPort::new(receiver)
}

/// Create two cross-wired ports.
///
/// Sending on one notifies the other. Closing either closes both. The ports
/// reference each other weakly; dropping every handle of one side closes
/// the other.
pub fn create_channel<A: 'static, B: 'static>() -> (ChannelPort<A, B>, ChannelPort<B, A>) {
    let input = ChannelPort::<A, B>::unbound();
    let output = ChannelPort::<B, A>::unbound();

    let peer = output.downgrade();
    input.bind(move |data| {
        if let Some(peer) = peer.upgrade() {
            peer.notify(data);
        }
    });
    let peer = input.downgrade();
    output.bind(move |data| {
        if let Some(peer) = peer.upgrade() {
            peer.notify(data);
        }
    });

    let peer = output.downgrade();
    input.on_close(move || {
        if let Some(peer) = peer.upgrade() {
            peer.close();
        }
    });
    let peer = input.downgrade();
    output.on_close(move || {
        if let Some(peer) = peer.upgrade() {
            peer.close();
        }
    });

    (input, output)
}
