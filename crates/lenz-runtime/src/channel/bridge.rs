#![forbid(unsafe_code)]

//! Exposing a [`Ref`] as a [`ChannelPort`].

use super::port::{ChannelPort, create_channel_port};
use crate::reactive::{Ref, WatchOptions};

impl<T: Clone + PartialEq + 'static> Ref<T> {
    /// A port mirroring this ref.
    ///
    /// `send` writes the ref; every change of the ref is notified on the
    /// port. The underlying watcher belongs to the runtime's current scope
    /// and stops when the port closes or its last handle is dropped. If
    /// the ref's runtime is gone the port is returned already closed.
    pub fn as_port(&self) -> ChannelPort<T, T> {
        let target = self.clone();
        let port = create_channel_port(move |data: T| target.set(data));

        let Some(runtime) = self.runtime() else {
            tracing::warn!("ref outlived its runtime; port created closed");
            port.close();
            return port;
        };

        let weak = port.downgrade();
        let stop = runtime.watch(
            self.clone(),
            move |value: &T, _: Option<&T>| {
                if let Some(port) = weak.upgrade() {
                    port.notify(value.clone());
                }
            },
            WatchOptions::default(),
        );
        port.on_close(move || stop.dispose());
        port
    }
}
