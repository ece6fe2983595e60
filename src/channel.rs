// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Abstract duplex message channel. The concrete transport (in-process
// queue, socket, kernel IPC) lives with the host environment; the
// resource manager only ever sends whole messages and has its inbound
// messages delivered by the host calling `Session::handle_message`.

use std::io;

/// Outbound half of a duplex message channel.
///
/// One `send` transfers one whole message; the transport must not
/// split or merge messages. Implementations may be called from any
/// thread.
pub trait Channel: Send + Sync {
    fn send(&self, data: &[u8]) -> io::Result<()>;
}

impl<T: Channel + ?Sized> Channel for std::sync::Arc<T> {
    fn send(&self, data: &[u8]) -> io::Result<()> {
        (**self).send(data)
    }
}
