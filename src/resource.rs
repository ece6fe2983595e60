// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The resource driver seam: everything a provider must implement so
// the session engine can grant and revoke instances of its resource
// kind without knowing anything about the hardware behind it.

use std::any::Any;

use crate::error::{Error, Result};

/// Opaque per-instance state returned by a driver's `request`.
///
/// Only the issuing driver ever looks inside (by downcasting); the
/// session stores it untouched and hands it back at release time.
pub type DriverHandle = Box<dyn Any + Send>;

/// Result of a successful `request`.
pub struct Acquisition {
    /// Driver-private instance state, passed back to `release`.
    pub handle: DriverHandle,
    /// Device address of the granted resource, echoed in the ack
    /// header. Zero when the resource has no meaningful address.
    pub base_address: u32,
    /// Payload appended verbatim after the ack header. Usually the
    /// request arguments, possibly rewritten by the driver (e.g. with
    /// assigned channel numbers).
    pub echo: Vec<u8>,
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The handle is driver-private and deliberately opaque.
        f.debug_struct("Acquisition")
            .field("base_address", &self.base_address)
            .field("echo_len", &self.echo.len())
            .finish_non_exhaustive()
    }
}

/// One kind of grantable resource.
///
/// `request` and `release` may block on hardware; the session engine
/// never holds a registry lock across these calls. Implementations
/// must be safe to call from multiple sessions concurrently.
pub trait ResourceDriver: Send + Sync {
    /// Resource-type name, unique within the registry it is added to.
    fn name(&self) -> &str;

    /// Grant one instance. `args` is the raw request payload; drivers
    /// validate its size and contents before touching any state.
    fn request(&self, args: &[u8]) -> Result<Acquisition>;

    /// Revoke a previously granted instance.
    fn release(&self, handle: DriverHandle) -> Result<()>;

    /// Human-readable description of a live instance, for diagnostic
    /// listings. Optional.
    fn describe(&self, _handle: &DriverHandle) -> Option<String> {
        None
    }
}

/// Fixed-width argument reader shared by the providers: checks that
/// `args` is exactly `words * 4` bytes and returns the decoded words.
pub(crate) fn decode_args<const N: usize>(args: &[u8]) -> Result<[u32; N]> {
    if args.len() != N * 4 {
        return Err(Error::InvalidArgument);
    }
    let mut out = [0u32; N];
    for (i, w) in out.iter_mut().enumerate() {
        *w = crate::wire::read_u32(args, i * 4);
    }
    Ok(out)
}
