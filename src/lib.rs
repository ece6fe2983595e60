// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Host-side resource manager for remote processors.
//
// A server grants and revokes hardware resources (timers, auxiliary
// clocks, DMA channels) to untrusted remote endpoints over an
// abstract duplex message channel. The pieces:
//
// - `ResourceRegistry` — resource-type name → driver table
// - `Manager`          — one endpoint's namespace: an index-addressed
//                        driver array behind a globally unique name
// - `Session`          — one live connection: handle table, dispatch,
//                        ordered teardown
// - `wire`             — the request/release/ack codec
//
// The transport is an external collaborator: it implements `Channel`
// for the outbound direction and calls `Session::handle_message` for
// the inbound one.

pub mod error;
pub use error::{Error, Result};

pub mod wire;

mod channel;
pub use channel::Channel;

mod resource;
pub use resource::{Acquisition, DriverHandle, ResourceDriver};

mod registry;
pub use registry::ResourceRegistry;

mod manager;
pub use manager::{Manager, ManagerRegistry};

mod session;
pub use session::Session;

pub mod providers;
