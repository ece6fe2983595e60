// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Per-connection session engine. A session binds one remote endpoint
// to one manager, owns the table of resources granted to that
// endpoint, and serializes all work on that table behind one mutex:
// request, release, and teardown on the same session never interleave,
// while distinct sessions proceed fully in parallel.
//
// Message handling is a callback surface — the transport may invoke
// `handle_message` from any thread.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use log::{debug, error, warn};

use crate::channel::Channel;
use crate::error::{Error, Result, STATUS_OK};
use crate::manager::{Manager, ManagerRegistry};
use crate::resource::{DriverHandle, ResourceDriver};
use crate::wire::{self, Message};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// `Connecting` is the `Session::connect` call itself: a session value
/// only exists once the manager lookup succeeded and the positive
/// connect ack went out. A failed lookup sends the negative ack and
/// never constructs the session (straight to closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Closing,
    Closed,
}

/// One granted resource: the driver that issued it and the driver's
/// opaque instance handle. Keyed by the session-local id in `Inner`.
struct ResourceInstance {
    driver: Arc<dyn ResourceDriver>,
    handle: DriverHandle,
    base_address: u32,
}

struct Inner {
    state: State,
    /// id → live instance.
    table: HashMap<u32, ResourceInstance>,
    /// The same ids in acquisition order; teardown walks this front to
    /// back. Always consistent with `table`.
    order: Vec<u32>,
    /// Next id to assign. Starts at 1 and never recycles, so ids are
    /// unique within the session for its whole lifetime.
    next_id: u32,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The live state of one connection between the host and one remote
/// endpoint.
pub struct Session {
    manager: Arc<Manager>,
    channel: Box<dyn Channel>,
    inner: Mutex<Inner>,
}

impl Session {
    /// Bind an incoming connection to the manager named `manager_name`.
    ///
    /// Sends the connect ack over `channel` in both directions of the
    /// outcome: status 0 and a live session on success, a negative
    /// status and [`Error::NotFound`] when the manager is unknown. The
    /// bound manager cannot be unregistered until the session closes.
    pub fn connect(
        managers: &ManagerRegistry,
        manager_name: &str,
        channel: impl Channel + 'static,
    ) -> Result<Arc<Self>> {
        let manager = match managers.find(manager_name) {
            Some(m) => m,
            None => {
                warn!("connect to unknown manager {manager_name}");
                channel.send(&wire::encode_connect_ack(Error::NotFound.to_status()))?;
                return Err(Error::NotFound);
            }
        };

        manager.session_attached();
        if let Err(e) = channel.send(&wire::encode_connect_ack(STATUS_OK)) {
            manager.session_detached();
            return Err(e.into());
        }
        debug!("session bound to manager {manager_name}");

        Ok(Arc::new(Self {
            manager,
            channel: Box::new(channel),
            inner: Mutex::new(Inner {
                state: State::Active,
                table: HashMap::new(),
                order: Vec::new(),
                next_id: 1,
            }),
        }))
    }

    /// The manager this session is bound to.
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Transport callback: decode and dispatch one inbound message.
    ///
    /// Acks follow the protocol (request-class always answered, even
    /// on failure; release-class never answered); the returned error
    /// is the host-local view of the same outcome.
    pub fn handle_message(&self, data: &[u8]) -> Result<()> {
        if !self.is_active() {
            warn!("message after teardown began, dropped");
            return Err(Error::Closed);
        }
        let msg = match wire::decode(data) {
            Ok(msg) => msg,
            Err(e) => {
                error!("malformed message ({} bytes)", data.len());
                // Request-class traffic is always answered, even when
                // truncated, so the remote side is not left waiting.
                // Release-class (and headerless) traffic gets nothing.
                if data.len() >= wire::MSG_HEADER_LEN
                    && wire::read_u32(data, 0) == wire::ACTION_REQUEST
                {
                    self.channel
                        .send(&wire::encode_request_ack(e.to_status(), 0, 0, &[]))?;
                }
                return Err(e);
            }
        };

        match msg {
            Message::Request { resource_index, data } => self.do_request(resource_index, data),
            Message::Release { resource_id } => self.do_release(resource_id),
            Message::Unknown { action } => {
                // Answer so the remote side is not left waiting on a
                // reply to an action we will never understand.
                error!("unknown action {action}");
                self.channel.send(&wire::encode_request_ack(
                    Error::InvalidArgument.to_status(),
                    0,
                    0,
                    &[],
                ))?;
                Err(Error::InvalidArgument)
            }
        }
    }

    /// Tear the session down: release every outstanding resource in
    /// the order it was acquired, then detach from the manager.
    ///
    /// Idempotent; messages delivered once teardown has begun are
    /// rejected without touching the table.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != State::Active {
            return;
        }
        inner.state = State::Closing;

        // Release in acquisition order: later grants may depend on the
        // configuration of earlier ones (a clock retuned for a timer,
        // for example), and the drivers were written for this order.
        let order = std::mem::take(&mut inner.order);
        for id in order {
            let Some(instance) = inner.table.remove(&id) else {
                debug_assert!(false, "order list out of sync with table");
                continue;
            };
            debug!("teardown releasing {} id {id}", instance.driver.name());
            if let Err(e) = instance.driver.release(instance.handle) {
                error!("teardown release of id {id} failed: {e}");
            }
        }

        inner.state = State::Closed;
        drop(inner);
        self.manager.session_detached();
    }

    fn is_active(&self) -> bool {
        self.inner.lock().unwrap().state == State::Active
    }

    /// Number of live resource instances.
    pub fn resource_count(&self) -> usize {
        self.inner.lock().unwrap().table.len()
    }

    /// Live resource ids in acquisition order.
    pub fn resource_ids(&self) -> Vec<u32> {
        self.inner.lock().unwrap().order.clone()
    }

    /// Diagnostic listing of live instances with each driver's
    /// description text. Read-only replacement for a debug filesystem.
    pub fn describe(&self) -> String {
        let inner = self.inner.lock().unwrap();
        let mut out = format!("Resource list for manager {}:\n", self.manager.name());
        for id in &inner.order {
            let instance = &inner.table[id];
            let _ = write!(
                out,
                "\nResource Name:{}\nId:{id}\nBase:{:#010x}\n",
                instance.driver.name(),
                instance.base_address
            );
            if let Some(text) = instance.driver.describe(&instance.handle) {
                out.push_str(&text);
            }
        }
        out
    }

    // -----------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------

    fn do_request(&self, resource_index: u32, args: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != State::Active {
            warn!("request after teardown began, dropped");
            return Err(Error::Closed);
        }

        let outcome = self
            .manager
            .resource(resource_index)
            .cloned()
            .ok_or(Error::InvalidArgument)
            .and_then(|driver| {
                debug!("requesting {} (index {resource_index})", driver.name());
                driver.request(args).map(|acq| (driver, acq))
            });

        match outcome {
            Ok((driver, acq)) => {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.table.insert(
                    id,
                    ResourceInstance {
                        driver,
                        handle: acq.handle,
                        base_address: acq.base_address,
                    },
                );
                inner.order.push(id);
                self.channel.send(&wire::encode_request_ack(
                    STATUS_OK,
                    id,
                    acq.base_address,
                    &acq.echo,
                ))?;
                Ok(())
            }
            Err(e) => {
                error!("request for index {resource_index} failed: {e}");
                self.channel
                    .send(&wire::encode_request_ack(e.to_status(), 0, 0, &[]))?;
                Err(e)
            }
        }
    }

    fn do_release(&self, resource_id: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != State::Active {
            warn!("release after teardown began, dropped");
            return Err(Error::Closed);
        }

        // Release is fire-and-forget on the wire: no ack in either
        // direction, failures are visible to the host only.
        let Some(instance) = inner.table.remove(&resource_id) else {
            warn!("release of unknown resource id {resource_id}");
            return Err(Error::NotFound);
        };
        inner.order.retain(|&id| id != resource_id);

        // The entry is gone before the driver runs; a failing driver
        // release does not put it back.
        debug!("releasing {} id {resource_id}", instance.driver.name());
        if let Err(e) = instance.driver.release(instance.handle) {
            error!("driver release of id {resource_id} failed: {e}");
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Session")
            .field("manager", &self.manager.name())
            .field("state", &inner.state)
            .field("resources", &inner.table.len())
            .finish()
    }
}
