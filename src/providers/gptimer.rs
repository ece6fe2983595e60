// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// General-purpose timer provider. Each timer is an exclusive grant:
// a request names a timer id and a source clock; the timer stays
// unavailable until released.

use std::collections::HashSet;
use std::sync::Mutex;

use log::debug;

use crate::error::{Error, Result};
use crate::resource::{decode_args, Acquisition, DriverHandle, ResourceDriver};

/// One grantable timer.
#[derive(Debug, Clone)]
pub struct GpTimerDesc {
    /// Timer id as the remote endpoint names it.
    pub id: u32,
    /// Device base address, echoed in the ack header.
    pub base_address: u32,
    /// Source clock ids this timer accepts.
    pub sources: Vec<u32>,
}

struct Grant {
    id: u32,
    src_clk: u32,
}

/// Timer driver over a fixed board table.
pub struct GpTimerDriver {
    timers: Vec<GpTimerDesc>,
    granted: Mutex<HashSet<u32>>,
}

impl GpTimerDriver {
    pub fn new(timers: Vec<GpTimerDesc>) -> Self {
        Self {
            timers,
            granted: Mutex::new(HashSet::new()),
        }
    }

    /// Whether the timer with `id` is currently granted.
    pub fn is_granted(&self, id: u32) -> bool {
        self.granted.lock().unwrap().contains(&id)
    }
}

impl ResourceDriver for GpTimerDriver {
    fn name(&self) -> &str {
        "gptimer"
    }

    // Args: { id: u32, src_clk: u32 }, exactly 8 bytes.
    fn request(&self, args: &[u8]) -> Result<Acquisition> {
        let [id, src_clk] = decode_args::<2>(args)?;
        debug!("requesting gptimer id {id}, source {src_clk}");

        let desc = self
            .timers
            .iter()
            .find(|t| t.id == id)
            .ok_or(Error::InvalidArgument)?;
        if !desc.sources.contains(&src_clk) {
            return Err(Error::InvalidArgument);
        }

        let mut granted = self.granted.lock().unwrap();
        if !granted.insert(id) {
            return Err(Error::Busy);
        }

        Ok(Acquisition {
            handle: Box::new(Grant { id, src_clk }),
            base_address: desc.base_address,
            echo: args.to_vec(),
        })
    }

    fn release(&self, handle: DriverHandle) -> Result<()> {
        let grant = handle.downcast::<Grant>().map_err(|_| Error::InvalidArgument)?;
        debug!("releasing gptimer id {}, source {}", grant.id, grant.src_clk);
        self.granted.lock().unwrap().remove(&grant.id);
        Ok(())
    }

    fn describe(&self, handle: &DriverHandle) -> Option<String> {
        let grant = handle.downcast_ref::<Grant>()?;
        Some(format!("Gptimer:{}\nSource:{}\n", grant.id, grant.src_clk))
    }
}
