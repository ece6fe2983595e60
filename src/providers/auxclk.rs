// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Auxiliary clock provider. A request picks a clock, one of its
// allowed parents, and rates for both. Granting reparents the clock;
// releasing restores the parent that was selected before the grant,
// which is why teardown must release grants in acquisition order.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use crate::error::{Error, Result};
use crate::resource::{decode_args, Acquisition, DriverHandle, ResourceDriver};

/// Status reported when a requested rate is outside the supported
/// range. Surfaced verbatim to the remote endpoint.
const STATUS_BAD_RATE: i32 = -34;

/// A selectable parent for an auxiliary clock.
#[derive(Debug, Clone)]
pub struct AuxClkParent {
    pub name: String,
    /// Highest rate (Hz) this parent can be programmed to.
    pub max_rate: u32,
}

/// One grantable auxiliary clock.
#[derive(Debug, Clone)]
pub struct AuxClkDesc {
    pub id: u32,
    pub name: String,
    pub base_address: u32,
    /// Highest output rate (Hz) of the clock itself.
    pub max_rate: u32,
    /// Parents selectable by index in the request args.
    pub parents: Vec<AuxClkParent>,
}

struct ClkState {
    granted: bool,
    /// Currently selected parent index; survives release/re-grant.
    parent: u32,
}

struct Grant {
    clk_id: u32,
    clk_rate: u32,
    pclk_id: u32,
    pclk_rate: u32,
    /// Parent selected before this grant; restored on release.
    old_parent: u32,
}

/// Auxiliary clock driver over a fixed board table.
pub struct AuxClkDriver {
    clocks: Vec<AuxClkDesc>,
    state: Mutex<HashMap<u32, ClkState>>,
}

impl AuxClkDriver {
    pub fn new(clocks: Vec<AuxClkDesc>) -> Self {
        let state = clocks
            .iter()
            .map(|c| (c.id, ClkState { granted: false, parent: 0 }))
            .collect();
        Self {
            clocks,
            state: Mutex::new(state),
        }
    }

    /// Currently selected parent index of clock `id` (tests and
    /// diagnostics).
    pub fn current_parent(&self, id: u32) -> Option<u32> {
        self.state.lock().unwrap().get(&id).map(|s| s.parent)
    }

    fn desc(&self, id: u32) -> Option<&AuxClkDesc> {
        self.clocks.iter().find(|c| c.id == id)
    }
}

impl ResourceDriver for AuxClkDriver {
    fn name(&self) -> &str {
        "auxclk"
    }

    // Args: { clk_id: u32, clk_rate: u32, pclk_id: u32, pclk_rate: u32 },
    // exactly 16 bytes.
    fn request(&self, args: &[u8]) -> Result<Acquisition> {
        let [clk_id, clk_rate, pclk_id, pclk_rate] = decode_args::<4>(args)?;
        debug!("requesting auxclk id {clk_id}, parent id {pclk_id}");

        let desc = self.desc(clk_id).ok_or(Error::InvalidArgument)?;
        let parent = desc.parents.get(pclk_id as usize).ok_or(Error::NotFound)?;
        if pclk_rate > parent.max_rate || clk_rate > desc.max_rate {
            return Err(Error::Driver(STATUS_BAD_RATE));
        }

        let mut state = self.state.lock().unwrap();
        let clk = state.get_mut(&clk_id).ok_or(Error::InvalidArgument)?;
        if clk.granted {
            return Err(Error::Busy);
        }
        let old_parent = clk.parent;
        clk.granted = true;
        clk.parent = pclk_id;

        Ok(Acquisition {
            handle: Box::new(Grant {
                clk_id,
                clk_rate,
                pclk_id,
                pclk_rate,
                old_parent,
            }),
            base_address: desc.base_address,
            echo: args.to_vec(),
        })
    }

    fn release(&self, handle: DriverHandle) -> Result<()> {
        let grant = handle.downcast::<Grant>().map_err(|_| Error::InvalidArgument)?;
        debug!(
            "releasing auxclk id {}, parent id {}",
            grant.clk_id, grant.pclk_id
        );
        let mut state = self.state.lock().unwrap();
        let clk = state.get_mut(&grant.clk_id).ok_or(Error::InvalidArgument)?;
        clk.granted = false;
        clk.parent = grant.old_parent;
        Ok(())
    }

    fn describe(&self, handle: &DriverHandle) -> Option<String> {
        let grant = handle.downcast_ref::<Grant>()?;
        let desc = self.desc(grant.clk_id)?;
        let pname = desc
            .parents
            .get(grant.pclk_id as usize)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        Some(format!(
            "Clock:{}\nRate:{}\nParent:{pname}\nParentRate:{}\n",
            desc.name, grant.clk_rate, grant.pclk_rate
        ))
    }
}
