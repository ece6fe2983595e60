// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// System DMA channel provider. A request asks for a count of channels;
// the driver allocates them from its pool and writes the assigned
// channel numbers back into the echo payload, which is how the remote
// endpoint learns which channels it was given.
//
// The channel capacity is configuration, not protocol: the request's
// channel array is sized by this driver instance's capacity.

use std::sync::Mutex;

use log::debug;

use crate::error::{Error, Result};
use crate::resource::{Acquisition, DriverHandle, ResourceDriver};
use crate::wire::read_u32;

struct Grant {
    channels: Vec<u32>,
}

/// DMA channel driver over a fixed-size channel pool.
pub struct SdmaDriver {
    capacity: usize,
    /// true = channel is granted out.
    pool: Mutex<Vec<bool>>,
}

impl SdmaDriver {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pool: Mutex::new(vec![false; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of channels currently granted out.
    pub fn in_use(&self) -> usize {
        self.pool.lock().unwrap().iter().filter(|&&b| b).count()
    }

    /// Byte size of the argument struct for this capacity:
    /// `{ num_chs: u32, channels: [i32; capacity] }`.
    pub fn args_len(&self) -> usize {
        4 + 4 * self.capacity
    }
}

impl ResourceDriver for SdmaDriver {
    fn name(&self) -> &str {
        "sdma"
    }

    fn request(&self, args: &[u8]) -> Result<Acquisition> {
        if args.len() != self.args_len() {
            return Err(Error::InvalidArgument);
        }
        let num_chs = read_u32(args, 0);
        debug!("requesting {num_chs} sdma channels");
        if num_chs as usize > self.capacity {
            return Err(Error::InvalidArgument);
        }

        // Allocate all-or-nothing; a partial grant is rolled back
        // before reporting exhaustion.
        let mut pool = self.pool.lock().unwrap();
        let mut channels = Vec::with_capacity(num_chs as usize);
        for _ in 0..num_chs {
            match pool.iter().position(|&busy| !busy) {
                Some(ch) => {
                    pool[ch] = true;
                    channels.push(ch as u32);
                }
                None => {
                    for &ch in &channels {
                        pool[ch as usize] = false;
                    }
                    return Err(Error::ResourceExhausted);
                }
            }
        }
        drop(pool);

        // Write the assigned channel numbers into the echo payload.
        let mut echo = args.to_vec();
        for (i, &ch) in channels.iter().enumerate() {
            let at = 4 + i * 4;
            echo[at..at + 4].copy_from_slice(&(ch as i32).to_le_bytes());
        }

        Ok(Acquisition {
            handle: Box::new(Grant { channels }),
            base_address: 0,
            echo,
        })
    }

    fn release(&self, handle: DriverHandle) -> Result<()> {
        let grant = handle.downcast::<Grant>().map_err(|_| Error::InvalidArgument)?;
        let mut pool = self.pool.lock().unwrap();
        for &ch in &grant.channels {
            debug!("releasing sdma channel {ch}");
            pool[ch as usize] = false;
        }
        Ok(())
    }

    fn describe(&self, handle: &DriverHandle) -> Option<String> {
        let grant = handle.downcast_ref::<Grant>()?;
        let mut out = format!("NumChannels:{}\n", grant.channels.len());
        for (i, ch) in grant.channels.iter().enumerate() {
            out.push_str(&format!("Channel[{i}]:{ch}\n"));
        }
        Some(out)
    }
}
