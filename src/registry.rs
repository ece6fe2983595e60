// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Table of available resource drivers, keyed by resource-type name.
// Providers register their drivers at startup; managers are assembled
// from the table by naming the drivers they expose.
//
// Mutated rarely (provider load/unload), read at manager-assembly
// time, so a read/write lock fits. The lock is only ever held around
// the table operation itself, never across driver calls.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::error::{Error, Result};
use crate::resource::ResourceDriver;

/// Registry of resource drivers.
///
/// Instance-based on purpose: hosts typically keep one per process,
/// tests keep one per case. Cloning shares the underlying table.
#[derive(Default)]
pub struct ResourceRegistry {
    table: RwLock<HashMap<String, Arc<dyn ResourceDriver>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a driver. Fails with [`Error::AlreadyExists`] if a driver
    /// of the same name is already registered.
    pub fn register(&self, driver: Arc<dyn ResourceDriver>) -> Result<()> {
        let name = driver.name().to_owned();
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut table = self.table.write().unwrap();
        if table.contains_key(&name) {
            return Err(Error::AlreadyExists);
        }
        debug!("registering resource driver {name}");
        table.insert(name, driver);
        Ok(())
    }

    /// Remove a driver by name. Fails with [`Error::InvalidArgument`]
    /// if the name is unknown. Sessions that already hold the driver
    /// through a manager keep their reference; only future lookups
    /// are affected.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut table = self.table.write().unwrap();
        match table.remove(name) {
            Some(_) => {
                debug!("unregistered resource driver {name}");
                Ok(())
            }
            None => Err(Error::InvalidArgument),
        }
    }

    /// Look up a driver by name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn ResourceDriver>> {
        self.table.read().unwrap().get(name).cloned()
    }

    /// Names of all registered drivers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().unwrap().is_empty()
    }
}
