// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A manager is one remote endpoint's resource namespace: a globally
// unique name plus an ordered array of resource drivers, addressed by
// index on the wire. The manager registry binds incoming connections
// to managers by name and refuses to drop a manager while sessions
// still reference it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use log::debug;

use crate::error::{Error, Result};
use crate::registry::ResourceRegistry;
use crate::resource::ResourceDriver;

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// A named, index-addressed set of resource drivers.
///
/// The driver array is fixed at construction; the wire protocol selects
/// a driver by its position in this array, so the order is part of the
/// contract with the remote firmware.
pub struct Manager {
    name: String,
    resources: Vec<Arc<dyn ResourceDriver>>,
    /// Live sessions bound to this manager. Guards unregistration.
    sessions: AtomicUsize,
}

impl Manager {
    /// Build a manager directly from a driver list.
    pub fn new(name: impl Into<String>, resources: Vec<Arc<dyn ResourceDriver>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            resources,
            sessions: AtomicUsize::new(0),
        })
    }

    /// Build a manager by pulling named drivers out of a registry, in
    /// the given order. Fails with [`Error::NotFound`] on the first
    /// unknown name.
    pub fn assemble(
        name: impl Into<String>,
        registry: &ResourceRegistry,
        resource_names: &[&str],
    ) -> Result<Arc<Self>> {
        let mut resources = Vec::with_capacity(resource_names.len());
        for rn in resource_names {
            resources.push(registry.find(rn).ok_or(Error::NotFound)?);
        }
        Ok(Self::new(name, resources))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver at `index`, as addressed by the wire protocol.
    pub fn resource(&self, index: u32) -> Option<&Arc<dyn ResourceDriver>> {
        self.resources.get(index as usize)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of sessions currently bound to this manager.
    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::Acquire)
    }

    /// Take a session reference. Called when a session binds; keeps
    /// `unregister` failing with `Busy` until the matching
    /// `session_detached`.
    pub(crate) fn session_attached(&self) {
        self.sessions.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn session_detached(&self) {
        let prev = self.sessions.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "session count underflow on {}", self.name);
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.name)
            .field("resources", &self.resources.len())
            .field("sessions", &self.session_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ManagerRegistry
// ---------------------------------------------------------------------------

/// Registry of managers, keyed by manager name.
///
/// Looked up exactly once per incoming connection; after binding, a
/// session holds its own `Arc<Manager>` and registry mutations no
/// longer affect it.
#[derive(Default)]
pub struct ManagerRegistry {
    table: RwLock<HashMap<String, Arc<Manager>>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manager. Fails with [`Error::AlreadyExists`] if the name
    /// is taken.
    pub fn register(&self, manager: Arc<Manager>) -> Result<()> {
        if manager.name().is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut table = self.table.write().unwrap();
        if table.contains_key(manager.name()) {
            return Err(Error::AlreadyExists);
        }
        debug!(
            "registering manager {} ({} resources)",
            manager.name(),
            manager.resource_count()
        );
        table.insert(manager.name().to_owned(), manager);
        Ok(())
    }

    /// Remove a manager by name. Fails with [`Error::Busy`] while any
    /// session is still bound to it, [`Error::NotFound`] if absent.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut table = self.table.write().unwrap();
        let manager = table.get(name).ok_or(Error::NotFound)?;
        if manager.session_count() > 0 {
            return Err(Error::Busy);
        }
        table.remove(name);
        debug!("unregistered manager {name}");
        Ok(())
    }

    /// Look up a manager by name.
    pub fn find(&self, name: &str) -> Option<Arc<Manager>> {
        self.table.read().unwrap().get(name).cloned()
    }

    /// Names of all registered managers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}
