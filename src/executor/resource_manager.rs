//! Table of stateful resources created while graphs execute.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A stateful handle owned by the resource manager (hash tables, iterators...)
pub trait Resource: Any + Send {
    /// Free whatever the resource holds. Called once, on disposal or replacement.
    fn release(&mut self) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Identifier handed out by `ResourceManager::add_resource`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

#[derive(Default)]
struct Table {
    next_id: u64,
    resources: HashMap<ResourceId, Box<dyn Resource>>,
    by_name: HashMap<String, ResourceId>,
}

/// Resources shared by every executor of one model.
///
/// Executors hold the manager through an `Arc`; entries written by the
/// initializer graph are visible to the primary graph.
#[derive(Default)]
pub struct ResourceManager {
    table: Mutex<Table>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a resource under a name.
    ///
    /// A resource already registered under the same name is released and
    /// replaced; the new entry gets a fresh id.
    pub fn add_resource(&self, name: impl Into<String>, resource: Box<dyn Resource>) -> ResourceId {
        let name = name.into();
        let mut table = self.lock();

        let id = ResourceId(table.next_id);
        table.next_id += 1;

        if let Some(previous) = table.by_name.insert(name.clone(), id) {
            if let Some(mut old) = table.resources.remove(&previous) {
                tracing::debug!("Replacing resource '{}' ({})", name, previous);
                old.release();
            }
        }
        table.resources.insert(id, resource);
        id
    }

    pub fn id_by_name(&self, name: &str) -> Option<ResourceId> {
        self.lock().by_name.get(name).copied()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.lock().resources.contains_key(&id)
    }

    /// Run `f` against a resource of concrete type `R`.
    ///
    /// Returns `None` if the id is unknown or the resource has another type.
    pub fn with_resource<R, T>(&self, id: ResourceId, f: impl FnOnce(&mut R) -> T) -> Option<T>
    where
        R: Resource,
    {
        let mut table = self.lock();
        let resource = table.resources.get_mut(&id)?;
        resource.as_any_mut().downcast_mut::<R>().map(f)
    }

    pub fn len(&self) -> usize {
        self.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().resources.is_empty()
    }

    /// Release every resource and clear the table, returning how many were released
    pub fn dispose(&self) -> usize {
        let mut table = self.lock();
        let released = table.resources.len();

        for (_, mut resource) in table.resources.drain() {
            resource.release();
        }
        table.by_name.clear();

        if released > 0 {
            tracing::debug!("Released {} resources", released);
        }
        released
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();
        let mut names: Vec<&str> = table.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ResourceManager").field("resources", &names).finish()
    }
}
