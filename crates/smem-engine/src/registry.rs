//! Which scenario owns which allocated resource.

use indexmap::IndexMap;
use smallvec::SmallVec;
use smem_core::{Handle, ResourceId, ScenarioId};

/// Allocator handles of one registered resource, in requirement order.
pub type HandleList = SmallVec<[Handle; 4]>;

/// One registered resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ownership {
    /// Scenario currently accountable for the resource.
    pub owner: ScenarioId,
    /// Handles granted for it.
    pub handles: HandleList,
}

/// Resource → owner registry, in allocation order.
///
/// A resource appears at most once. Reassigning the owner keeps its
/// position, so the order always reflects when the memory was allocated.
#[derive(Clone, Debug, Default)]
pub struct OwnershipRegistry {
    entries: IndexMap<ResourceId, Ownership>,
}

impl OwnershipRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly allocated resource.
    pub(crate) fn insert(&mut self, resource: ResourceId, owner: ScenarioId, handles: HandleList) {
        self.entries.insert(resource, Ownership { owner, handles });
    }

    /// Remove a resource, returning its entry.
    pub(crate) fn remove(&mut self, resource: ResourceId) -> Option<Ownership> {
        self.entries.shift_remove(&resource)
    }

    /// Drop one freed handle from a resource's entry. The entry itself
    /// stays, even when no handles remain.
    pub(crate) fn forget(&mut self, resource: ResourceId, handle: Handle) {
        if let Some(e) = self.entries.get_mut(&resource) {
            e.handles.retain(|h| *h != handle);
        }
    }

    /// Change the owner of a registered resource. Returns the previous owner.
    pub(crate) fn reassign(&mut self, resource: ResourceId, owner: ScenarioId) -> Option<ScenarioId> {
        self.entries
            .get_mut(&resource)
            .map(|e| std::mem::replace(&mut e.owner, owner))
    }

    /// Whether `resource` is registered.
    pub fn contains(&self, resource: ResourceId) -> bool {
        self.entries.contains_key(&resource)
    }

    /// Owner of a registered resource.
    pub fn owner(&self, resource: ResourceId) -> Option<ScenarioId> {
        self.entries.get(&resource).map(|e| e.owner)
    }

    /// Entry of a registered resource.
    pub fn get(&self, resource: ResourceId) -> Option<&Ownership> {
        self.entries.get(&resource)
    }

    /// Entries in allocation order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (ResourceId, &Ownership)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Resources owned by `owner`, in allocation order.
    pub fn owned_by(&self, owner: ScenarioId) -> Vec<ResourceId> {
        self.iter()
            .filter(|(_, e)| e.owner == owner)
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
