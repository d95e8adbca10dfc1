//! Resource-level allocation with weight budgets and rollback.
//!
//! [`ResourceManager`] turns a catalog resource into allocator calls, one
//! per requirement size, and records the result in the
//! [`OwnershipRegistry`]. Before allocating it evicts registered resources
//! of the same group until the group's weights fit the budget.

use std::sync::Arc;

use smem_alloc::{AllocError, AllocRequest, RegionAllocator};
use smem_core::{Catalog, RegionSet, ResourceDef, ResourceId, ScenarioId};

use crate::config::{ConfigError, EngineConfig, EvictionPolicy};
use crate::error::EngineError;
use crate::metrics::EngineMetrics;
use crate::registry::{HandleList, OwnershipRegistry};

/// Allocates and frees catalog resources on behalf of scenarios.
#[derive(Debug)]
pub struct ResourceManager<A> {
    catalog: Arc<Catalog>,
    allocator: A,
    config: EngineConfig,
    registry: OwnershipRegistry,
    metrics: EngineMetrics,
    poisoned: bool,
}

impl<A: RegionAllocator> ResourceManager<A> {
    /// Build a manager over `allocator`.
    ///
    /// Fails if the config is invalid or the catalog names a region the
    /// allocator does not manage.
    pub fn new(
        catalog: Arc<Catalog>,
        allocator: A,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate(&catalog)?;
        let regions: Vec<_> = allocator.regions().iter().map(|r| r.id).collect();
        catalog.check_regions(&regions)?;
        Ok(Self {
            catalog,
            allocator,
            config,
            registry: OwnershipRegistry::new(),
            metrics: EngineMetrics::default(),
            poisoned: false,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The allocator.
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// The engine config.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The ownership registry.
    pub fn registry(&self) -> &OwnershipRegistry {
        &self.registry
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut EngineMetrics {
        &mut self.metrics
    }

    /// Whether an invariant violation has made the manager unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Consume the manager, returning its allocator.
    pub fn into_allocator(self) -> A {
        self.allocator
    }

    // ── Poisoning ──────────────────────────────────────────────────

    pub(crate) fn guard(&self) -> Result<(), EngineError> {
        if self.poisoned {
            Err(EngineError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Convert an allocator error, poisoning on a fatal one.
    pub(crate) fn absorb(&mut self, err: AllocError) -> EngineError {
        if err.is_fatal() && !self.poisoned {
            tracing::error!("allocator invariant violated, engine poisoned: {err}");
            self.poisoned = true;
        }
        EngineError::Alloc(err)
    }

    fn resource_def(&self, id: ResourceId) -> Result<&ResourceDef, EngineError> {
        self.catalog
            .resource(id)
            .ok_or(EngineError::UnknownResource { id })
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Allocate `resource` for `owner`.
    ///
    /// A resource that is already registered is not allocated again; its
    /// owner becomes `owner`. Otherwise registered resources of the same
    /// group are evicted, in [`EvictionPolicy`] order, until the group's
    /// weights plus this one fit the budget. Then one allocator call is
    /// made per requirement size. If any call fails, every handle granted
    /// by this call is freed and the error is returned; handles the
    /// rollback could not free stay registered to `owner`.
    pub fn resource_alloc(
        &mut self,
        owner: ScenarioId,
        resource: ResourceId,
    ) -> Result<(), EngineError> {
        self.guard()?;
        let catalog = Arc::clone(&self.catalog);
        let def = catalog
            .resource(resource)
            .ok_or(EngineError::UnknownResource { id: resource })?;

        if self.registry.contains(resource) {
            self.registry.reassign(resource, owner);
            tracing::debug!(resource = %def.name, %owner, "already allocated, reassigned");
            return Ok(());
        }
        tracing::debug!(
            resource = %def.name,
            group = %def.group,
            weight = def.weight,
            "+R"
        );

        self.make_room(def)?;

        let mut handles = HandleList::new();
        for req in def.requirements.iter().filter(|r| !r.is_empty()) {
            for &size in req.sizes() {
                let request =
                    AllocRequest::new(&def.name, size, req.regions()).with_flags(def.flags);
                match self.allocator.alloc(&request) {
                    Ok(handle) => handles.push(handle),
                    Err(err) => return Err(self.unwind(owner, def, handles, err)),
                }
            }
        }

        self.registry.insert(resource, owner, handles);
        self.metrics.resources_allocated += 1;
        let occupancy = self.allocator.occupancy();
        self.metrics.record_occupancy(&occupancy);
        Ok(())
    }

    /// Evict same-group resources until `def` fits the budget.
    fn make_room(&mut self, def: &ResourceDef) -> Result<(), EngineError> {
        let budget = self.config.weight_budget;
        let mut members: Vec<(ResourceId, u32)> = self
            .registry
            .iter()
            .filter_map(|(id, _)| {
                let r = self.catalog.resource(id)?;
                (r.group == def.group).then_some((id, r.weight))
            })
            .collect();
        let mut sum: u32 = members.iter().map(|(_, w)| w).sum();
        if sum + def.weight <= budget {
            return Ok(());
        }

        match self.config.eviction {
            EvictionPolicy::NewestFirst => members.reverse(),
            EvictionPolicy::OldestFirst => {}
            EvictionPolicy::LightestFirst => {
                members.reverse();
                members.sort_by_key(|(_, w)| *w);
            }
        }

        for (victim, weight) in members {
            if sum + def.weight <= budget {
                break;
            }
            tracing::info!(
                group = %def.group,
                "weight over ({sum}+{} for {}), evicting {}",
                def.weight,
                def.name,
                self.resource_def(victim).map_or("?", |r| r.name.as_str())
            );
            self.resource_free(victim)?;
            self.metrics.resources_evicted += 1;
            sum -= weight;
        }
        Ok(())
    }

    /// Free the handles granted so far by a failed allocation.
    ///
    /// Every handle is attempted even if an earlier free fails. Handles
    /// that could not be freed are registered to `owner` so a later
    /// [`resource_free`](Self::resource_free) can retry them; the first
    /// free error is then returned instead of `cause`.
    fn unwind(
        &mut self,
        owner: ScenarioId,
        def: &ResourceDef,
        handles: HandleList,
        cause: AllocError,
    ) -> EngineError {
        tracing::debug!(
            resource = %def.name,
            granted = handles.len(),
            "allocation failed, rolling back: {cause}"
        );
        self.metrics.rollbacks += 1;
        let cause = self.absorb(cause);
        let mut stuck = HandleList::new();
        let mut failure = None;
        for handle in handles.into_iter().rev() {
            if let Err(err) = self.allocator.free(handle) {
                tracing::error!(resource = %def.name, %handle, "rollback free failed: {err}");
                stuck.push(handle);
                failure = failure.or(Some(err));
            }
        }
        let Some(err) = failure else {
            return cause;
        };
        stuck.reverse();
        self.registry.insert(def.id, owner, stuck);
        self.absorb(err)
    }

    /// Free every handle of `resource` and unregister it.
    ///
    /// Freeing an unregistered resource is a logged no-op; the return
    /// value says whether anything was freed. If the allocator fails
    /// partway, the handles already freed are dropped from the entry and
    /// the rest stay registered, so calling this again resumes.
    pub fn resource_free(&mut self, resource: ResourceId) -> Result<bool, EngineError> {
        self.guard()?;
        let name = self.resource_def(resource)?.name.clone();
        let Some(entry) = self.registry.get(resource) else {
            tracing::warn!(resource = %name, "free of a resource that is not allocated");
            return Ok(false);
        };
        tracing::debug!(resource = %name, owner = %entry.owner, "-R");
        let handles = entry.handles.clone();
        for handle in handles {
            if let Err(err) = self.allocator.free(handle) {
                return Err(self.absorb(err));
            }
            self.registry.forget(resource, handle);
        }
        self.registry.remove(resource);
        self.metrics.resources_freed += 1;
        Ok(true)
    }

    /// Give a registered resource to `owner` without reallocating it.
    pub(crate) fn hold(&mut self, resource: ResourceId, owner: ScenarioId) -> bool {
        if self.registry.reassign(resource, owner).is_some() {
            self.metrics.resources_held += 1;
            true
        } else {
            false
        }
    }

    // ── Introspection ──────────────────────────────────────────────

    /// Total requested bytes of every registered resource, grouped by
    /// candidate region set and sorted by region order.
    pub fn requested_bytes(&self) -> Vec<(RegionSet, u64)> {
        let mut totals: Vec<(RegionSet, u64)> = Vec::new();
        for (id, _) in self.registry.iter() {
            let Some(def) = self.catalog.resource(id) else {
                continue;
            };
            for req in &def.requirements {
                if req.is_empty() {
                    continue;
                }
                match totals.iter_mut().find(|(set, _)| set == req.regions()) {
                    Some((_, total)) => *total += req.total_bytes(),
                    None => totals.push((req.regions().clone(), req.total_bytes())),
                }
            }
        }
        totals.sort_by(|(a, _), (b, _)| a.as_slice().cmp(b.as_slice()));
        totals
    }

    /// `(owner, resource)` pairs of the registry, in allocation order.
    pub fn allocated_mapping(&self) -> Vec<(ScenarioId, ResourceId)> {
        self.registry.iter().map(|(id, e)| (e.owner, id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smem_alloc::{AllocatorConfig, SimAllocator};
    use smem_core::{RegionId, RegionInfo};

    const UNIT: u64 = 512 * 1024;

    fn sim(chunks: u64) -> SimAllocator {
        SimAllocator::new(
            &AllocatorConfig::default(),
            &[
                RegionInfo::new(RegionId(0), 0x1000_0000, chunks * UNIT),
                RegionInfo::new(RegionId(1), 0x2000_0000, chunks * UNIT),
            ],
        )
        .unwrap()
    }

    fn catalog() -> Arc<Catalog> {
        let a: &[RegionId] = &[RegionId(0)];
        let b: &[RegionId] = &[RegionId(1)];
        let ab: &[RegionId] = &[RegionId(0), RegionId(1)];
        Arc::new(
            Catalog::builder()
                .resource("X", 2, 50, 0, &[(a, &[1.0, 2.0])])
                .resource("Y", 2, 60, 0, &[(b, &[1.0])])
                .resource("Z", 2, 30, 0, &[(ab, &[0.5])])
                .resource("BIG", 3, 10, 0, &[(a, &[1.0]), (b, &[64.0])])
                .resource("EMPTY", 4, 0, 0, &[])
                .build()
                .unwrap(),
        )
    }

    fn manager(policy: EvictionPolicy) -> ResourceManager<SimAllocator> {
        let config = EngineConfig {
            eviction: policy,
            ..EngineConfig::default()
        };
        ResourceManager::new(catalog(), sim(16), config).unwrap()
    }

    fn id(m: &ResourceManager<SimAllocator>, name: &str) -> ResourceId {
        m.catalog().resource_id(name).unwrap()
    }

    #[test]
    fn one_handle_per_size_largest_first() {
        let mut m = manager(EvictionPolicy::default());
        let x = id(&m, "X");
        m.resource_alloc(ScenarioId(0), x).unwrap();
        let handles = m.registry().get(x).unwrap().handles.clone();
        assert_eq!(handles.len(), 2);
        let first = m.allocator().handle_info(handles[0]).unwrap();
        assert_eq!(first.owner.requested, 2 * 1024 * 1024);
        assert_eq!(first.owner.description, "X");
        assert_eq!(m.allocator().occupied_bytes(RegionId(0)), 6 * UNIT);
    }

    #[test]
    fn budget_evicts_same_group() {
        let mut m = manager(EvictionPolicy::default());
        let (x, y) = (id(&m, "X"), id(&m, "Y"));
        m.resource_alloc(ScenarioId(0), x).unwrap();
        m.resource_alloc(ScenarioId(1), y).unwrap();
        assert!(!m.registry().contains(x));
        assert!(m.registry().contains(y));
        assert_eq!(m.allocator().occupied_bytes(RegionId(0)), 0);
        assert_eq!(m.metrics().resources_evicted, 1);
    }

    #[test]
    fn eviction_policies_pick_different_victims() {
        // X(50) then Z(30) registered; Y(60) needs 40 more room.
        let victims = |policy| {
            let mut m = manager(policy);
            let (x, y, z) = (id(&m, "X"), id(&m, "Y"), id(&m, "Z"));
            m.resource_alloc(ScenarioId(0), x).unwrap();
            m.resource_alloc(ScenarioId(0), z).unwrap();
            m.resource_alloc(ScenarioId(1), y).unwrap();
            (m.registry().contains(x), m.registry().contains(z))
        };
        // Newest first drops Z (sum 50+60 still over), then X.
        assert_eq!(victims(EvictionPolicy::NewestFirst), (false, false));
        // Oldest first drops X only: 30 + 60 fits.
        assert_eq!(victims(EvictionPolicy::OldestFirst), (false, true));
        // Lightest first drops Z, then X.
        assert_eq!(victims(EvictionPolicy::LightestFirst), (false, false));
    }

    #[test]
    fn failed_allocation_rolls_back() {
        let mut m = manager(EvictionPolicy::default());
        let big = id(&m, "BIG");
        let err = m.resource_alloc(ScenarioId(0), big).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Alloc(AllocError::AllocationExhausted { .. })
        ));
        assert!(m.registry().is_empty());
        assert!(m.allocator().ledger().is_clear());
        assert_eq!(m.metrics().rollbacks, 1);
        assert!(!m.is_poisoned());
    }

    #[test]
    fn realloc_of_registered_resource_reassigns() {
        let mut m = manager(EvictionPolicy::default());
        let x = id(&m, "X");
        m.resource_alloc(ScenarioId(0), x).unwrap();
        let before = m.allocator().handles();
        m.resource_alloc(ScenarioId(3), x).unwrap();
        assert_eq!(m.allocator().handles(), before);
        assert_eq!(m.registry().owner(x), Some(ScenarioId(3)));
    }

    #[test]
    fn free_of_unregistered_is_noop() {
        let mut m = manager(EvictionPolicy::default());
        let x = id(&m, "X");
        assert_eq!(m.resource_free(x), Ok(false));
        assert_eq!(
            m.resource_free(ResourceId(99)),
            Err(EngineError::UnknownResource { id: ResourceId(99) })
        );
    }

    #[test]
    fn empty_resource_registers_without_handles() {
        let mut m = manager(EvictionPolicy::default());
        let e = id(&m, "EMPTY");
        m.resource_alloc(ScenarioId(0), e).unwrap();
        assert!(m.registry().get(e).unwrap().handles.is_empty());
        assert_eq!(m.resource_free(e), Ok(true));
    }

    #[test]
    fn requested_bytes_grouped_by_region_set() {
        let mut m = manager(EvictionPolicy::default());
        let (x, z) = (id(&m, "X"), id(&m, "Z"));
        m.resource_alloc(ScenarioId(0), x).unwrap();
        m.resource_alloc(ScenarioId(1), z).unwrap();
        let totals = m.requested_bytes();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].0.as_slice(), &[RegionId(0)]);
        assert_eq!(totals[0].1, 3 * 1024 * 1024);
        assert_eq!(totals[1].0.as_slice(), &[RegionId(0), RegionId(1)]);
        assert_eq!(totals[1].1, 512 * 1024);
        assert_eq!(
            m.allocated_mapping(),
            vec![(ScenarioId(0), x), (ScenarioId(1), z)]
        );
    }

    #[test]
    fn rejects_catalog_with_unknown_region() {
        let c = Arc::new(
            Catalog::builder()
                .resource("FAR", 1, 10, 0, &[(&[RegionId(5)], &[1.0])])
                .build()
                .unwrap(),
        );
        let err = ResourceManager::new(c, sim(4), EngineConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Catalog(_)));
    }
}
