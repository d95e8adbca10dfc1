//! Scenario lifecycle: start, stop, hold, and group exclusion.
//!
//! A scenario is Stopped or Running. Starting one:
//!
//! 1. does nothing if it is already running;
//! 2. takes over (holds) every required resource that is already
//!    allocated, whoever owns it, without reallocating;
//! 3. stops every running scenario of the same scenario group;
//! 4. allocates the remaining required resources;
//! 5. puts it at the front of the running set.
//!
//! Stopping frees only the required resources the scenario still owns;
//! resources another scenario held away from it stay allocated.

use std::collections::HashSet;
use std::sync::Arc;

use smem_alloc::RegionAllocator;
use smem_core::{Catalog, Handle, ResourceGroup, ResourceId, ScenarioDef, ScenarioId};

use crate::config::{ConfigError, EngineConfig};
use crate::error::EngineError;
use crate::metrics::EngineMetrics;
use crate::registry::OwnershipRegistry;
use crate::resource::ResourceManager;

/// Arbitrates scenario start/stop requests over a [`ResourceManager`].
#[derive(Debug)]
pub struct ScenarioEngine<A> {
    resources: ResourceManager<A>,
    running: Vec<ScenarioId>,
}

impl<A: RegionAllocator> ScenarioEngine<A> {
    /// Build an engine with no scenario running.
    pub fn new(
        catalog: Arc<Catalog>,
        allocator: A,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            resources: ResourceManager::new(catalog, allocator, config)?,
            running: Vec::new(),
        })
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The catalog.
    pub fn catalog(&self) -> &Catalog {
        self.resources.catalog()
    }

    /// The allocator.
    pub fn allocator(&self) -> &A {
        self.resources.allocator()
    }

    /// The resource manager.
    pub fn resources(&self) -> &ResourceManager<A> {
        &self.resources
    }

    /// Mutable access to the resource manager, for direct resource
    /// operations outside any scenario.
    pub fn resources_mut(&mut self) -> &mut ResourceManager<A> {
        &mut self.resources
    }

    /// The ownership registry.
    pub fn registry(&self) -> &OwnershipRegistry {
        self.resources.registry()
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> &EngineMetrics {
        self.resources.metrics()
    }

    /// Running scenarios, most recently started first.
    pub fn running(&self) -> &[ScenarioId] {
        &self.running
    }

    /// Whether `id` is running.
    pub fn is_running(&self, id: ScenarioId) -> bool {
        self.running.contains(&id)
    }

    /// Whether an invariant violation has made the engine unusable.
    pub fn is_poisoned(&self) -> bool {
        self.resources.is_poisoned()
    }

    /// Look up a scenario by name.
    pub fn scenario_by_name(&self, name: &str) -> Option<ScenarioId> {
        self.catalog().scenario_id(name)
    }

    /// Look up a resource by name.
    pub fn resource_by_name(&self, name: &str) -> Option<ResourceId> {
        self.catalog().resource_id(name)
    }

    /// Text rendering of the chunk ledger.
    pub fn memory_map(&self) -> String {
        self.allocator().ledger().to_string()
    }

    /// Consume the engine, returning its allocator.
    pub fn into_allocator(self) -> A {
        self.resources.into_allocator()
    }

    fn scenario_def(&self, id: ScenarioId) -> Result<ScenarioDef, EngineError> {
        self.catalog()
            .scenario(id)
            .cloned()
            .ok_or(EngineError::UnknownScenario { id })
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Start scenario `id`.
    ///
    /// If a same-group peer cannot be stopped or a required resource
    /// cannot be allocated, every required resource the scenario owns at
    /// that point (held or new) is freed, it is not marked running, and
    /// the error is returned. Peers already stopped by group exclusion
    /// stay stopped.
    pub fn scenario_start(&mut self, id: ScenarioId) -> Result<(), EngineError> {
        self.resources.guard()?;
        let def = self.scenario_def(id)?;
        if self.is_running(id) {
            self.resources.metrics_mut().noop_starts += 1;
            tracing::debug!(scenario = %def.name, "already running");
            return Ok(());
        }
        tracing::debug!(scenario = %def.name, group = %def.group, "+S");

        let held: Vec<ResourceId> = def
            .resources
            .iter()
            .copied()
            .filter(|r| self.resources.hold(*r, id))
            .collect();
        if !held.is_empty() {
            let names: Vec<&str> = held
                .iter()
                .filter_map(|r| self.catalog().resource(*r))
                .map(|r| r.name.as_str())
                .collect();
            tracing::info!(scenario = %def.name, "hold resources {}", names.join(" "));
        }

        let peers: Vec<ScenarioId> = self
            .running
            .iter()
            .copied()
            .filter(|s| self.catalog().scenario(*s).is_some_and(|p| p.group == def.group))
            .collect();
        for peer in peers {
            tracing::info!(scenario = %def.name, group = %def.group, %peer, "same group, stopping");
            if let Err(err) = self.scenario_stop(peer) {
                return Err(self.abort_start(&def, err));
            }
        }

        for &r in &def.resources {
            if self.registry().contains(r) {
                continue;
            }
            if let Err(err) = self.resources.resource_alloc(id, r) {
                return Err(self.abort_start(&def, err));
            }
        }

        self.running.insert(0, id);
        self.resources.metrics_mut().scenario_starts += 1;
        Ok(())
    }

    /// Release what a failed start acquired and report `cause`.
    fn abort_start(&mut self, def: &ScenarioDef, cause: EngineError) -> EngineError {
        tracing::warn!(scenario = %def.name, "start failed: {cause}");
        self.resources.metrics_mut().failed_starts += 1;
        if self.is_poisoned() {
            return cause;
        }
        let mut failure = None;
        for &r in &def.resources {
            if self.registry().owner(r) != Some(def.id) {
                continue;
            }
            if let Err(err) = self.resources.resource_free(r) {
                tracing::error!(scenario = %def.name, resource = %r, "release after failed start: {err}");
                failure = failure.or(Some(err));
            }
        }
        failure.unwrap_or(cause)
    }

    /// Stop scenario `id`.
    ///
    /// Stopping a scenario that is not running is a logged no-op.
    pub fn scenario_stop(&mut self, id: ScenarioId) -> Result<(), EngineError> {
        self.resources.guard()?;
        let def = self.scenario_def(id)?;
        let Some(pos) = self.running.iter().position(|s| *s == id) else {
            tracing::warn!(scenario = %def.name, "stop of a scenario that is not running");
            return Ok(());
        };
        tracing::debug!(scenario = %def.name, "-S");

        for &r in &def.resources {
            if self.registry().owner(r) == Some(id) {
                self.resources.resource_free(r)?;
            }
        }
        self.running.remove(pos);
        self.resources.metrics_mut().scenario_stops += 1;
        Ok(())
    }

    /// Stop every running scenario, most recently started first.
    pub fn stop_all(&mut self) -> Result<(), EngineError> {
        while let Some(&id) = self.running.first() {
            self.scenario_stop(id)?;
        }
        Ok(())
    }

    // ── Invariants ─────────────────────────────────────────────────

    /// Cross-check the running set, the registry, and the allocator.
    ///
    /// Verifies that the running set has no duplicates and no two members
    /// of one scenario group, that every registry owner is running, that
    /// every resource group is within budget, and that the allocator's
    /// live handles are exactly the handles of registered resources.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        let broken = |detail: String| Err(EngineError::InvariantBroken { detail });

        let mut groups = HashSet::new();
        let mut seen = HashSet::new();
        for &s in &self.running {
            if !seen.insert(s) {
                return broken(format!("scenario {s} is running twice"));
            }
            let Some(def) = self.catalog().scenario(s) else {
                return broken(format!("running scenario {s} is not in the catalog"));
            };
            if !groups.insert(def.group) {
                return broken(format!(
                    "two running scenarios share scenario group {}",
                    def.group
                ));
            }
        }

        let budget = self.resources.config().weight_budget;
        let mut weights: Vec<(ResourceGroup, u32)> = Vec::new();
        let mut registered: HashSet<Handle> = HashSet::new();
        for (r, entry) in self.registry().iter() {
            if !self.is_running(entry.owner) {
                return broken(format!(
                    "resource {r} is owned by stopped scenario {}",
                    entry.owner
                ));
            }
            let Some(def) = self.catalog().resource(r) else {
                return broken(format!("registered resource {r} is not in the catalog"));
            };
            match weights.iter_mut().find(|(g, _)| *g == def.group) {
                Some((_, w)) => *w += def.weight,
                None => weights.push((def.group, def.weight)),
            }
            registered.extend(entry.handles.iter().copied());
        }
        if let Some((group, w)) = weights.iter().find(|(_, w)| *w > budget) {
            return broken(format!("resource group {group} holds weight {w} over {budget}"));
        }

        let live: HashSet<Handle> = self.allocator().handles().into_iter().collect();
        if live != registered {
            return broken(format!(
                "{} live handles, {} registered handles",
                live.len(),
                registered.len()
            ));
        }
        self.allocator().verify().map_err(EngineError::Alloc)
    }
}
