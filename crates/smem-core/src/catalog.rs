//! Immutable resource and scenario catalog.
//!
//! A [`Catalog`] is built once at startup through [`CatalogBuilder`],
//! validated, and then shared read-only (typically behind an `Arc`) by the
//! arbitration engine. Resources and scenarios are addressed by dense
//! indices ([`ResourceId`], [`ScenarioId`]) assigned in insertion order.

use indexmap::IndexMap;

use crate::error::CatalogError;
use crate::flags::AllocFlags;
use crate::id::{RegionId, ResourceGroup, ResourceId, ScenarioGroup, ScenarioId};
use crate::region::RegionSet;

/// Bytes per MiB, the unit catalog sizes are written in.
pub const MIB: u64 = 1024 * 1024;

/// Heaviest weight a single resource may carry.
pub const MAX_WEIGHT: u32 = 100;

/// One role of a resource: a set of buffers drawn from the same
/// candidate regions.
///
/// Sizes are kept largest-first so the biggest buffer is placed while
/// the regions are least fragmented. An empty requirement needs no
/// allocation at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requirement {
    regions: RegionSet,
    sizes: Vec<u64>,
}

impl Requirement {
    /// Create a requirement from byte sizes.
    pub fn new(regions: impl Into<RegionSet>, sizes: impl IntoIterator<Item = u64>) -> Self {
        let mut sizes: Vec<u64> = sizes.into_iter().collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        Self {
            regions: regions.into(),
            sizes,
        }
    }

    /// Candidate regions in preference order.
    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    /// Buffer sizes in bytes, largest first.
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Whether this requirement needs no allocation.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Sum of all buffer sizes in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.sizes.iter().sum()
    }
}

/// A functional block that scenarios claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDef {
    /// Catalog index.
    pub id: ResourceId,
    /// Unique name, also used as the allocation description.
    pub name: String,
    /// Weight-budget class.
    pub group: ResourceGroup,
    /// Budget units consumed within `group` while allocated (0–100).
    pub weight: u32,
    /// Flags passed with every allocation of this resource.
    pub flags: AllocFlags,
    /// Per-role size requirements, in order.
    pub requirements: Vec<Requirement>,
}

impl ResourceDef {
    /// Number of allocator calls needed to satisfy this resource.
    pub fn allocation_count(&self) -> usize {
        self.requirements.iter().map(|r| r.sizes.len()).sum()
    }

    /// Total bytes requested across all requirements.
    pub fn total_bytes(&self) -> u64 {
        self.requirements.iter().map(Requirement::total_bytes).sum()
    }
}

/// A use-case that needs a set of resources simultaneously.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioDef {
    /// Catalog index.
    pub id: ScenarioId,
    /// Unique name.
    pub name: String,
    /// Mutual-exclusion class.
    pub group: ScenarioGroup,
    /// Required resources, in allocation order.
    pub resources: Vec<ResourceId>,
}

/// Validated, immutable catalog of resources and scenarios.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    resources: Vec<ResourceDef>,
    scenarios: Vec<ScenarioDef>,
    resource_names: IndexMap<String, ResourceId>,
    scenario_names: IndexMap<String, ScenarioId>,
}

impl Catalog {
    /// Start building a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Look up a resource definition.
    pub fn resource(&self, id: ResourceId) -> Option<&ResourceDef> {
        self.resources.get(id.0 as usize)
    }

    /// Look up a scenario definition.
    pub fn scenario(&self, id: ScenarioId) -> Option<&ScenarioDef> {
        self.scenarios.get(id.0 as usize)
    }

    /// Resolve a resource name.
    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_names.get(name).copied()
    }

    /// Resolve a scenario name.
    pub fn scenario_id(&self, name: &str) -> Option<ScenarioId> {
        self.scenario_names.get(name).copied()
    }

    /// All resources in catalog order.
    pub fn resources(&self) -> &[ResourceDef] {
        &self.resources
    }

    /// All scenarios in catalog order.
    pub fn scenarios(&self) -> &[ScenarioDef] {
        &self.scenarios
    }

    /// Every region referenced by a non-empty requirement, in first-use
    /// order.
    pub fn referenced_regions(&self) -> RegionSet {
        self.resources
            .iter()
            .flat_map(|r| r.requirements.iter())
            .filter(|req| !req.is_empty())
            .flat_map(|req| req.regions.iter())
            .collect()
    }

    /// Check that every referenced region is one of `available`.
    ///
    /// Empty requirements allocate nothing, so their regions need not exist.
    pub fn check_regions(&self, available: &[RegionId]) -> Result<(), CatalogError> {
        for res in &self.resources {
            for req in res.requirements.iter().filter(|req| !req.is_empty()) {
                if let Some(region) = req.regions.iter().find(|id| !available.contains(id)) {
                    return Err(CatalogError::UnknownRegion {
                        resource: res.name.clone(),
                        region,
                    });
                }
            }
        }
        Ok(())
    }
}

struct PendingScenario {
    name: String,
    group: ScenarioGroup,
    resources: Vec<String>,
}

/// Incremental builder for a [`Catalog`].
///
/// Errors are deferred: the first problem encountered is reported by
/// [`build()`](CatalogBuilder::build), so definitions can be chained.
#[derive(Default)]
pub struct CatalogBuilder {
    resources: Vec<ResourceDef>,
    scenarios: Vec<PendingScenario>,
    error: Option<CatalogError>,
}

impl CatalogBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource whose requirement sizes are given in MiB.
    ///
    /// Each entry of `requirements` is `(candidate regions, sizes)`; a
    /// size of `1.5` means 1.5 MiB, truncated to whole bytes.
    pub fn resource(
        mut self,
        name: &str,
        group: u32,
        weight: u32,
        flags: u32,
        requirements: &[(&[RegionId], &[f64])],
    ) -> Self {
        let mut reqs = Vec::with_capacity(requirements.len());
        for &(regions, sizes) in requirements {
            if let Some(&mib) = sizes.iter().find(|m| !m.is_finite() || **m <= 0.0) {
                self.record(CatalogError::InvalidSize {
                    resource: name.to_string(),
                    mib,
                });
                return self;
            }
            reqs.push(Requirement::new(
                regions,
                sizes.iter().map(|mib| (mib * MIB as f64) as u64),
            ));
        }
        self.resource_with(name, group, weight, flags, reqs)
    }

    /// Add a resource with requirements already expressed in bytes.
    pub fn resource_with(
        mut self,
        name: &str,
        group: u32,
        weight: u32,
        flags: u32,
        requirements: Vec<Requirement>,
    ) -> Self {
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(ResourceDef {
            id,
            name: name.to_string(),
            group: ResourceGroup(group),
            weight,
            flags: AllocFlags(flags),
            requirements,
        });
        self
    }

    /// Add a scenario that requires the named resources.
    pub fn scenario(mut self, name: &str, group: u32, resources: &[&str]) -> Self {
        self.scenarios.push(PendingScenario {
            name: name.to_string(),
            group: ScenarioGroup(group),
            resources: resources.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    fn record(&mut self, err: CatalogError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Validate and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut resource_names = IndexMap::with_capacity(self.resources.len());
        for res in &self.resources {
            if res.weight > MAX_WEIGHT {
                return Err(CatalogError::WeightOutOfRange {
                    resource: res.name.clone(),
                    weight: res.weight,
                });
            }
            for (i, req) in res.requirements.iter().enumerate() {
                if !req.is_empty() && req.regions.is_empty() {
                    return Err(CatalogError::EmptyRegionSet {
                        resource: res.name.clone(),
                        requirement: i,
                    });
                }
            }
            if resource_names.insert(res.name.clone(), res.id).is_some() {
                return Err(CatalogError::DuplicateResource {
                    name: res.name.clone(),
                });
            }
        }

        let mut scenarios = Vec::with_capacity(self.scenarios.len());
        let mut scenario_names = IndexMap::with_capacity(self.scenarios.len());
        for pending in self.scenarios {
            let id = ScenarioId(scenarios.len() as u32);
            let mut resources = Vec::with_capacity(pending.resources.len());
            for name in &pending.resources {
                let rid = *resource_names.get(name.as_str()).ok_or_else(|| {
                    CatalogError::UnknownResource {
                        scenario: pending.name.clone(),
                        resource: name.clone(),
                    }
                })?;
                if resources.contains(&rid) {
                    return Err(CatalogError::RepeatedResource {
                        scenario: pending.name.clone(),
                        resource: name.clone(),
                    });
                }
                resources.push(rid);
            }
            if scenario_names.insert(pending.name.clone(), id).is_some() {
                return Err(CatalogError::DuplicateScenario { name: pending.name });
            }
            scenarios.push(ScenarioDef {
                id,
                name: pending.name,
                group: pending.group,
                resources,
            });
        }

        Ok(Catalog {
            resources: self.resources,
            scenarios,
            resource_names,
            scenario_names,
        })
    }
}
