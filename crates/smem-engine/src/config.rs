//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] is the builder-input for constructing a
//! [`ScenarioEngine`](crate::ScenarioEngine). It is validated together with
//! the catalog and the allocator geometry when the engine is built.

use std::error::Error;
use std::fmt;

use smem_core::{Catalog, CatalogError, MAX_WEIGHT};

// ── EvictionPolicy ─────────────────────────────────────────────────

/// Which registered resource of an over-budget group is evicted first.
///
/// Order is taken from the ownership registry, which records resources in
/// allocation order. A hold does not move a resource in that order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Most recently allocated first.
    #[default]
    NewestFirst,
    /// Least recently allocated first.
    OldestFirst,
    /// Smallest weight first; ties go to the most recently allocated.
    LightestFirst,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewestFirst => "newest-first",
            Self::OldestFirst => "oldest-first",
            Self::LightestFirst => "lightest-first",
        };
        f.write_str(name)
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while constructing an engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `weight_budget` is outside `1..=100`.
    BudgetOutOfRange {
        /// The configured budget.
        budget: u32,
    },
    /// A resource could never fit its group's budget on its own.
    WeightExceedsBudget {
        /// Resource name.
        resource: String,
        /// Its weight.
        weight: u32,
        /// The configured budget.
        budget: u32,
    },
    /// The catalog is inconsistent with the allocator.
    Catalog(CatalogError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetOutOfRange { budget } => {
                write!(f, "weight_budget {budget} is outside 1..={MAX_WEIGHT}")
            }
            Self::WeightExceedsBudget {
                resource,
                weight,
                budget,
            } => {
                write!(
                    f,
                    "resource '{resource}' weight {weight} exceeds budget {budget}"
                )
            }
            Self::Catalog(e) => write!(f, "catalog: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Catalog(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for ConfigError {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Arbitration parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Eviction order for over-budget groups. Default: newest first.
    pub eviction: EvictionPolicy,
    /// Sum of weights a resource group may hold at once. Default: 100.
    pub weight_budget: u32,
}

impl EngineConfig {
    /// Check the config against `catalog`.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), ConfigError> {
        if self.weight_budget == 0 || self.weight_budget > MAX_WEIGHT {
            return Err(ConfigError::BudgetOutOfRange {
                budget: self.weight_budget,
            });
        }
        if let Some(res) = catalog
            .resources()
            .iter()
            .find(|r| r.weight > self.weight_budget)
        {
            return Err(ConfigError::WeightExceedsBudget {
                resource: res.name.clone(),
                weight: res.weight,
                budget: self.weight_budget,
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::default(),
            weight_budget: MAX_WEIGHT,
        }
    }
}
