//! Seeded random start/stop driver.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smem_alloc::RegionAllocator;
use smem_core::ScenarioId;
use smem_engine::{EngineError, ScenarioEngine};

/// One random transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Start(ScenarioId),
    Stop(ScenarioId),
}

/// Picks random transitions the same way every run for a given seed.
///
/// With nothing running it always starts; with everything running it
/// always stops; otherwise a fair coin decides. The scenario is drawn
/// uniformly from the eligible ones.
pub struct RandomWalk {
    rng: ChaCha8Rng,
}

impl RandomWalk {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Choose the next transition for `engine`.
    pub fn next_step<A: RegionAllocator>(&mut self, engine: &ScenarioEngine<A>) -> Option<Step> {
        let running = engine.running();
        let stopped: Vec<ScenarioId> = engine
            .catalog()
            .scenarios()
            .iter()
            .map(|s| s.id)
            .filter(|id| !running.contains(id))
            .collect();
        let start = match (running.is_empty(), stopped.is_empty()) {
            (true, true) => return None,
            (true, false) => true,
            (false, true) => false,
            (false, false) => self.rng.random_bool(0.5),
        };
        Some(if start {
            Step::Start(stopped[self.rng.random_range(0..stopped.len())])
        } else {
            Step::Stop(running[self.rng.random_range(0..running.len())])
        })
    }

    /// Choose and apply one transition, returning it with its outcome.
    pub fn step<A: RegionAllocator>(
        &mut self,
        engine: &mut ScenarioEngine<A>,
    ) -> Option<(Step, Result<(), EngineError>)> {
        let step = self.next_step(engine)?;
        let outcome = match step {
            Step::Start(id) => engine.scenario_start(id),
            Step::Stop(id) => engine.scenario_stop(id),
        };
        Some((step, outcome))
    }
}
