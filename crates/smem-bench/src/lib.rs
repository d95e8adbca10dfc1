//! Benchmark profiles for the smem arbiter.
//!
//! - [`churn_schedule`]: a recorded start/stop sequence over the reference
//!   catalog, replayed with [`replay`]
//! - [`fragmented_sim`]: a reference-region allocator with half its
//!   allocations freed, so first-fit has holes to skip

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smem_alloc::{AllocRequest, RegionAllocator, SimAllocator};
use smem_core::{Handle, RegionSet, MIB};
use smem_engine::ScenarioEngine;
use smem_test_utils::fixtures::{reference_engine, reference_sim, REGION_A, REGION_B, REGION_C};
use smem_test_utils::{RandomWalk, Step};

/// Record `steps` random transitions over a fresh reference engine.
///
/// Replaying the schedule on another fresh reference engine reproduces
/// the same outcomes.
pub fn churn_schedule(seed: u64, steps: usize) -> Vec<Step> {
    let mut engine = reference_engine();
    let mut walk = RandomWalk::new(seed);
    (0..steps)
        .map_while(|_| walk.step(&mut engine).map(|(step, _)| step))
        .collect()
}

/// Apply `schedule` to `engine`, returning how many transitions failed.
pub fn replay<A: RegionAllocator>(engine: &mut ScenarioEngine<A>, schedule: &[Step]) -> usize {
    schedule
        .iter()
        .filter(|step| {
            let outcome = match **step {
                Step::Start(id) => engine.scenario_start(id),
                Step::Stop(id) => engine.scenario_stop(id),
            };
            outcome.is_err()
        })
        .count()
}

/// Fill the reference regions with random 0.5–16 MiB allocations until
/// one is refused, then free every other one.
///
/// Returns the allocator and the handles still live.
pub fn fragmented_sim(seed: u64) -> (SimAllocator, Vec<Handle>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sim = reference_sim();
    let anywhere: RegionSet = [REGION_A, REGION_B, REGION_C].into_iter().collect();
    let mut handles = Vec::new();
    loop {
        let size = rng.random_range(MIB / 2..=16 * MIB);
        match sim.alloc(&AllocRequest::new("frag", size, &anywhere)) {
            Ok(handle) => handles.push(handle),
            Err(_) => break,
        }
    }
    let mut live = Vec::with_capacity(handles.len() / 2);
    for (i, handle) in handles.into_iter().enumerate() {
        if i % 2 == 0 && sim.free(handle).is_ok() {
            continue;
        }
        live.push(handle);
    }
    (sim, live)
}
