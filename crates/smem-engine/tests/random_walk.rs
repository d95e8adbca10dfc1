//! Long seeded start/stop sequences over the reference catalog.
//!
//! After every transition the engine's cross-checks must pass: no two
//! running scenarios share a group, every allocated resource is owned by
//! a running scenario, resource groups stay within budget, and the
//! allocator's live handles match the registry exactly.

use proptest::prelude::*;
use smem_alloc::{AllocError, RegionAllocator, SimAllocator};
use smem_engine::{EngineConfig, EngineError, EvictionPolicy, ScenarioEngine};
use smem_test_utils::fixtures::reference_engine_with;
use smem_test_utils::{init_test_logging, RandomWalk, Step};

fn walk(engine: &mut ScenarioEngine<SimAllocator>, seed: u64, steps: usize) -> (usize, usize) {
    let mut rng = RandomWalk::new(seed);
    let (mut ok, mut exhausted) = (0, 0);
    for i in 0..steps {
        let Some((step, outcome)) = rng.step(engine) else {
            break;
        };
        match outcome {
            Ok(()) => ok += 1,
            Err(EngineError::Alloc(AllocError::AllocationExhausted { .. })) => {
                assert!(matches!(step, Step::Start(_)), "stop ran out of memory");
                exhausted += 1;
            }
            Err(err) => panic!("seed {seed} step {i} ({step:?}): {err}"),
        }
        if let Err(err) = engine.check_invariants() {
            panic!("seed {seed} step {i} ({step:?}): {err}\n{}", engine.memory_map());
        }
    }
    (ok, exhausted)
}

fn assert_drains(engine: &mut ScenarioEngine<SimAllocator>) {
    engine.stop_all().unwrap();
    assert!(engine.running().is_empty());
    assert!(engine.registry().is_empty());
    assert!(engine.allocator().ledger().is_clear());
    assert!(engine.allocator().handles().is_empty());
}

#[test]
fn thousand_steps_hold_invariants() {
    init_test_logging();
    let mut engine = reference_engine_with(EngineConfig::default());
    let (ok, exhausted) = walk(&mut engine, 0x5EED, 1000);
    assert!(ok > 500, "only {ok} transitions succeeded ({exhausted} exhausted)");
    assert!(engine.metrics().scenario_starts > 0);
    assert!(engine.metrics().scenario_stops > 0);
    assert_drains(&mut engine);
}

#[test]
fn walk_is_deterministic_per_seed() {
    let run = |seed| {
        let mut engine = reference_engine_with(EngineConfig::default());
        walk(&mut engine, seed, 200);
        (engine.running().to_vec(), engine.memory_map(), engine.metrics().clone())
    };
    assert_eq!(run(7), run(7));
}

fn policy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::NewestFirst),
        Just(EvictionPolicy::OldestFirst),
        Just(EvictionPolicy::LightestFirst),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_seed_any_policy_holds_invariants(seed in any::<u64>(), eviction in policy()) {
        let config = EngineConfig { eviction, ..EngineConfig::default() };
        let mut engine = reference_engine_with(config);
        walk(&mut engine, seed, 150);
        let held: u64 = engine.allocator().occupancy().iter().map(|o| o.occupied).sum();
        prop_assert!(held <= engine.allocator().regions().iter().map(|r| r.size).sum::<u64>());
        assert_drains(&mut engine);
    }
}
