//! Scenario lifecycle properties over the reference catalog and small
//! hand-built catalogs.

use std::sync::Arc;

use smem_alloc::{AllocError, AllocatorConfig, HwAllocator, RegionAllocator, SimAllocator};
use smem_core::{Catalog, RegionId, ScenarioId};
use smem_engine::{EngineError, ScenarioEngine};
use smem_test_utils::fixtures::{
    reference_catalog, reference_engine, small_regions, REGION_A, UNIT,
};
use smem_test_utils::{init_test_logging, Fault, MockDevice};

const A: &[RegionId] = &[REGION_A];

fn sid<T: RegionAllocator>(engine: &ScenarioEngine<T>, name: &str) -> ScenarioId {
    engine.scenario_by_name(name).unwrap()
}

fn small_engine(catalog: Catalog, chunks: u64) -> ScenarioEngine<SimAllocator> {
    init_test_logging();
    let sim = SimAllocator::new(&AllocatorConfig::default(), &small_regions(chunks)).unwrap();
    ScenarioEngine::new(Arc::new(catalog), sim, Default::default()).unwrap()
}

#[test]
fn reference_catalog_shape() {
    let c = reference_catalog();
    assert_eq!(c.resources().len(), 30);
    assert_eq!(c.scenarios().len(), 22);
    assert!(c.resource_id("DP_M_DECFHD").is_some());
    assert!(c.resource_id("DP_M_DECPROT").is_some());
}

#[test]
fn every_scenario_once_reclaims_everything() {
    init_test_logging();
    let mut e = reference_engine();
    let ids: Vec<ScenarioId> = e.catalog().scenarios().iter().map(|s| s.id).collect();
    for id in ids {
        e.scenario_start(id).unwrap();
        e.check_invariants().unwrap();
        e.scenario_stop(id).unwrap();
        e.check_invariants().unwrap();
    }
    assert!(e.running().is_empty());
    assert!(e.registry().is_empty());
    assert!(e.allocator().ledger().is_clear());
    for region in e.allocator().regions() {
        assert!(e.allocator().occupied_runs(region.id).is_empty());
    }
}

#[test]
fn stop_all_reclaims_everything() {
    init_test_logging();
    let mut e = reference_engine();
    for name in ["DTV_MBC", "TV2MOBILE", "DTV_PIP", "RETAIL_MODE", "PVR_RECDUAL", "WEBBROWSER"] {
        let id = sid(&e, name);
        e.scenario_start(id).unwrap();
    }
    assert_eq!(e.running().len(), 6);
    e.check_invariants().unwrap();
    e.stop_all().unwrap();
    assert!(e.running().is_empty());
    assert!(e.allocator().ledger().is_clear());
    assert!(e.allocator().handles().is_empty());
    assert!(e.metrics().peak(RegionId(2)) > 0);
}

#[test]
fn start_is_idempotent() {
    let mut e = reference_engine();
    let mbc = sid(&e, "DTV_MBC");
    e.scenario_start(mbc).unwrap();
    let handles = e.allocator().handles();
    let registry: Vec<_> = e.resources().allocated_mapping();
    e.scenario_start(mbc).unwrap();
    assert_eq!(e.allocator().handles(), handles);
    assert_eq!(e.resources().allocated_mapping(), registry);
    assert_eq!(e.running(), &[mbc]);
    assert_eq!(e.metrics().noop_starts, 1);
    assert_eq!(e.metrics().scenario_starts, 1);
}

#[test]
fn same_group_scenarios_exclude_each_other() {
    let mut e = reference_engine();
    let hevc = sid(&e, "FILE_HEVCUHD");
    let jpeg = sid(&e, "JPEG_UHD");
    let pvr = sid(&e, "PVR_REC");
    e.scenario_start(hevc).unwrap();
    e.scenario_start(pvr).unwrap();
    e.scenario_start(jpeg).unwrap();
    assert_eq!(e.running(), &[jpeg, pvr]);
    let dvde = e.resource_by_name("DVDE0_HEVC").unwrap();
    assert!(!e.registry().contains(dvde));
    e.check_invariants().unwrap();
}

#[test]
fn stop_of_stopped_scenario_is_noop() {
    let mut e = reference_engine();
    let atv = sid(&e, "ATV");
    e.scenario_stop(atv).unwrap();
    assert_eq!(e.metrics().scenario_stops, 0);
    assert_eq!(
        e.scenario_start(ScenarioId(999)),
        Err(EngineError::UnknownScenario { id: ScenarioId(999) })
    );
}

// DTV_ISDBTFHD -> MJPEG_UHD -> DTV_MBC
#[test]
fn hold_keeps_handles_and_moves_ownership() {
    init_test_logging();
    let mut e = reference_engine();
    let isdb = sid(&e, "DTV_ISDBTFHD");
    let mjpeg = sid(&e, "MJPEG_UHD");
    let mbc = sid(&e, "DTV_MBC");
    let tsd = e.resource_by_name("TSD").unwrap();
    let chdec = e.resource_by_name("CHDEC").unwrap();
    let mfc0 = e.resource_by_name("MFC0_DTV").unwrap();
    let dp_pc = e.resource_by_name("DP_M_PC").unwrap();

    e.scenario_start(isdb).unwrap();
    let tsd_handles = e.registry().get(tsd).unwrap().handles.clone();

    // MJPEG_UHD and DP_M_PC are full-weight: they evict MFC0_DTV and
    // DP_M_DEC420 from the running ISDB scenario.
    e.scenario_start(mjpeg).unwrap();
    assert!(!e.registry().contains(mfc0));
    assert_eq!(e.registry().owner(tsd), Some(isdb));
    assert_eq!(e.metrics().resources_evicted, 2);

    e.scenario_start(mbc).unwrap();
    assert_eq!(e.running(), &[mbc, mjpeg]);
    assert_eq!(e.registry().owner(tsd), Some(mbc));
    assert_eq!(e.registry().get(tsd).unwrap().handles, tsd_handles);
    assert!(!e.registry().contains(chdec));
    assert!(!e.registry().contains(dp_pc));
    assert_eq!(e.registry().owner(mfc0), Some(mbc));
    assert_eq!(e.metrics().resources_held, 1);
    e.check_invariants().unwrap();

    e.stop_all().unwrap();
    assert!(e.allocator().ledger().is_clear());
}

#[test]
fn weight_budget_evicts_across_scenarios() {
    let catalog = Catalog::builder()
        .resource("X", 2, 50, 0, &[(A, &[1.0])])
        .resource("Y", 2, 60, 0, &[(A, &[1.0])])
        .scenario("SX", 0, &["X"])
        .scenario("SY", 1, &["Y"])
        .build()
        .unwrap();
    let mut e = small_engine(catalog, 8);
    let (sx, sy) = (sid(&e, "SX"), sid(&e, "SY"));
    let (x, y) = (
        e.resource_by_name("X").unwrap(),
        e.resource_by_name("Y").unwrap(),
    );
    e.scenario_start(sx).unwrap();
    e.scenario_start(sy).unwrap();
    assert!(!e.registry().contains(x));
    assert_eq!(e.registry().owner(y), Some(sy));
    assert_eq!(e.running(), &[sy, sx]);
    assert_eq!(e.allocator().occupied_bytes(REGION_A), 2 * UNIT);
    e.check_invariants().unwrap();
}

#[test]
fn failed_start_releases_everything_it_owns() {
    let catalog = Catalog::builder()
        .resource("H", 5, 10, 0, &[(A, &[1.0])])
        .resource("N", 6, 10, 0, &[(A, &[1.0])])
        .resource("BIG", 7, 10, 0, &[(A, &[8.0])])
        .scenario("S1", 0, &["H"])
        .scenario("S3", 1, &["N"])
        .scenario("S2", 1, &["H", "N", "BIG"])
        .build()
        .unwrap();
    let mut e = small_engine(catalog, 8);
    let (s1, s2, s3) = (sid(&e, "S1"), sid(&e, "S2"), sid(&e, "S3"));
    e.scenario_start(s1).unwrap();
    e.scenario_start(s3).unwrap();

    let err = e.scenario_start(s2).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Alloc(AllocError::AllocationExhausted { .. })
    ));
    assert!(!e.is_running(s2));
    // S3 was stopped by group exclusion and stays stopped.
    assert_eq!(e.running(), &[s1]);
    assert!(e.registry().is_empty());
    assert!(e.allocator().ledger().is_clear());
    assert_eq!(e.metrics().failed_starts, 1);
    assert!(!e.is_poisoned());
    e.check_invariants().unwrap();
}

#[test]
fn invariant_violation_poisons_engine() {
    init_test_logging();
    let catalog = Catalog::builder()
        .resource("R1", 0, 10, 0, &[(A, &[0.5])])
        .resource("R2", 1, 10, 0, &[(A, &[0.5])])
        .scenario("S1", 0, &["R1"])
        .scenario("S2", 1, &["R2"])
        .build()
        .unwrap();
    let device = MockDevice::new(small_regions(4));
    let faults = device.faults();
    let hw = HwAllocator::open(device, &AllocatorConfig::default()).unwrap();
    let mut e = ScenarioEngine::new(Arc::new(catalog), hw, Default::default()).unwrap();
    let (s1, s2) = (sid(&e, "S1"), sid(&e, "S2"));

    e.scenario_start(s1).unwrap();
    // The device answers S2's request with R1's chunk.
    faults.push(Fault::Reply("dup 0x10000000 0x80000".into()));
    let err = e.scenario_start(s2).unwrap_err();
    assert!(err.is_fatal());
    assert!(e.is_poisoned());
    assert_eq!(e.scenario_stop(s1), Err(EngineError::Poisoned));
    assert_eq!(e.scenario_start(s2), Err(EngineError::Poisoned));
    assert_eq!(e.allocator().handles().len(), 1);
}

#[test]
fn memory_map_tracks_scenarios() {
    let catalog = Catalog::builder()
        .resource("R1", 0, 10, 0, &[(A, &[1.0])])
        .resource("R2", 1, 10, 0, &[(A, &[0.5])])
        .scenario("S1", 0, &["R1", "R2"])
        .build()
        .unwrap();
    let mut e = small_engine(catalog, 4);
    let s1 = sid(&e, "S1");
    assert_eq!(e.memory_map(), "A: ----\nB: ----\n");
    e.scenario_start(s1).unwrap();
    assert_eq!(e.memory_map(), "A: AAB-\nB: ----\n");
    e.scenario_stop(s1).unwrap();
    assert_eq!(e.memory_map(), "A: ----\nB: ----\n");
}
