//! Hardware backend driven through the mock device.

use std::io;

use smem_alloc::{AllocError, AllocRequest, AllocatorConfig, HwAllocator, RegionAllocator};
use smem_core::{AllocFlags, RegionSet};
use smem_test_utils::fixtures::{reference_regions, small_regions, REGION_A, REGION_B, UNIT};
use smem_test_utils::{init_test_logging, Fault, MockDevice};

fn open(regions: Vec<smem_core::RegionInfo>) -> HwAllocator<MockDevice> {
    init_test_logging();
    HwAllocator::open(MockDevice::new(regions), &AllocatorConfig::default()).unwrap()
}

fn only(r: smem_core::RegionId) -> RegionSet {
    [r].into_iter().collect()
}

#[test]
fn geometry_comes_from_regioninfo() {
    let hw = open(reference_regions());
    assert_eq!(hw.regions(), reference_regions());
    assert!(hw.ledger().is_clear());
}

#[test]
fn grants_are_mirrored_in_ledger() {
    let mut hw = open(small_regions(8));
    let a = only(REGION_A);
    let h1 = hw
        .alloc(&AllocRequest::new("MFC0 DTV", UNIT + 1, &a).with_flags(AllocFlags(0x0302)))
        .unwrap();
    let h2 = hw.alloc(&AllocRequest::new("TSD", UNIT, &a)).unwrap();

    assert_eq!(hw.device().commands[0], "MFC0_DTV 0x80001 0x0 0x302 0x1");
    assert_eq!(hw.token(h1), Some("smem1"));
    let runs = hw.occupied_runs(REGION_A);
    assert_eq!(runs.len(), 2);
    assert_eq!((runs[0].handle, runs[0].span.count), (h1, 2));
    assert_eq!((runs[1].handle, runs[1].span.start), (h2, 2));
    hw.verify().unwrap();

    hw.free(h1).unwrap();
    assert_eq!(hw.device().frees, vec!["smem1".to_string()]);
    assert_eq!(hw.occupied_bytes(REGION_A), UNIT);
    assert_eq!(hw.free(h1), Err(AllocError::InvalidHandle { handle: h1 }));
    hw.free_all().unwrap();
    assert_eq!(hw.device().live(), 0);
}

#[test]
fn refusal_is_exhaustion() {
    let mut hw = open(small_regions(4));
    let b = only(REGION_B);
    hw.device_mut().inject(Fault::Refuse);
    let err = hw.alloc(&AllocRequest::new("ATV", UNIT, &b)).unwrap_err();
    assert!(matches!(err, AllocError::AllocationExhausted { .. }));

    // The device itself runs out too.
    let err = hw.alloc(&AllocRequest::new("BIG", 5 * UNIT, &b)).unwrap_err();
    assert!(matches!(err, AllocError::AllocationExhausted { .. }));
    assert!(hw.ledger().is_clear());
}

#[test]
fn overlapping_grant_is_invariant_violation() {
    let mut hw = open(small_regions(4));
    let a = only(REGION_A);
    let h = hw.alloc(&AllocRequest::new("X", UNIT, &a)).unwrap();
    let addr = hw.handle_info(h).unwrap().addr;

    hw.device_mut()
        .inject(Fault::Reply(format!("bogus {addr:#x} {UNIT:#x}\n")));
    let err = hw.alloc(&AllocRequest::new("Y", UNIT, &a)).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(hw.handles(), vec![h]);
    assert_eq!(hw.device().frees, vec!["bogus".to_string()]);
}

#[test]
fn misplaced_grant_is_malformed() {
    let mut hw = open(small_regions(4));
    let a = only(REGION_A);
    hw.device_mut()
        .inject(Fault::Reply("t 0x10000001 0x80000".into()));
    let err = hw.alloc(&AllocRequest::new("X", UNIT, &a)).unwrap_err();
    assert!(matches!(err, AllocError::MalformedReply { .. }));

    hw.device_mut()
        .inject(Fault::Reply("t 0x20000000 0x80000".into()));
    let err = hw.alloc(&AllocRequest::new("X", UNIT, &a)).unwrap_err();
    assert!(matches!(err, AllocError::MalformedReply { .. }), "{err}");

    hw.device_mut().inject(Fault::Reply("garbage".into()));
    let err = hw.alloc(&AllocRequest::new("X", UNIT, &a)).unwrap_err();
    assert!(matches!(err, AllocError::MalformedReply { .. }));
    assert!(hw.ledger().is_clear());
}

#[test]
fn channel_failure_is_io() {
    let mut hw = open(small_regions(4));
    let a = only(REGION_A);
    hw.device_mut()
        .inject(Fault::Io(io::ErrorKind::PermissionDenied));
    match hw.alloc(&AllocRequest::new("X", UNIT, &a)).unwrap_err() {
        AllocError::Io { kind, .. } => assert_eq!(kind, io::ErrorKind::PermissionDenied),
        other => panic!("expected Io, got {other:?}"),
    }
}
