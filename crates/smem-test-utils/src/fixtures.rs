//! Reference geometry and catalog.
//!
//! The regions and catalog below describe a DTV system-on-chip: three
//! carve-out regions (A, B, C), 30 functional blocks, and 22 use-cases.
//! Sizes are in MiB; a `x + y` entry is one buffer of the summed size.

use std::sync::Arc;

use smem_alloc::{AllocatorConfig, SimAllocator};
use smem_core::{Catalog, RegionId, RegionInfo};
use smem_engine::{EngineConfig, ScenarioEngine};

pub const REGION_A: RegionId = RegionId(0);
pub const REGION_B: RegionId = RegionId(1);
pub const REGION_C: RegionId = RegionId(2);

const A: &[RegionId] = &[REGION_A];
const B: &[RegionId] = &[REGION_B];
const C: &[RegionId] = &[REGION_C];

/// Chunk unit of the default allocator config (512 KiB).
pub const UNIT: u64 = 512 * 1024;

/// The three reference regions.
pub fn reference_regions() -> Vec<RegionInfo> {
    vec![
        RegionInfo::new(REGION_A, 0x1_1FE0_0000, 0x1020_0000),
        RegionInfo::new(REGION_B, 0x0_5C00_0000, 0x1400_0000),
        RegionInfo::new(REGION_C, 0x0_CD40_0000, 0x1770_0000),
    ]
}

/// Two small regions of `chunks` default-sized chunks each.
pub fn small_regions(chunks: u64) -> Vec<RegionInfo> {
    vec![
        RegionInfo::new(REGION_A, 0x1000_0000, chunks * UNIT),
        RegionInfo::new(REGION_B, 0x2000_0000, chunks * UNIT),
    ]
}

/// The reference DTV catalog.
pub fn reference_catalog() -> Catalog {
    const VDEC: u32 = 0x0302;
    const DISP: u32 = 0x0402;

    Catalog::builder()
        // group 0: video decoders
        .resource("MFC0_DTV", 0, 40, VDEC, &[(A, &[1.0, 10.0]), (B, &[8.5 + 23.0]), (C, &[])])
        .resource("MFC0_MM", 0, 40, VDEC, &[(A, &[1.0, 10.0]), (B, &[4.5 + 25.0]), (C, &[])])
        .resource("MFC1_DTV", 0, 40, VDEC, &[(A, &[1.0, 10.0]), (B, &[8.5 + 23.0]), (C, &[])])
        .resource("MFC1_MM", 0, 40, VDEC, &[(A, &[1.0, 10.0]), (B, &[4.5 + 26.0]), (C, &[])])
        .resource("DVDE0_HEVC", 0, 60, VDEC, &[(A, &[13.0 + 88.5]), (B, &[8.0, 33.0 + 88.5]), (C, &[])])
        .resource("DVDE0_H264", 0, 60, VDEC, &[(A, &[40.0 + 70.5]), (B, &[8.0, 33.0 + 70.0]), (C, &[])])
        .resource("DVDE0_VP9", 0, 60, VDEC, &[(A, &[25.0 + 88.5]), (B, &[8.0, 33.0 + 90.0]), (C, &[])])
        .resource("DVDE1_HEVC", 0, 40, VDEC, &[(A, &[5.0 + 23.0]), (B, &[1.0, 8.5 + 23.0]), (C, &[])])
        .resource("DVDE1_VP9", 0, 40, VDEC, &[(A, &[8.0 + 23.0]), (B, &[1.0, 8.5 + 23.5]), (C, &[])])
        .resource("JPEG_UHD", 0, 100, VDEC, &[(A, &[32.0 + 32.0 + 32.0]), (B, &[32.0 + 32.0 + 32.0 + 8.0]), (C, &[])])
        .resource("MJPEG_UHD", 0, 100, VDEC, &[(A, &[51.0 + 51.0]), (B, &[8.0]), (C, &[])])
        .resource("MJPEG_FHD", 0, 40, VDEC, &[(A, &[4.0 + 8.8 + 17.0]), (B, &[]), (C, &[])])
        .resource("JPEG_FHD", 0, 40, VDEC, &[(A, &[1.0 + 8.0]), (B, &[8.0]), (C, &[])])
        // group 1: main display path
        .resource("DP_M_EXT422", 1, 100, DISP, &[(A, &[48.5])])
        .resource("DP_M_DEC420", 1, 100, DISP, &[(A, &[46.5])])
        .resource("DP_M_DECFHD", 1, 100, DISP, &[(A, &[26.5])])
        .resource("DP_M_DECPROT", 1, 100, DISP, &[(A, &[37.0])])
        .resource("DP_M_PC", 1, 100, DISP, &[(A, &[42.5])])
        // group 2: sub display path
        .resource("DP_S_DEC420", 2, 100, DISP, &[(C, &[42.5 + 25.5])])
        .resource("DP_S_CLONE", 2, 100, DISP, &[(C, &[21.5 + 27.5])])
        // groups 3..: single-owner blocks
        .resource("ENCODER", 3, 100, 0, &[(A, &[3.5, 6.8]), (B, &[7.0])])
        .resource("ATV", 4, 100, 0, &[(B, &[6.0])])
        .resource("CHDEC", 5, 100, 0, &[(A, &[8.5])])
        .resource("GFX1", 6, 100, 0, &[(C, &[8.0, 8.0])])
        .resource("CURSOR", 7, 100, 0, &[(C, &[1.5])])
        .resource("TSD", 8, 100, 0, &[(C, &[3.0])])
        .resource("PVR0", 9, 50, 0, &[(C, &[7.0])])
        .resource("PVR1", 9, 50, 0, &[(C, &[7.0])])
        .resource("ALPD", 10, 100, 0, &[(C, &[1.0])])
        .resource("HDMI", 11, 100, 0, &[(B, &[0.3])])
        // scenarios
        .scenario("DTV_MBC", 0, &["MFC0_DTV", "DP_M_DEC420", "TSD"])
        .scenario("DTV_ISDBTFHD", 0, &["MFC0_DTV", "DP_M_DEC420", "CHDEC", "TSD"])
        .scenario("DTV_DVBT2UHD", 0, &["DVDE0_HEVC", "DP_M_DEC420", "CHDEC", "TSD"])
        .scenario("ATV", 0, &["ATV", "DP_M_EXT422"])
        .scenario("FILE_HEVCUHD", 1, &["DVDE0_HEVC", "DP_M_DEC420"])
        .scenario("FILE_VP9UHD", 1, &["DVDE0_VP9", "DP_M_DEC420"])
        .scenario("FILE_H264UHD", 1, &["DVDE0_H264", "DP_M_DEC420"])
        .scenario("FILE_HEVCFHD", 1, &["DVDE1_HEVC", "DP_M_DEC420"])
        .scenario("FILE_MPEG2", 1, &["MFC1_MM", "DP_M_DECFHD"])
        .scenario("FILE_MPEG2_ROT", 1, &["MFC1_MM", "DP_M_DECPROT"])
        .scenario("SCREEN_MIRROR", 1, &["MFC1_MM", "DP_M_DECFHD"])
        .scenario("JPEG_UHD", 1, &["JPEG_UHD", "DP_M_PC"])
        .scenario("MJPEG_FHD", 1, &["MJPEG_FHD", "DP_M_PC"])
        .scenario("MJPEG_UHD", 1, &["MJPEG_UHD", "DP_M_PC"])
        .scenario("HDMI", 2, &["HDMI", "DP_M_EXT422"])
        .scenario("HDMIPC", 2, &["HDMI", "DP_M_PC"])
        .scenario("TV2MOBILE", 3, &["DP_S_CLONE", "ENCODER"])
        .scenario("DTV_PIP", 4, &["MFC1_DTV", "DP_S_DEC420"])
        .scenario("RETAIL_MODE", 5, &["GFX1"])
        .scenario("PVR_REC", 6, &["PVR0", "TSD"])
        .scenario("PVR_RECDUAL", 7, &["PVR0", "PVR1", "TSD"])
        .scenario("WEBBROWSER", 8, &["CURSOR"])
        .build()
        .expect("reference catalog is valid")
}

/// A simulation allocator over the reference regions.
pub fn reference_sim() -> SimAllocator {
    SimAllocator::new(&AllocatorConfig::default(), &reference_regions())
        .expect("reference regions are valid")
}

/// An engine over the reference catalog and regions with default config.
pub fn reference_engine() -> ScenarioEngine<SimAllocator> {
    reference_engine_with(EngineConfig::default())
}

/// An engine over the reference catalog and regions.
pub fn reference_engine_with(config: EngineConfig) -> ScenarioEngine<SimAllocator> {
    ScenarioEngine::new(Arc::new(reference_catalog()), reference_sim(), config)
        .expect("reference catalog fits reference regions")
}
