//! Test utilities and mock types for smem development.
//!
//! Provides the reference DTV catalog and region geometry
//! ([`fixtures`]), a [`MockDevice`] implementing the driver control
//! surface, a seeded [`RandomWalk`] start/stop driver, and
//! [`init_test_logging`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod mock;
pub mod walk;

use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub use mock::{Fault, FaultQueue, MockDevice};
pub use walk::{RandomWalk, Step};

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
