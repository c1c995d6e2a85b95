// SPDX-License-Identifier: AGPL-3.0-only

//! Accelerator port implementations
//!
//! Two ports available:
//! - **MMIO**: volatile access to the physical register window (hardware)
//! - **Simulated**: in-memory register model with fault injection (CI, cross-checks)

pub mod mmio;
pub mod simulated;

pub use mmio::MmioPort;
pub use simulated::{reference_dot, SimFault, SimRequest, SimulatedPort};
