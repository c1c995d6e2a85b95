// SPDX-License-Identifier: AGPL-3.0-only

//! Pure Rust driver for the memory-mapped dot-product accelerator (DSA).
//!
//! The device computes one f32 inner product per request. It is reached only
//! through four 32-bit registers and two scratch SRAMs (see `dsa-chip`); it
//! raises no interrupts, has no DMA and reports no errors of its own.
//!
//! # Layers
//!
//! ```text
//! DotProduct            ─ what callers use: one inner product per call
//!   ├─ Accelerator      ─ owned handle: handshake + bounded wait + stats
//!   └─ SharedAccelerator─ Arc<Mutex<Accelerator>> for several callers
//! AcceleratorPort       ─ register-level access
//!   ├─ MmioPort         ─ volatile access to the physical window
//!   └─ SimulatedPort    ─ in-memory device model, fault injection
//! ```
//!
//! # Quick start
//!
//! ```
//! use dsa_driver::{Accelerator, DotProduct, HandshakeConfig, SimulatedPort};
//! use std::time::Duration;
//!
//! # fn main() -> dsa_driver::Result<()> {
//! let mut acc = Accelerator::new(SimulatedPort::new())
//!     .with_config(HandshakeConfig::default().with_timeout(Duration::from_millis(10)));
//!
//! let out = acc.dot(&[1.0, 2.0], &[3.0, 4.0])?;
//! assert_eq!(out, 11.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
pub mod clock;
mod error;
pub mod handshake;
mod port;
mod shared;

pub use backends::{reference_dot, MmioPort, SimFault, SimRequest, SimulatedPort};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DsaError, Result};
pub use handshake::{Accelerator, CancelToken, DotProduct, HandshakeConfig, HandshakeStats};
pub use port::{select_port, AcceleratorPort, PortSelection, PortType};
pub use shared::SharedAccelerator;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Accelerator, AcceleratorPort, CancelToken, DotProduct, DsaError, HandshakeConfig,
        MmioPort, PortSelection, Result, SharedAccelerator, SimulatedPort,
    };
}
