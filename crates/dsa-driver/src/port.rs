// SPDX-License-Identifier: AGPL-3.0-only

//! Port abstraction for the accelerator register window
//!
//! An [`AcceleratorPort`] exposes the device exactly as the hardware does:
//! two scratch SRAMs and four 32-bit registers. It knows nothing about the
//! handshake ordering; that lives in [`crate::handshake`], so every port
//! (real or simulated) is driven through the same protocol code.

use crate::backends::{MmioPort, SimulatedPort};
use crate::error::Result;
use dsa_chip::sram::Sram;
use std::fmt::Debug;
use std::path::PathBuf;

/// Register-level interface to one accelerator instance
///
/// All methods take `&mut self`: the device is a single shared resource and
/// the four-register handshake is not atomic, so a port is only ever driven
/// by one requester at a time.
pub trait AcceleratorPort: Debug + Send {
    /// Number of f32 elements each scratch SRAM holds
    fn capacity(&self) -> usize;

    /// Copy `data` into the start of a scratch SRAM
    ///
    /// # Errors
    ///
    /// Returns error if `data` exceeds the SRAM capacity or the write fails.
    fn stage(&mut self, sram: Sram, data: &[f32]) -> Result<()>;

    /// Write the element count of the pending request
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails.
    fn write_count(&mut self, count: u32) -> Result<()>;

    /// Strobe the trigger register with a non-zero value
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails or the device rejects the
    /// staged request.
    fn trigger(&mut self) -> Result<()>;

    /// Read the `ready` register
    ///
    /// # Errors
    ///
    /// Returns error if the register read fails.
    fn read_ready(&mut self) -> Result<u32>;

    /// Acknowledge a result by writing zero to `ready`
    ///
    /// # Errors
    ///
    /// Returns error if the register write fails.
    fn clear_ready(&mut self) -> Result<()>;

    /// Read the `result` register
    ///
    /// # Errors
    ///
    /// Returns error if the register read fails.
    fn read_result(&mut self) -> Result<f32>;

    /// Port type for diagnostics
    fn port_type(&self) -> PortType;
}

impl<P: AcceleratorPort + ?Sized> AcceleratorPort for Box<P> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn stage(&mut self, sram: Sram, data: &[f32]) -> Result<()> {
        (**self).stage(sram, data)
    }

    fn write_count(&mut self, count: u32) -> Result<()> {
        (**self).write_count(count)
    }

    fn trigger(&mut self) -> Result<()> {
        (**self).trigger()
    }

    fn read_ready(&mut self) -> Result<u32> {
        (**self).read_ready()
    }

    fn clear_ready(&mut self) -> Result<()> {
        (**self).clear_ready()
    }

    fn read_result(&mut self) -> Result<f32> {
        (**self).read_result()
    }

    fn port_type(&self) -> PortType {
        (**self).port_type()
    }
}

/// Port type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    /// Volatile access to the physical register window
    Mmio,

    /// In-memory register model, no hardware required
    Simulated,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Simulated => write!(f, "Simulated"),
        }
    }
}

/// Port selection strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    /// Software model of the device, for CI and cross-checking hardware
    Simulated,

    /// Map the physical window through a memory device
    Mmio {
        /// Memory device to map (usually `/dev/mem`)
        path: PathBuf,
        /// Physical base address of the register window
        base: u64,
    },
}

impl Default for PortSelection {
    fn default() -> Self {
        Self::Mmio {
            path: PathBuf::from(crate::backends::mmio::DEFAULT_MEM_DEVICE),
            base: dsa_chip::regs::DSA_BASE,
        }
    }
}

/// Open the port described by `selection`
///
/// # Errors
///
/// Returns error if the selected port cannot be opened.
pub fn select_port(selection: &PortSelection) -> Result<Box<dyn AcceleratorPort>> {
    match selection {
        PortSelection::Simulated => {
            tracing::info!("Using simulated accelerator port");
            Ok(Box::new(SimulatedPort::new()))
        }
        PortSelection::Mmio { path, base } => {
            let port = MmioPort::open(path, *base)?;
            tracing::info!("Using MMIO accelerator port at {base:#x} via {}", path.display());
            Ok(Box::new(port))
        }
    }
}
