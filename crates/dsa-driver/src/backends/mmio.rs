// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped accelerator port
//!
//! Volatile access to the physical register window. Two ways to obtain one:
//!
//! - [`MmioPort::open`] maps the window through a memory device (usually
//!   `/dev/mem`, opened `O_SYNC` so the kernel maps it uncached) with
//!   `rustix::mm::mmap`.
//! - [`MmioPort::from_raw`] adopts a window that is already addressable,
//!   e.g. an identity-mapped peripheral region on a bare-metal target.
//!
//! All accesses are bounds-checked against the window size before the
//! volatile read/write.

// Registers are 4-byte aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]

use crate::error::{DsaError, Result};
use crate::port::{AcceleratorPort, PortType};
use dsa_chip::regs::{self, value};
use dsa_chip::sram::{self, Sram};
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;

/// Memory device mapped by default.
pub const DEFAULT_MEM_DEVICE: &str = "/dev/mem";

/// Who owns the memory behind the window
#[derive(Debug)]
enum Mapping {
    /// Mapped by us; unmapped on drop. The file keeps the fd alive.
    Owned { _file: File },
    /// Provided by the caller; never unmapped here.
    Borrowed,
}

/// Accelerator port backed by the physical register window
#[derive(Debug)]
pub struct MmioPort {
    ptr: NonNull<u8>,
    size: usize,
    base: u64,
    mapping: Mapping,
}

impl MmioPort {
    /// Map the register window at physical address `base` through `path`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The memory device cannot be opened (usually needs root)
    /// - `base` is not page aligned
    /// - mmap fails
    pub fn open(path: impl AsRef<Path>, base: u64) -> Result<Self> {
        let path = path.as_ref();
        let size = dsa_chip::WINDOW_SIZE;

        if base % page_size() as u64 != 0 {
            return Err(DsaError::mapping_failed(format!(
                "Base {base:#x} is not page aligned"
            )));
        }

        tracing::debug!("Mapping DSA window {base:#x}+{size:#x} via {}", path.display());

        // OFlags::SYNC.bits() is a small positive flag value
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(path)
            .inspect_err(|e| tracing::warn!("Cannot open {}: {e}", path.display()))?;

        // SAFETY: mmap necessary for MMIO - maps the device window into the process.
        // Invariants: (1) fd valid, just opened; (2) size non-zero constant;
        // (3) offset page aligned (checked above); (4) MAP_SHARED so writes reach
        // the device; (5) file stored in self so the fd outlives the mapping.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                base,
            )
            .map_err(|e| DsaError::mapping_failed(format!("mmap failed: {e}")))?
        };

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| DsaError::mapping_failed("mmap returned a null pointer"))?;

        tracing::info!("Mapped DSA window {base:#x} at {ptr:p} ({size:#x} bytes)");

        Ok(Self {
            ptr,
            size,
            base,
            mapping: Mapping::Owned { _file: file },
        })
    }

    /// Map the window at its standard address through `/dev/mem`
    ///
    /// # Errors
    ///
    /// See [`MmioPort::open`].
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_MEM_DEVICE, regs::DSA_BASE)
    }

    /// Adopt an already addressable register window
    ///
    /// # Errors
    ///
    /// Returns error if `size` is smaller than [`dsa_chip::WINDOW_SIZE`].
    ///
    /// # Safety
    ///
    /// `ptr` must be 4-byte aligned and valid for volatile reads and writes of
    /// `size` bytes for the whole lifetime of the returned port, and nothing
    /// else may access that memory while the port is in use.
    pub unsafe fn from_raw(ptr: NonNull<u8>, size: usize) -> Result<Self> {
        if size < dsa_chip::WINDOW_SIZE {
            return Err(DsaError::mapping_failed(format!(
                "Window of {size:#x} bytes is smaller than the {:#x} byte register map",
                dsa_chip::WINDOW_SIZE
            )));
        }
        tracing::debug!("Adopted DSA window at {ptr:p} ({size:#x} bytes)");
        Ok(Self {
            ptr,
            size,
            base: ptr.as_ptr() as u64,
            mapping: Mapping::Borrowed,
        })
    }

    /// Physical (or adopted) base address of the window
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Size of the mapped window in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.size {
            return Err(DsaError::transfer_failed(format!(
                "Out of bounds access: offset={offset:#x}, size={len}, limit={:#x}",
                self.size
            )));
        }
        Ok(())
    }

    fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check_bounds(offset, regs::REG_WIDTH)?;

        // SAFETY: read_volatile necessary for MMIO - the device changes the value.
        // Invariants: (1) ptr valid for self.size (mmap or from_raw contract);
        // (2) offset+4 <= size (checked); (3) register offsets are 4-byte aligned.
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("Read u32 @ {offset:#x} = {value:#x}");
        Ok(value)
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check_bounds(offset, regs::REG_WIDTH)?;

        tracing::trace!("Write u32 @ {offset:#x} = {value:#x}");

        // SAFETY: write_volatile necessary for MMIO - writes have device side effects
        // and must not be elided or reordered. Same invariants as read_u32.
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
        Ok(())
    }
}

impl AcceleratorPort for MmioPort {
    fn capacity(&self) -> usize {
        sram::CAPACITY
    }

    fn stage(&mut self, target: Sram, data: &[f32]) -> Result<()> {
        if data.len() > sram::CAPACITY {
            return Err(DsaError::CapacityExceeded {
                requested: data.len(),
                capacity: sram::CAPACITY,
            });
        }
        self.check_bounds(target.offset(), data.len() * sram::ELEMENT_BYTES)?;

        // Element-wise volatile stores: SRAM behind the bus must see every word
        for (i, &x) in data.iter().enumerate() {
            // SAFETY: element_offset(i) + 4 <= offset + len*4, bounds checked above;
            // SRAM words are 4-byte aligned.
            unsafe {
                self.ptr
                    .as_ptr()
                    .add(target.element_offset(i))
                    .cast::<u32>()
                    .write_volatile(x.to_bits());
            }
        }

        tracing::trace!("Staged {} elements into {target}", data.len());
        Ok(())
    }

    fn write_count(&mut self, count: u32) -> Result<()> {
        self.write_u32(regs::COUNT, count)
    }

    fn trigger(&mut self) -> Result<()> {
        self.write_u32(regs::TRIGGER, value::TRIGGER_START)
    }

    fn read_ready(&mut self) -> Result<u32> {
        self.read_u32(regs::READY)
    }

    fn clear_ready(&mut self) -> Result<()> {
        self.write_u32(regs::READY, value::READY_CLEAR)
    }

    fn read_result(&mut self) -> Result<f32> {
        self.read_u32(regs::RESULT).map(f32::from_bits)
    }

    fn port_type(&self) -> PortType {
        PortType::Mmio
    }
}

impl Drop for MmioPort {
    fn drop(&mut self) {
        if let Mapping::Owned { .. } = self.mapping {
            tracing::debug!("Unmapping DSA window {:#x}", self.base);

            // SAFETY: munmap with the pointer and length returned by mmap in open();
            // Drop runs at most once and no references into the window outlive self.
            unsafe {
                if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                    tracing::error!("munmap failed during drop: {e}");
                }
            }
        }
    }
}

// SAFETY: Send - MmioPort owns (or has exclusive use of) the window. Moving it
// between threads doesn't invalidate the mapping; there is no thread-local state.
unsafe impl Send for MmioPort {}

fn page_size() -> usize {
    rustix::param::page_size()
}
