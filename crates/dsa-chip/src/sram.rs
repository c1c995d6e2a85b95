// SPDX-License-Identifier: AGPL-3.0-only

//! Scratch SRAM layout.
//!
//! Two fixed-capacity f32 arrays sit behind the control registers. A request
//! of `COUNT` elements reads `vector[0..COUNT]` and `weight[0..COUNT]`;
//! anything past `COUNT` is ignored. `COUNT` must never exceed
//! [`CAPACITY`].

/// Offset of the input-vector SRAM from the window base.
pub const VECTOR_SRAM: usize = 0x1000;

/// Offset of the weight SRAM from the window base.
pub const WEIGHT_SRAM: usize = 0x2000;

/// Size in bytes of each SRAM.
pub const SRAM_BYTES: usize = 0x1000; // 4 KiB

/// Width of one SRAM element (f32).
pub const ELEMENT_BYTES: usize = 4;

/// Number of f32 elements each SRAM holds.
pub const CAPACITY: usize = SRAM_BYTES / ELEMENT_BYTES;

/// Which scratch buffer a staging write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sram {
    /// Input activations.
    Vector,
    /// Per-neuron weights (bias excluded).
    Weight,
}

impl Sram {
    /// Byte offset of this SRAM from the window base.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::Vector => VECTOR_SRAM,
            Self::Weight => WEIGHT_SRAM,
        }
    }

    /// Byte offset of element `index` within the window.
    #[must_use]
    pub const fn element_offset(self, index: usize) -> usize {
        self.offset() + index * ELEMENT_BYTES
    }
}

impl std::fmt::Display for Sram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vector => write!(f, "vector SRAM"),
            Self::Weight => write!(f, "weight SRAM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_fits_mnist_input() {
        // 28×28 images must fit in a single request
        assert_eq!(CAPACITY, 1024);
        assert!(CAPACITY >= 28 * 28);
    }

    #[test]
    fn srams_do_not_overlap() {
        assert!(VECTOR_SRAM + SRAM_BYTES <= WEIGHT_SRAM);
        assert_eq!(Sram::Vector.element_offset(CAPACITY), WEIGHT_SRAM);
    }
}
