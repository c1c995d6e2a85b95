// SPDX-License-Identifier: AGPL-3.0-only

//! Control register map for the DSA.
//!
//! All registers are 32 bits wide and live at fixed offsets from
//! [`DSA_BASE`]. The device raises no interrupts and has no DMA: the
//! requester stages both vectors itself and polls [`READY`].
//!
//! ```text
//! 0x0000  READY    u32  device writes non-zero when RESULT is valid;
//!                       requester writes 0 after consuming it
//! 0x0004  COUNT    u32  element count of the staged request
//! 0x0008  RESULT   f32  inner product of the last request (no bias)
//! 0x000C  TRIGGER  u32  write non-zero to start over the staged vectors
//! ```

// ── Window ───────────────────────────────────────────────────────────────────

/// Physical base address of the DSA window.
pub const DSA_BASE: u64 = 0xC400_0000;

// ── Handshake registers ──────────────────────────────────────────────────────

/// Completion flag. Non-zero once `RESULT` holds the finished inner product.
pub const READY: usize = 0x0000;

/// Number of elements in the current request.
pub const COUNT: usize = 0x0004;

/// IEEE-754 single-precision inner product of the last request.
pub const RESULT: usize = 0x0008;

/// Write strobe; any non-zero value starts computation.
pub const TRIGGER: usize = 0x000C;

/// Width of every control register in bytes.
pub const REG_WIDTH: usize = 4;

// ── Register values ──────────────────────────────────────────────────────────

/// Values written to / read from the handshake registers.
pub mod value {
    /// Value written to `TRIGGER` to start a request.
    pub const TRIGGER_START: u32 = 1;
    /// Value the requester writes to `READY` to acknowledge a result.
    pub const READY_CLEAR: u32 = 0;
}

/// Absolute physical address of a register offset.
#[must_use]
pub const fn physical(offset: usize) -> u64 {
    DSA_BASE + offset as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_offsets_non_overlapping() {
        let regs = [READY, COUNT, RESULT, TRIGGER];
        for (i, a) in regs.iter().enumerate() {
            for b in &regs[i + 1..] {
                assert!(a.abs_diff(*b) >= REG_WIDTH);
            }
        }
    }

    #[test]
    fn physical_addresses_match_device() {
        assert_eq!(physical(READY), 0xC400_0000);
        assert_eq!(physical(COUNT), 0xC400_0004);
        assert_eq!(physical(RESULT), 0xC400_0008);
        assert_eq!(physical(TRIGGER), 0xC400_000C);
    }

    #[test]
    fn trigger_start_is_nonzero() {
        assert_ne!(value::TRIGGER_START, 0);
        assert_eq!(value::READY_CLEAR, 0);
    }
}
