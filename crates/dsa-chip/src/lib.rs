// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the dot-product domain-specific accelerator (DSA).
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the device: the physical window, register offsets, the two
//! scratch SRAMs, and the handshake constants a requester must honour.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Control register map (`ready`, `count`, `result`, `trigger`) |
//! | [`sram`] | Vector / weight scratch SRAM layout and capacities |
//!
//! # Window layout
//!
//! ```text
//! 0xC400_0000  ┌──────────────────────┐
//!              │ ready   count        │  control registers (16 B)
//!              │ result  trigger      │
//! 0xC400_1000  ├──────────────────────┤
//!              │ vector SRAM (4 KiB)  │  1024 × f32
//! 0xC400_2000  ├──────────────────────┤
//!              │ weight SRAM (4 KiB)  │  1024 × f32
//! 0xC400_3000  └──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod regs;
pub mod sram;

/// Total bytes a mapping must cover to reach every register and both SRAMs.
pub const WINDOW_SIZE: usize = sram::WEIGHT_SRAM + sram::SRAM_BYTES;
