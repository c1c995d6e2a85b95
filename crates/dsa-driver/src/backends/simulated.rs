// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated accelerator port
//!
//! Implements [`AcceleratorPort`] with an in-memory register file and f32 CPU
//! arithmetic. This enables:
//!
//! 1. **CI without hardware**: the full handshake runs against a device model
//!    that behaves like the real window (result only valid after `ready`).
//!
//! 2. **Fault injection**: [`SimFault::NeverReady`] models a wedged device so
//!    the bounded wait can be exercised deterministically.
//!
//! 3. **Ground truth**: the result is computed with [`reference_dot`], the
//!    same sequential sum callers use to cross-check hardware. Served requests
//!    can be recorded with [`SimulatedPort::with_history`].
//!
//! ## Device model
//!
//! ```text
//! trigger ──▶ busy (latency_polls reads of READY return 0) ──▶ READY=1, RESULT valid
//!                                                              │
//!                          requester writes READY=0 ◀──────────┘
//! ```

use crate::error::{DsaError, Result};
use crate::port::{AcceleratorPort, PortType};
use dsa_chip::sram::{self, Sram};
use tracing::{debug, warn};

/// Sequential inner product of two equal-length slices.
///
/// Elements past the shorter slice are ignored.
#[must_use]
pub fn reference_dot(vector: &[f32], weights: &[f32]) -> f32 {
    vector.iter().zip(weights).map(|(v, w)| v * w).sum()
}

/// Injected device misbehaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimFault {
    /// Device behaves
    #[default]
    None,
    /// Device accepts triggers but never asserts `ready`
    NeverReady,
}

/// One request served by the simulated device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimRequest {
    /// `COUNT` at trigger time
    pub count: usize,
    /// Value placed in `RESULT`
    pub result: f32,
}

/// In-flight computation
#[derive(Debug, Clone, Copy)]
struct Pending {
    polls_left: u32,
    result: f32,
}

/// Simulated accelerator port
#[derive(Debug)]
pub struct SimulatedPort {
    vector: Vec<f32>,
    weight: Vec<f32>,
    count: u32,
    ready: u32,
    result: f32,
    pending: Option<Pending>,

    latency_polls: u32,
    fault: SimFault,

    history: Option<Vec<SimRequest>>,
    /// Triggers issued while a previous result was still unacknowledged
    protocol_violations: u32,
}

impl SimulatedPort {
    /// Create a well-behaved device with hardware-sized SRAMs that completes
    /// on the first `ready` poll.
    pub fn new() -> Self {
        Self {
            vector: vec![0.0; sram::CAPACITY],
            weight: vec![0.0; sram::CAPACITY],
            count: 0,
            ready: 0,
            result: 0.0,
            pending: None,
            latency_polls: 0,
            fault: SimFault::None,
            history: None,
            protocol_violations: 0,
        }
    }

    /// Number of `ready` polls that read 0 before a triggered request completes.
    #[must_use]
    pub fn with_latency_polls(mut self, polls: u32) -> Self {
        self.latency_polls = polls;
        self
    }

    /// Inject a fault.
    #[must_use]
    pub fn with_fault(mut self, fault: SimFault) -> Self {
        self.fault = fault;
        self
    }

    /// Record every served request (off by default; grows with each request).
    #[must_use]
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.history = enabled.then(Vec::new);
        self
    }

    /// Resize both scratch SRAMs (models smaller device variants).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.vector = vec![0.0; capacity];
        self.weight = vec![0.0; capacity];
        self
    }

    /// Requests served so far, oldest first; empty unless recording is on.
    pub fn history(&self) -> &[SimRequest] {
        self.history.as_deref().unwrap_or_default()
    }

    /// Number of triggers issued before the previous result was acknowledged.
    pub const fn protocol_violations(&self) -> u32 {
        self.protocol_violations
    }

    /// Current value of the `COUNT` register.
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Contents of a scratch SRAM.
    pub fn sram(&self, which: Sram) -> &[f32] {
        match which {
            Sram::Vector => &self.vector,
            Sram::Weight => &self.weight,
        }
    }

    /// Whether a triggered request has not yet completed.
    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for SimulatedPort {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorPort for SimulatedPort {
    fn capacity(&self) -> usize {
        self.vector.len()
    }

    fn stage(&mut self, which: Sram, data: &[f32]) -> Result<()> {
        let capacity = self.capacity();
        if data.len() > capacity {
            return Err(DsaError::CapacityExceeded {
                requested: data.len(),
                capacity,
            });
        }
        let target = match which {
            Sram::Vector => &mut self.vector,
            Sram::Weight => &mut self.weight,
        };
        target[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn write_count(&mut self, count: u32) -> Result<()> {
        self.count = count;
        Ok(())
    }

    fn trigger(&mut self) -> Result<()> {
        let count = self.count as usize;
        if count > self.capacity() {
            return Err(DsaError::CapacityExceeded {
                requested: count,
                capacity: self.capacity(),
            });
        }
        if self.ready != 0 {
            self.protocol_violations += 1;
            warn!("SimulatedPort: trigger while previous result unacknowledged");
        }

        let result = reference_dot(&self.vector[..count], &self.weight[..count]);
        self.pending = Some(Pending {
            polls_left: self.latency_polls,
            result,
        });
        debug!("SimulatedPort: triggered count={count}");
        Ok(())
    }

    fn read_ready(&mut self) -> Result<u32> {
        if self.fault == SimFault::NeverReady {
            return Ok(self.ready);
        }
        if let Some(pending) = self.pending.as_mut() {
            if pending.polls_left == 0 {
                self.result = pending.result;
                self.ready = 1;
                if let Some(history) = self.history.as_mut() {
                    history.push(SimRequest {
                        count: self.count as usize,
                        result: pending.result,
                    });
                }
                self.pending = None;
            } else {
                pending.polls_left -= 1;
            }
        }
        Ok(self.ready)
    }

    fn clear_ready(&mut self) -> Result<()> {
        self.ready = 0;
        Ok(())
    }

    fn read_result(&mut self) -> Result<f32> {
        Ok(self.result)
    }

    fn port_type(&self) -> PortType {
        PortType::Simulated
    }
}
