// SPDX-License-Identifier: AGPL-3.0-only

//! Request/acknowledge handshake with the accelerator
//!
//! One request computes one inner product. The device has no interrupts, no
//! DMA and no request IDs, so the sequence below is the whole protocol and a
//! second request must never start before the first is acknowledged:
//!
//! ```text
//!  1. stage vector  ─▶ vector SRAM
//!  2. stage weights ─▶ weight SRAM
//!  3. COUNT   ← n
//!  4. TRIGGER ← 1
//!  5. spin until READY ≠ 0      (bounded: max polls / timeout / cancel)
//!  6. READY   ← 0
//!  7. read RESULT               (bias not included)
//! ```

use crate::clock::{Clock, SystemClock};
use crate::error::{DsaError, Result};
use crate::port::AcceleratorPort;
use dsa_chip::sram::Sram;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Budget for the `ready` wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Maximum number of `ready` reads per request (at least 1)
    pub max_polls: u32,

    /// Maximum wall-clock wait per request, measured on the accelerator's clock
    pub timeout: Option<Duration>,
}

impl HandshakeConfig {
    /// Default poll budget per request.
    pub const DEFAULT_MAX_POLLS: u32 = 10_000_000;

    /// Default wall-clock budget per request.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Set the poll budget (clamped to at least one read)
    #[must_use]
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls.max(1);
        self
    }

    /// Set the wall-clock budget
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound the wait by poll count only
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            max_polls: Self::DEFAULT_MAX_POLLS,
            timeout: Some(Self::DEFAULT_TIMEOUT),
        }
    }
}

/// Cooperative cancellation flag checked on every `ready` poll
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of any wait observing this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handshake counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeStats {
    /// Completed requests
    pub requests: u64,
    /// `ready` reads across all completed requests
    pub total_polls: u64,
    /// Worst-case `ready` reads for a single request
    pub max_polls: u32,
}

impl HandshakeStats {
    /// Mean `ready` reads per completed request
    pub fn mean_polls(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = self.total_polls as f64 / self.requests as f64;
        mean
    }

    fn record(&mut self, polls: u32) {
        self.requests += 1;
        self.total_polls += u64::from(polls);
        self.max_polls = self.max_polls.max(polls);
    }
}

/// Anything that computes one inner product per call
///
/// Implemented by [`Accelerator`] (exclusive handle) and
/// [`SharedAccelerator`](crate::SharedAccelerator) (lock-serialized handle).
pub trait DotProduct {
    /// Longest vector a single request accepts
    fn capacity(&self) -> usize;

    /// Inner product of `vector` and `weights` (equal lengths)
    ///
    /// # Errors
    ///
    /// Returns error if the slices differ in length, exceed capacity, or the
    /// device fails to complete the request.
    fn dot(&mut self, vector: &[f32], weights: &[f32]) -> Result<f32>;

    /// Counters accumulated so far
    fn stats(&self) -> HandshakeStats;
}

/// Owned accelerator handle: one port, its wait budget, and its clock
#[derive(Debug)]
pub struct Accelerator<P, C = SystemClock> {
    port: P,
    config: HandshakeConfig,
    clock: C,
    cancel: Option<CancelToken>,
    stats: HandshakeStats,
}

impl<P: AcceleratorPort> Accelerator<P> {
    /// Wrap a port with the default budget and the system clock
    pub fn new(port: P) -> Self {
        debug!("Accelerator on {} port, capacity {}", port.port_type(), port.capacity());
        Self {
            port,
            config: HandshakeConfig::default(),
            clock: SystemClock::new(),
            cancel: None,
            stats: HandshakeStats::default(),
        }
    }
}

impl<P: AcceleratorPort, C: Clock> Accelerator<P, C> {
    /// Replace the wait budget
    #[must_use]
    pub fn with_config(mut self, config: HandshakeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock used for the wall-clock budget
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Accelerator<P, C2> {
        Accelerator {
            port: self.port,
            config: self.config,
            clock,
            cancel: self.cancel,
            stats: self.stats,
        }
    }

    /// Observe `token` on every `ready` poll
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Wait budget in force
    pub const fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Underlying port
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Underlying port, mutably
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port
    pub fn into_port(self) -> P {
        self.port
    }

    /// Zero the counters
    pub fn reset_stats(&mut self) {
        self.stats = HandshakeStats::default();
    }

    /// Run one full handshake and return the raw inner product
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `vector` and `weights` differ in length
    /// - the request exceeds the SRAM capacity
    /// - any register access fails
    /// - `ready` is not asserted within the budget ([`DsaError::Unresponsive`])
    /// - the cancel token fires ([`DsaError::Cancelled`])
    pub fn request(&mut self, vector: &[f32], weights: &[f32]) -> Result<f32> {
        if vector.len() != weights.len() {
            return Err(DsaError::LengthMismatch {
                vector: vector.len(),
                weights: weights.len(),
            });
        }
        let capacity = self.port.capacity();
        if vector.len() > capacity {
            return Err(DsaError::CapacityExceeded {
                requested: vector.len(),
                capacity,
            });
        }
        let count = u32::try_from(vector.len()).map_err(|_| DsaError::CapacityExceeded {
            requested: vector.len(),
            capacity,
        })?;

        self.port.stage(Sram::Vector, vector)?;
        self.port.stage(Sram::Weight, weights)?;
        self.port.write_count(count)?;
        self.port.trigger()?;

        let polls = self.wait_ready()?;

        self.port.clear_ready()?;
        let result = self.port.read_result()?;

        self.stats.record(polls);
        trace!("Request count={count} → {result} after {polls} polls");
        Ok(result)
    }

    /// Spin on `ready`, returning the number of reads it took
    fn wait_ready(&mut self) -> Result<u32> {
        let HandshakeConfig { max_polls, timeout } = self.config;
        let max_polls = max_polls.max(1);
        let start = self.clock.now();
        let mut polls: u32 = 0;

        loop {
            let ready = self.port.read_ready()?;
            polls += 1;
            if ready != 0 {
                return Ok(polls);
            }

            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                debug!("Handshake cancelled after {polls} polls");
                return Err(DsaError::Cancelled { polls });
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if polls >= max_polls || timeout.is_some_and(|limit| elapsed >= limit) {
                let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
                tracing::warn!("Accelerator unresponsive: {polls} polls, {elapsed_us} µs");
                return Err(DsaError::Unresponsive { polls, elapsed_us });
            }

            std::hint::spin_loop();
        }
    }
}

impl<P: AcceleratorPort, C: Clock> DotProduct for Accelerator<P, C> {
    fn capacity(&self) -> usize {
        self.port.capacity()
    }

    fn dot(&mut self, vector: &[f32], weights: &[f32]) -> Result<f32> {
        self.request(vector, weights)
    }

    fn stats(&self) -> HandshakeStats {
        self.stats
    }
}
