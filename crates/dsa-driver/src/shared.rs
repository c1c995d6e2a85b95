// SPDX-License-Identifier: AGPL-3.0-only

//! Lock-serialized accelerator handle for multiple logical callers
//!
//! The handshake has no request IDs, so two requesters interleaving register
//! writes would corrupt each other's results. [`SharedAccelerator`] holds one
//! mutex across the whole stage/trigger/wait/read sequence of each request,
//! not just around individual register accesses.

use crate::clock::{Clock, SystemClock};
use crate::error::{DsaError, Result};
use crate::handshake::{Accelerator, DotProduct, HandshakeStats};
use crate::port::AcceleratorPort;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable, thread-safe handle to one accelerator
#[derive(Debug)]
pub struct SharedAccelerator<P, C = SystemClock> {
    inner: Arc<Mutex<Accelerator<P, C>>>,
}

impl<P, C> Clone for SharedAccelerator<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: AcceleratorPort, C: Clock> SharedAccelerator<P, C> {
    /// Share an accelerator handle
    pub fn new(accelerator: Accelerator<P, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(accelerator)),
        }
    }

    /// Hold the accelerator exclusively for several requests
    ///
    /// # Errors
    ///
    /// Returns error if a previous holder panicked mid-handshake; the device
    /// state is unknown at that point.
    pub fn lock(&self) -> Result<MutexGuard<'_, Accelerator<P, C>>> {
        self.inner
            .lock()
            .map_err(|_| DsaError::invalid_state("accelerator lock poisoned mid-handshake"))
    }

    /// Number of live handles
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<P: AcceleratorPort, C: Clock> DotProduct for SharedAccelerator<P, C> {
    fn capacity(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .port()
            .capacity()
    }

    fn dot(&mut self, vector: &[f32], weights: &[f32]) -> Result<f32> {
        self.lock()?.request(vector, weights)
    }

    fn stats(&self) -> HandshakeStats {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{reference_dot, SimulatedPort};
    use std::thread;

    #[test]
    fn concurrent_callers_get_their_own_results() {
        let shared = SharedAccelerator::new(Accelerator::new(
            SimulatedPort::new().with_latency_polls(8),
        ));

        let workers: Vec<_> = (0..4)
            .map(|t| {
                let mut acc = shared.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let v: Vec<f32> = (0..16).map(|j| (t * 100 + i + j) as f32).collect();
                        let w: Vec<f32> = (0..16).map(|j| (j % 3) as f32 - 1.0).collect();
                        let got = acc.dot(&v, &w).unwrap();
                        assert_eq!(got.to_bits(), reference_dot(&v, &w).to_bits());
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(shared.stats().requests, 200);
        assert_eq!(shared.lock().unwrap().port().protocol_violations(), 0);
    }

    #[test]
    fn handles_share_one_device() {
        let shared = SharedAccelerator::new(Accelerator::new(SimulatedPort::new()));
        let other = shared.clone();
        assert_eq!(shared.handle_count(), 2);
        assert_eq!(other.capacity(), dsa_chip::sram::CAPACITY);
    }
}
