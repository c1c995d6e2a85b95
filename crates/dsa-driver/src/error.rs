// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for accelerator operations

use thiserror::Error;

/// Result type alias for accelerator operations
pub type Result<T> = std::result::Result<T, DsaError>;

/// Errors that can occur while driving the accelerator
#[derive(Debug, Error)]
pub enum DsaError {
    /// Request longer than the scratch SRAMs can hold
    #[error("Request of {requested} elements exceeds SRAM capacity of {capacity}")]
    CapacityExceeded {
        /// Requested element count
        requested: usize,
        /// Elements each SRAM holds
        capacity: usize,
    },

    /// Vector and weight slices of a request differ in length
    #[error("Vector/weight length mismatch: {vector} vs {weights}")]
    LengthMismatch {
        /// Staged vector length
        vector: usize,
        /// Staged weight length
        weights: usize,
    },

    /// The device never raised `ready` within the handshake budget
    #[error("Accelerator unresponsive: ready not asserted after {polls} polls ({elapsed_us} µs)")]
    Unresponsive {
        /// Number of `ready` reads performed
        polls: u32,
        /// Time spent waiting, in microseconds
        elapsed_us: u64,
    },

    /// The wait was cancelled through a [`CancelToken`](crate::CancelToken)
    #[error("Handshake cancelled after {polls} polls")]
    Cancelled {
        /// Number of `ready` reads performed before cancellation
        polls: u32,
    },

    /// The register window could not be mapped
    #[error("Failed to map accelerator window: {reason}")]
    MappingFailed {
        /// Reason for failure
        reason: String,
    },

    /// Register or SRAM access failed
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// Reason for failure
        reason: String,
    },

    /// Accelerator handle is in an invalid state
    #[error("Accelerator in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// I/O error while opening the memory device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl DsaError {
    /// Create a mapping failed error
    pub fn mapping_failed(reason: impl Into<String>) -> Self {
        Self::MappingFailed {
            reason: reason.into(),
        }
    }

    /// Create a transfer failed error
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Whether this error means the device never completed a request
    pub const fn is_unresponsive(&self) -> bool {
        matches!(self, Self::Unresponsive { .. })
    }
}
