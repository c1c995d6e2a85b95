// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for network construction, loading and inference

use dsa_driver::DsaError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for network operations
pub type Result<T> = std::result::Result<T, NeuroNetError>;

/// Errors that can occur while building, loading or evaluating a network
#[derive(Debug, Error)]
pub enum NeuroNetError {
    /// Network shape rejected at construction; nothing was allocated
    #[error("Invalid network configuration: {reason}")]
    Configuration {
        /// Reason for rejection
        reason: String,
    },

    /// Weight source shorter than the network needs
    #[error("Weight source too short: got {got} values, need {expected}")]
    WeightLengthMismatch {
        /// Values the layout requires
        expected: usize,
        /// Values supplied
        got: usize,
    },

    /// Input vector length differs from the input layer width
    #[error("Input length mismatch: got {got} values, input layer has {expected}")]
    InputLengthMismatch {
        /// Input layer width
        expected: usize,
        /// Values supplied
        got: usize,
    },

    /// Inference requested before any weights were loaded
    #[error("No weights loaded; call load() first")]
    WeightsNotLoaded,

    /// The accelerator never signalled completion
    #[error("Accelerator unresponsive after {polls} polls ({elapsed_us} µs)")]
    AcceleratorUnresponsive {
        /// `ready` reads performed
        polls: u32,
        /// Time waited in microseconds
        elapsed_us: u64,
    },

    /// Any other accelerator failure
    #[error("Accelerator error: {source}")]
    Accelerator {
        /// Underlying driver error
        source: DsaError,
    },

    /// Model or input file is malformed
    #[error("Failed to parse {what}: {reason}")]
    ParseError {
        /// What was being parsed
        what: &'static str,
        /// Reason for failure
        reason: String,
    },

    /// File not found or cannot be read
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl NeuroNetError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error(what: &'static str, reason: impl Into<String>) -> Self {
        Self::ParseError {
            what,
            reason: reason.into(),
        }
    }
}

impl From<DsaError> for NeuroNetError {
    fn from(err: DsaError) -> Self {
        match err {
            DsaError::Unresponsive { polls, elapsed_us } => {
                Self::AcceleratorUnresponsive { polls, elapsed_us }
            }
            source => Self::Accelerator { source },
        }
    }
}
