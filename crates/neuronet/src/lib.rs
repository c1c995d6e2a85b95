// SPDX-License-Identifier: AGPL-3.0-only

#![deny(unsafe_code)]

//! Fully-connected network inference on the dot-product accelerator
//!
//! A network of up to [`MAX_LAYERS`] layers is stored in two flat arenas
//! (activations and weights) with a per-neuron layout record of offsets into
//! them. Inference walks the non-input neurons in order and hands each one's
//! inner product to the accelerator; the bias add, `relu` and arg-max run on
//! the host.
//!
//! # Example
//!
//! ```
//! use dsa_driver::{Accelerator, SimulatedPort};
//! use neuronet::{InferenceEngine, Network};
//!
//! # fn main() -> neuronet::Result<()> {
//! let mut net = Network::new(3, &[2, 2, 1])?;
//! net.load(&[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0])?;
//!
//! let mut engine = InferenceEngine::new(Accelerator::new(SimulatedPort::new()));
//! let class = engine.evaluate(&mut net, &[1.0, 1.0])?;
//!
//! assert_eq!(class, 0);
//! assert_eq!(net.output(), &[4.0]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod activation;
mod error;
mod inference;
pub mod model_file;
mod network;
mod shape;

pub use activation::relu;
pub use error::{NeuroNetError, Result};
pub use inference::{argmax, Evaluation, InferenceEngine};
pub use model_file::{encode_model, ModelFile};
pub use network::{Network, NeuronLayout, Span};
pub use shape::{Shape, MAX_LAYERS};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{InferenceEngine, ModelFile, Network, NeuroNetError, Result, Shape};
}
