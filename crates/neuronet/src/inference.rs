// SPDX-License-Identifier: AGPL-3.0-only

//! Forward pass on the accelerator
//!
//! One neuron at a time: stage the previous layer's activations and the
//! neuron's weights (bias excluded), run one handshake, add the bias on the
//! host, clamp, store. After the last layer the arg-max of the output block
//! is the class.

use crate::activation::relu;
use crate::error::{NeuroNetError, Result};
use crate::network::Network;
use dsa_driver::{DotProduct, DsaError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Index of the greatest value, first occurrence on ties
///
/// Returns `None` for an empty slice.
pub fn argmax(values: &[f32]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut max = f32::NEG_INFINITY;
    let mut max_idx = 0;
    for (idx, &value) in values.iter().enumerate() {
        if max < value {
            max = value;
            max_idx = idx;
        }
    }
    Some(max_idx)
}

/// Result of one forward pass with metrics
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Arg-max of the output layer
    pub class: usize,

    /// Output layer activations
    pub output: Vec<f32>,

    /// Accelerator requests issued (one per non-input neuron)
    pub requests: u64,

    /// `ready` reads across all requests of this pass
    pub polls: u64,

    /// Wall-clock time of the pass
    pub duration: Duration,
}

impl Evaluation {
    /// Calculate throughput (inferences per second)
    pub fn throughput_ips(&self) -> f64 {
        if self.duration.as_secs_f64() == 0.0 {
            return 0.0;
        }
        1.0 / self.duration.as_secs_f64()
    }

    /// Calculate latency in microseconds
    pub fn latency_us(&self) -> f64 {
        self.duration.as_secs_f64() * 1_000_000.0
    }
}

/// Drives forward passes through an accelerator handle
#[derive(Debug)]
pub struct InferenceEngine<D> {
    accelerator: D,
}

impl<D: DotProduct> InferenceEngine<D> {
    /// Take ownership of an accelerator handle
    pub fn new(accelerator: D) -> Self {
        debug!("Inference engine, request capacity {}", accelerator.capacity());
        Self { accelerator }
    }

    /// Accelerator handle
    pub const fn accelerator(&self) -> &D {
        &self.accelerator
    }

    /// Accelerator handle, mutably
    pub fn accelerator_mut(&mut self) -> &mut D {
        &mut self.accelerator
    }

    /// Release the accelerator handle
    pub fn into_inner(self) -> D {
        self.accelerator
    }

    /// Classify `input`, returning the 0-based output index
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - no weights are loaded
    /// - `input` length differs from the input layer width
    /// - a layer is wider than the accelerator buffers
    /// - a request fails ([`NeuroNetError::AcceleratorUnresponsive`] when the
    ///   device never completes)
    pub fn evaluate(&mut self, network: &mut Network, input: &[f32]) -> Result<usize> {
        self.forward(network, input)?;
        argmax(network.output())
            .ok_or_else(|| NeuroNetError::configuration("network has an empty output layer"))
    }

    /// Classify `input` and report activations and handshake metrics
    ///
    /// # Errors
    ///
    /// See [`InferenceEngine::evaluate`].
    pub fn evaluate_detailed(
        &mut self,
        network: &mut Network,
        input: &[f32],
    ) -> Result<Evaluation> {
        let before = self.accelerator.stats();
        let start = Instant::now();

        let class = self.evaluate(network, input)?;

        let duration = start.elapsed();
        let after = self.accelerator.stats();
        let evaluation = Evaluation {
            class,
            output: network.output().to_vec(),
            requests: after.requests - before.requests,
            polls: after.total_polls - before.total_polls,
            duration,
        };

        info!("Inference complete: class {class} in {duration:?}");
        Ok(evaluation)
    }

    /// Classify each input in order, stopping at the first error
    ///
    /// # Errors
    ///
    /// See [`InferenceEngine::evaluate`].
    pub fn evaluate_batch<I>(&mut self, network: &mut Network, inputs: I) -> Result<Vec<usize>>
    where
        I: IntoIterator,
        I::Item: AsRef<[f32]>,
    {
        inputs
            .into_iter()
            .map(|input| self.evaluate(network, input.as_ref()))
            .collect()
    }

    /// Reject a pass before any state changes
    fn check(&self, network: &Network, input: &[f32]) -> Result<()> {
        if !network.is_loaded() {
            return Err(NeuroNetError::WeightsNotLoaded);
        }
        let expected = network.shape().input_width();
        if input.len() != expected {
            return Err(NeuroNetError::InputLengthMismatch {
                expected,
                got: input.len(),
            });
        }
        let fan_in = network.shape().max_fan_in();
        let capacity = self.accelerator.capacity();
        if fan_in > capacity {
            return Err(DsaError::CapacityExceeded {
                requested: fan_in,
                capacity,
            }
            .into());
        }
        Ok(())
    }

    fn forward(&mut self, network: &mut Network, input: &[f32]) -> Result<()> {
        self.check(network, input)?;

        network.set_input(input);

        // Destination index runs monotonically over every non-input neuron
        for index in network.shape().input_width()..network.total_neurons() {
            let (inner_product, bias) = {
                let (previous, weights, bias) = network.operands(index).ok_or_else(|| {
                    NeuroNetError::configuration(format!("neuron {index} has no operands"))
                })?;
                (self.accelerator.dot(previous, weights)?, bias)
            };
            network.set_activation(index, relu(inner_product + bias));
        }

        debug!("Forward pass done, output {:?}", network.output());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsa_driver::{Accelerator, HandshakeConfig, SimFault, SimulatedPort};

    fn engine() -> InferenceEngine<Accelerator<SimulatedPort>> {
        InferenceEngine::new(Accelerator::new(SimulatedPort::new()))
    }

    fn two_two_one() -> Network {
        let mut net = Network::new(3, &[2, 2, 1]).unwrap();
        net.load(&[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0]).unwrap();
        net
    }

    #[test]
    fn argmax_first_occurrence_wins() {
        assert_eq!(argmax(&[0.2, 0.9, 0.9, 0.1]), Some(1));
        assert_eq!(argmax(&[0.0, 0.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn end_to_end_two_two_one() {
        let mut net = two_two_one();
        let mut engine = engine();
        assert_eq!(engine.evaluate(&mut net, &[1.0, 1.0]).unwrap(), 0);
        assert_eq!(net.layer_values(1).unwrap(), &[2.0, 2.0]);
        assert_eq!(net.output(), &[4.0]);
        assert_eq!(engine.accelerator().stats().requests, 3);
    }

    #[test]
    fn bias_is_last_weight_of_block() {
        // one output neuron: 2·3 + 1·(-1) + bias 10 = 15
        let mut net = Network::new(2, &[2, 1]).unwrap();
        net.load(&[3.0, -1.0, 10.0]).unwrap();
        engine().evaluate(&mut net, &[2.0, 1.0]).unwrap();
        assert_eq!(net.output(), &[15.0]);
    }

    #[test]
    fn negative_preactivation_is_clamped() {
        let mut net = Network::new(2, &[1, 2]).unwrap();
        net.load(&[-1.0, 0.0, 1.0, 0.0]).unwrap();
        let class = engine().evaluate(&mut net, &[5.0]).unwrap();
        assert_eq!(net.output(), &[0.0, 5.0]);
        assert_eq!(class, 1);
    }

    #[test]
    fn rejects_unloaded_network() {
        let mut net = Network::new(2, &[2, 1]).unwrap();
        assert!(matches!(
            engine().evaluate(&mut net, &[1.0, 1.0]),
            Err(NeuroNetError::WeightsNotLoaded)
        ));
    }

    #[test]
    fn rejects_wrong_input_length_without_side_effects() {
        let mut net = two_two_one();
        let mut engine = engine();
        let err = engine.evaluate(&mut net, &[1.0, 1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            NeuroNetError::InputLengthMismatch { expected: 2, got: 3 }
        ));
        assert!(net.neurons().iter().all(|&v| v == 0.0));
        assert_eq!(engine.accelerator().stats().requests, 0);
    }

    #[test]
    fn rejects_layer_wider_than_accelerator() {
        let mut net = Network::new(2, &[8, 1]).unwrap();
        net.load(&[0.0; 9]).unwrap();
        let mut engine =
            InferenceEngine::new(Accelerator::new(SimulatedPort::new().with_capacity(4)));
        assert!(matches!(
            engine.evaluate(&mut net, &[0.0; 8]),
            Err(NeuroNetError::Accelerator {
                source: DsaError::CapacityExceeded { requested: 8, capacity: 4 }
            })
        ));
    }

    #[test]
    fn unresponsive_accelerator_surfaces_distinct_error() {
        let mut net = two_two_one();
        let acc = Accelerator::new(SimulatedPort::new().with_fault(SimFault::NeverReady))
            .with_config(HandshakeConfig::default().with_max_polls(1000).without_timeout());
        let err = InferenceEngine::new(acc)
            .evaluate(&mut net, &[1.0, 1.0])
            .unwrap_err();
        assert!(matches!(
            err,
            NeuroNetError::AcceleratorUnresponsive { polls: 1000, .. }
        ));
    }

    #[test]
    fn activations_overwritten_each_pass() {
        let mut net = two_two_one();
        let mut engine = engine();
        engine.evaluate(&mut net, &[1.0, 1.0]).unwrap();
        engine.evaluate(&mut net, &[0.5, 0.0]).unwrap();
        assert_eq!(net.output(), &[1.0]);
    }

    #[test]
    fn detailed_evaluation_reports_metrics() {
        let mut net = two_two_one();
        let mut engine =
            InferenceEngine::new(Accelerator::new(SimulatedPort::new().with_latency_polls(2)));
        let eval = engine.evaluate_detailed(&mut net, &[1.0, 1.0]).unwrap();
        assert_eq!(eval.class, 0);
        assert_eq!(eval.output, vec![4.0]);
        assert_eq!(eval.requests, 3);
        assert_eq!(eval.polls, 9);
        assert!(eval.latency_us() >= 0.0);
    }

    #[test]
    fn batch_classifies_in_order() {
        let mut net = Network::new(2, &[2, 2]).unwrap();
        // output 0 = x₀, output 1 = x₁
        net.load(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
        let inputs = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![3.0, 3.0]];
        let classes = engine().evaluate_batch(&mut net, &inputs).unwrap();
        assert_eq!(classes, vec![0, 1, 0]);
    }
}
