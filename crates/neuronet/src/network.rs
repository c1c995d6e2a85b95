// SPDX-License-Identifier: AGPL-3.0-only

//! Flattened network storage
//!
//! A network of any depth lives in two owned arenas:
//!
//! ```text
//! neurons: [ input layer | hidden 1 | … | output layer ]      total_neurons f32
//! weights: [ w₁..w_k b | w₁..w_k b | … ]                       total_weights f32
//!            └ neuron n[0] ┘└ neuron n[0]+1 ┘
//! ```
//!
//! Every non-input neuron carries two spans into those arenas: its previous
//! layer's activation block (shared by the whole layer) and its own weight
//! block of `n[layer-1] + 1` values, the last of which is the bias. Spans are
//! offsets, never references, so the arenas can be reallocated freely.

use crate::error::{NeuroNetError, Result};
use crate::shape::Shape;
use std::ops::Range;
use tracing::{debug, info, warn};

/// Contiguous sub-range of an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First element
    pub start: usize,
    /// Number of elements
    pub len: usize,
}

impl Span {
    /// Span of `len` elements starting at `start`
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// One past the last element
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    /// As a slice range
    pub const fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Where one neuron reads its operands from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuronLayout {
    /// Layer this neuron belongs to
    pub layer: usize,
    /// Previous layer's block in the neuron arena (`None` for input neurons)
    pub previous: Option<Span>,
    /// This neuron's `[w₁..w_k, bias]` block in the weight arena (`None` for input neurons)
    pub forward_weights: Option<Span>,
}

/// A fully-connected network with flattened storage
#[derive(Debug)]
pub struct Network {
    shape: Shape,
    /// Start of each layer's block in `neurons`
    layer_starts: Vec<usize>,
    neurons: Vec<f32>,
    layout: Vec<NeuronLayout>,
    weights: Vec<f32>,
    loaded: bool,
}

impl Network {
    /// Build the layout for `layer_count` layers of `neuron_counts` neurons
    ///
    /// # Errors
    ///
    /// Returns a configuration error, without allocating, if the layer count
    /// is outside `[2, MAX_LAYERS]`, disagrees with `neuron_counts`, or a
    /// layer is empty.
    pub fn new(layer_count: usize, neuron_counts: &[usize]) -> Result<Self> {
        Shape::new(layer_count, neuron_counts).map(Self::from_shape)
    }

    /// Build the layout for an already validated shape
    pub fn from_shape(shape: Shape) -> Self {
        let widths = shape.widths();
        let total_neurons = shape.total_neurons();
        let total_weights = shape.total_weights();

        let mut layer_starts = Vec::with_capacity(widths.len());
        let mut start = 0;
        for &width in widths {
            layer_starts.push(start);
            start += width;
        }

        let mut layout = Vec::with_capacity(total_neurons);
        layout.extend((0..widths[0]).map(|_| NeuronLayout {
            layer: 0,
            previous: None,
            forward_weights: None,
        }));

        // Weight blocks advance by fan-in + 1 per neuron, across layer boundaries
        let mut cursor = 0;
        for layer in 1..widths.len() {
            let previous = Span::new(layer_starts[layer - 1], widths[layer - 1]);
            let block = widths[layer - 1] + 1;
            for _ in 0..widths[layer] {
                layout.push(NeuronLayout {
                    layer,
                    previous: Some(previous),
                    forward_weights: Some(Span::new(cursor, block)),
                });
                cursor += block;
            }
            debug!(
                "Layer {layer}: {} neurons, fan-in {}, weights end at {cursor}",
                widths[layer],
                widths[layer - 1]
            );
        }
        debug_assert_eq!(cursor, total_weights);

        info!("Built network {shape}: {total_neurons} neurons, {total_weights} weights");

        Self {
            shape,
            layer_starts,
            neurons: vec![0.0; total_neurons],
            layout,
            weights: vec![0.0; total_weights],
            loaded: false,
        }
    }

    /// Copy the first `total_weights` values of `source` into the weight arena
    ///
    /// Values are grouped per destination neuron in layer order, each group
    /// `[w₁..w_k, bias]`. Loading again swaps the model.
    ///
    /// # Errors
    ///
    /// Returns [`NeuroNetError::WeightLengthMismatch`] if `source` is shorter
    /// than `total_weights`; the current weights are left untouched.
    pub fn load(&mut self, source: &[f32]) -> Result<()> {
        let expected = self.weights.len();
        if source.len() < expected {
            return Err(NeuroNetError::WeightLengthMismatch {
                expected,
                got: source.len(),
            });
        }
        if source.len() > expected {
            warn!(
                "Weight source has {} values, using the first {expected}",
                source.len()
            );
        }

        self.weights.copy_from_slice(&source[..expected]);
        self.loaded = true;
        info!("Loaded {expected} weights into {}", self.shape);
        Ok(())
    }

    /// Free every buffer in one step
    pub fn release(self) {}

    /// Network shape
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of layers
    pub fn total_layers(&self) -> usize {
        self.shape.layer_count()
    }

    /// Size of the neuron arena
    pub fn total_neurons(&self) -> usize {
        self.neurons.len()
    }

    /// Size of the weight arena
    pub fn total_weights(&self) -> usize {
        self.weights.len()
    }

    /// Whether weights have been loaded
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// All activations, layer by layer
    pub fn neurons(&self) -> &[f32] {
        &self.neurons
    }

    /// The weight arena
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Layout record of neuron `index` (global index across layers)
    pub fn layout(&self, index: usize) -> Option<&NeuronLayout> {
        self.layout.get(index)
    }

    /// Block of layer `layer` in the neuron arena
    pub fn layer_span(&self, layer: usize) -> Option<Span> {
        let start = *self.layer_starts.get(layer)?;
        Some(Span::new(start, self.shape.width(layer)))
    }

    /// Activations of layer `layer`
    pub fn layer_values(&self, layer: usize) -> Option<&[f32]> {
        self.layer_span(layer).map(|span| &self.neurons[span.range()])
    }

    /// Weight block `[w₁..w_k, bias]` of neuron `index`; `None` for input neurons
    pub fn weight_block(&self, index: usize) -> Option<&[f32]> {
        let span = self.layout.get(index)?.forward_weights?;
        Some(&self.weights[span.range()])
    }

    /// Bias of neuron `index`; `None` for input neurons
    pub fn bias(&self, index: usize) -> Option<f32> {
        self.weight_block(index)?.last().copied()
    }

    /// View of the output layer's activations (not a copy)
    pub fn output(&self) -> &[f32] {
        let start = self.layer_starts[self.layer_starts.len() - 1];
        &self.neurons[start..]
    }

    /// Overwrite the input layer
    pub(crate) fn set_input(&mut self, input: &[f32]) {
        self.neurons[..input.len()].copy_from_slice(input);
    }

    /// Previous-layer activations, weights without bias, and bias of neuron `index`
    pub(crate) fn operands(&self, index: usize) -> Option<(&[f32], &[f32], f32)> {
        let layout = self.layout.get(index)?;
        let previous = layout.previous?;
        let block = &self.weights[layout.forward_weights?.range()];
        let (bias, weights) = block.split_last()?;
        Some((&self.neurons[previous.range()], weights, *bias))
    }

    /// Store the activation of neuron `index`
    pub(crate) fn set_activation(&mut self, index: usize, value: f32) {
        self.neurons[index] = value;
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        debug!(
            "Releasing network {}: {} neurons, {} weights",
            self.shape,
            self.neurons.len(),
            self.weights.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_for_two_two_one() {
        let net = Network::new(3, &[2, 2, 1]).unwrap();
        assert_eq!(net.total_neurons(), 5);
        assert_eq!(net.total_weights(), 9);

        assert!(net.layout(0).unwrap().previous.is_none());
        assert!(net.layout(1).unwrap().forward_weights.is_none());

        let h0 = net.layout(2).unwrap();
        let h1 = net.layout(3).unwrap();
        let out = net.layout(4).unwrap();
        assert_eq!(h0.previous, Some(Span::new(0, 2)));
        assert_eq!(h1.previous, Some(Span::new(0, 2)));
        assert_eq!(out.previous, Some(Span::new(2, 2)));
        assert_eq!(h0.forward_weights, Some(Span::new(0, 3)));
        assert_eq!(h1.forward_weights, Some(Span::new(3, 3)));
        assert_eq!(out.forward_weights, Some(Span::new(6, 3)));
        assert_eq!(out.layer, 2);
    }

    #[test]
    fn construction_rejects_bad_layer_count() {
        assert!(matches!(
            Network::new(1, &[3]),
            Err(NeuroNetError::Configuration { .. })
        ));
        assert!(matches!(
            Network::new(9, &[1; 9]),
            Err(NeuroNetError::Configuration { .. })
        ));
    }

    #[test]
    fn overflowing_widths_rejected_before_allocating() {
        assert!(matches!(
            Network::new(3, &[usize::MAX, usize::MAX, 1]),
            Err(NeuroNetError::Configuration { .. })
        ));
    }

    #[test]
    fn load_round_trips_through_layout() {
        let mut net = Network::new(3, &[3, 2, 2]).unwrap();
        let source: Vec<f32> = (0..net.total_weights()).map(|i| i as f32 * 0.5).collect();
        net.load(&source).unwrap();
        assert!(net.is_loaded());

        // neuron 3 is the first hidden neuron, neuron 6 the last output neuron
        assert_eq!(net.weight_block(3).unwrap(), &source[0..4]);
        assert_eq!(net.weight_block(4).unwrap(), &source[4..8]);
        assert_eq!(net.weight_block(5).unwrap(), &source[8..11]);
        assert_eq!(net.bias(6), Some(source[13]));
        assert_eq!(net.weight_block(0), None);
    }

    #[test]
    fn short_weight_source_rejected_without_side_effects() {
        let mut net = Network::new(2, &[2, 1]).unwrap();
        let err = net.load(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            NeuroNetError::WeightLengthMismatch { expected: 3, got: 2 }
        ));
        assert!(!net.is_loaded());
        assert!(net.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn long_weight_source_copies_prefix() {
        let mut net = Network::new(2, &[1, 1]).unwrap();
        net.load(&[4.0, 5.0, 6.0, 7.0]).unwrap();
        assert_eq!(net.weights(), &[4.0, 5.0]);
    }

    #[test]
    fn reload_swaps_model() {
        let mut net = Network::new(2, &[1, 1]).unwrap();
        net.load(&[1.0, 1.0]).unwrap();
        net.load(&[2.0, -1.0]).unwrap();
        assert_eq!(net.bias(1), Some(-1.0));
    }

    #[test]
    fn output_is_last_layer_view() {
        let mut net = Network::new(3, &[2, 3, 4]).unwrap();
        net.set_activation(5, 9.0);
        assert_eq!(net.output().len(), 4);
        assert_eq!(net.output()[0], 9.0);
        assert_eq!(net.layer_values(1).unwrap().len(), 3);
        assert_eq!(net.layer_span(2), Some(Span::new(5, 4)));
        assert_eq!(net.layer_span(3), None);
    }

    #[test]
    fn operands_split_bias_from_weights() {
        let mut net = Network::new(2, &[2, 1]).unwrap();
        net.load(&[0.5, 0.25, 3.0]).unwrap();
        net.set_input(&[2.0, 4.0]);
        let (inputs, weights, bias) = net.operands(2).unwrap();
        assert_eq!(inputs, &[2.0, 4.0]);
        assert_eq!(weights, &[0.5, 0.25]);
        assert_eq!(bias, 3.0);
        assert!(net.operands(0).is_none());
    }

    #[test]
    fn release_consumes_network() {
        let net = Network::new(2, &[4, 2]).unwrap();
        net.release();
    }
}
