// SPDX-License-Identifier: AGPL-3.0-only

//! Network descriptor: layer widths and derived totals

use crate::error::{NeuroNetError, Result};
use crate::network::NeuronLayout;

/// Maximum number of layers (input and output included).
pub const MAX_LAYERS: usize = 8;

/// Most weights a single allocation can hold.
#[allow(clippy::cast_sign_loss)]
const MAX_WEIGHTS: usize = isize::MAX as usize / std::mem::size_of::<f32>();

/// Most neurons; each one also carries a layout record.
#[allow(clippy::cast_sign_loss)]
const MAX_NEURONS: usize = isize::MAX as usize / std::mem::size_of::<NeuronLayout>();

/// Static shape of a fully-connected network
///
/// `widths[0]` is the input layer, the last entry the output layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    widths: Vec<usize>,
    total_neurons: usize,
    total_weights: usize,
}

impl Shape {
    /// Validate a layer count and its per-layer neuron counts
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - `layer_count` is outside `[2, MAX_LAYERS]`
    /// - `neuron_counts` does not have exactly `layer_count` entries
    /// - any layer has zero neurons
    /// - either arena would not fit in one allocation
    pub fn new(layer_count: usize, neuron_counts: &[usize]) -> Result<Self> {
        if !(2..=MAX_LAYERS).contains(&layer_count) {
            return Err(NeuroNetError::configuration(format!(
                "layer count {layer_count} is less than 2 or larger than {MAX_LAYERS}"
            )));
        }
        if neuron_counts.len() != layer_count {
            return Err(NeuroNetError::configuration(format!(
                "layer count {layer_count} but {} neuron counts given",
                neuron_counts.len()
            )));
        }
        if let Some(layer) = neuron_counts.iter().position(|&n| n == 0) {
            return Err(NeuroNetError::configuration(format!(
                "layer {layer} has no neurons"
            )));
        }

        let (total_neurons, total_weights) = arena_sizes(neuron_counts)
            .filter(|&(n, w)| n <= MAX_NEURONS && w <= MAX_WEIGHTS)
            .ok_or_else(|| {
                NeuroNetError::configuration(format!(
                    "layer widths {neuron_counts:?} exceed the addressable arena size"
                ))
            })?;

        Ok(Self {
            widths: neuron_counts.to_vec(),
            total_neurons,
            total_weights,
        })
    }

    /// Number of layers
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.widths.len()
    }

    /// Neurons per layer
    #[must_use]
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Neurons in layer `layer`
    #[must_use]
    pub fn width(&self, layer: usize) -> usize {
        self.widths[layer]
    }

    /// Input layer width
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.widths[0]
    }

    /// Output layer width
    #[must_use]
    pub fn output_width(&self) -> usize {
        self.widths[self.widths.len() - 1]
    }

    /// `Σ n[i]`
    #[must_use]
    pub const fn total_neurons(&self) -> usize {
        self.total_neurons
    }

    /// `Σ (n[i-1] + 1) · n[i]`, one bias per non-input neuron
    #[must_use]
    pub const fn total_weights(&self) -> usize {
        self.total_weights
    }

    /// Widest previous layer, i.e. the longest accelerator request a pass issues
    #[must_use]
    pub fn max_fan_in(&self) -> usize {
        self.widths[..self.widths.len() - 1]
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

/// `(Σ n[i], Σ (n[i-1] + 1) · n[i])`, or `None` on overflow
fn arena_sizes(widths: &[usize]) -> Option<(usize, usize)> {
    let neurons = widths
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(n))?;
    let weights = widths.windows(2).try_fold(0usize, |acc, pair| {
        pair[0]
            .checked_add(1)?
            .checked_mul(pair[1])
            .and_then(|block| acc.checked_add(block))
    })?;
    Some((neurons, weights))
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, width) in self.widths.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{width}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_for_mnist_mlp() {
        let shape = Shape::new(3, &[784, 32, 10]).unwrap();
        assert_eq!(shape.total_neurons(), 826);
        assert_eq!(shape.total_weights(), 785 * 32 + 33 * 10);
        assert_eq!(shape.max_fan_in(), 784);
    }

    #[test]
    fn layer_count_bounds() {
        assert!(Shape::new(1, &[4]).is_err());
        assert!(Shape::new(MAX_LAYERS + 1, &[1; MAX_LAYERS + 1]).is_err());
        assert!(Shape::new(2, &[1, 1]).is_ok());
        assert!(Shape::new(MAX_LAYERS, &[1; MAX_LAYERS]).is_ok());
    }

    #[test]
    fn count_must_match_sequence() {
        assert!(matches!(
            Shape::new(3, &[2, 2]),
            Err(NeuroNetError::Configuration { .. })
        ));
    }

    #[test]
    fn empty_layer_rejected() {
        assert!(matches!(
            Shape::new(3, &[2, 0, 1]),
            Err(NeuroNetError::Configuration { .. })
        ));
    }

    #[test]
    fn oversized_widths_rejected_without_panicking() {
        assert!(matches!(
            Shape::new(3, &[usize::MAX, usize::MAX, 1]),
            Err(NeuroNetError::Configuration { .. })
        ));
        assert!(matches!(
            Shape::new(2, &[0x7FFF_FFFF, 0x8000_0000]),
            Err(NeuroNetError::Configuration { .. })
        ));
        assert!(matches!(
            Shape::new(2, &[1, MAX_WEIGHTS]),
            Err(NeuroNetError::Configuration { .. })
        ));
    }

    #[test]
    fn test_shape_display() {
        let shape = Shape::new(3, &[2, 2, 1]).unwrap();
        assert_eq!(format!("{shape}"), "[2, 2, 1]");
    }
}
