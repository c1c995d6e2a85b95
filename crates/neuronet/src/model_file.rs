// SPDX-License-Identifier: AGPL-3.0-only

//! Model, input and label files
//!
//! # Model file
//!
//! All fields little-endian:
//!
//! ```text
//! u32        layer_count
//! u32 × L    neurons per layer, input first
//! f32 × W    weights, one [w₁..w_k, bias] group per non-input neuron in layer order
//! ```
//!
//! `W` must equal the shape's total weight count exactly.
//!
//! # Input file
//!
//! Concatenated f32 vectors of the input layer width, no header.
//!
//! # Label file
//!
//! One `u8` class per input vector.

use crate::error::{NeuroNetError, Result};
use crate::network::Network;
use crate::shape::{Shape, MAX_LAYERS};
use bytes::{Buf, BufMut, BytesMut};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const WORD: usize = 4;

/// A parsed model: shape plus flat weights
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFile {
    shape: Shape,
    weights: Vec<f32>,
}

impl ModelFile {
    /// Pair a shape with its weights
    ///
    /// # Errors
    ///
    /// Returns [`NeuroNetError::WeightLengthMismatch`] unless `weights` has
    /// exactly `shape.total_weights()` values.
    pub fn new(shape: Shape, weights: Vec<f32>) -> Result<Self> {
        let expected = shape.total_weights();
        if weights.len() != expected {
            return Err(NeuroNetError::WeightLengthMismatch {
                expected,
                got: weights.len(),
            });
        }
        Ok(Self { shape, weights })
    }

    /// Load model from file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        info!("Loading model from: {}", path.display());

        if !path.exists() {
            return Err(NeuroNetError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parse model from bytes
    ///
    /// # Errors
    ///
    /// Returns a parse error on truncation or trailing bytes, and a
    /// configuration error if the header describes an invalid shape.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut buf = data;

        if buf.remaining() < WORD {
            return Err(NeuroNetError::parse_error("model", "missing layer count"));
        }
        let layer_count = buf.get_u32_le() as usize;
        if !(2..=MAX_LAYERS).contains(&layer_count) {
            return Err(NeuroNetError::configuration(format!(
                "layer count {layer_count} is less than 2 or larger than {MAX_LAYERS}"
            )));
        }

        if buf.remaining() < layer_count * WORD {
            return Err(NeuroNetError::parse_error(
                "model",
                format!("header truncated: {layer_count} layer widths expected"),
            ));
        }
        let widths: Vec<usize> = (0..layer_count)
            .map(|_| buf.get_u32_le() as usize)
            .collect();
        let shape = Shape::new(layer_count, &widths)?;
        debug!("Model header: {shape}");

        let expected = shape.total_weights();
        if expected.checked_mul(WORD) != Some(buf.remaining()) {
            return Err(NeuroNetError::parse_error(
                "model",
                format!(
                    "{shape} needs {expected} weights, found {} bytes",
                    buf.remaining()
                ),
            ));
        }
        let weights = (0..expected).map(|_| buf.get_f32_le()).collect();

        info!("Parsed model {shape}: {expected} weights");
        Ok(Self { shape, weights })
    }

    /// Serialize to the model file format
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_model(&self.shape, &self.weights)
    }

    /// Network shape
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Flat weights
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Build a network and load these weights into it
    ///
    /// # Errors
    ///
    /// Propagates [`Network::load`] errors.
    pub fn into_network(self) -> Result<Network> {
        let mut network = Network::from_shape(self.shape);
        network.load(&self.weights)?;
        Ok(network)
    }
}

/// Encode a shape and weights in the model file format
///
/// Writes whatever `weights` holds; [`ModelFile::from_bytes`] only accepts
/// the result when the count matches the shape.
pub fn encode_model(shape: &Shape, weights: &[f32]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(WORD * (1 + shape.layer_count() + weights.len()));
    put_len(&mut buf, shape.layer_count());
    for &width in shape.widths() {
        put_len(&mut buf, width);
    }
    for &w in weights {
        buf.put_f32_le(w);
    }
    buf.to_vec()
}

#[allow(clippy::cast_possible_truncation)]
fn put_len(buf: &mut BytesMut, value: usize) {
    buf.put_u32_le(value as u32);
}

/// Split raw bytes into input vectors of `width` values
///
/// # Errors
///
/// Returns a parse error if `width` is zero or the data does not hold a
/// whole number of vectors.
pub fn parse_inputs(data: &[u8], width: usize) -> Result<Vec<Vec<f32>>> {
    let vector_bytes = width
        .checked_mul(WORD)
        .filter(|&bytes| bytes > 0)
        .ok_or_else(|| NeuroNetError::parse_error("inputs", format!("bad input width {width}")))?;
    if data.len() % vector_bytes != 0 {
        return Err(NeuroNetError::parse_error(
            "inputs",
            format!(
                "{} bytes is not a multiple of the {vector_bytes}-byte input vector",
                data.len()
            ),
        ));
    }

    let mut buf = data;
    let mut inputs = Vec::with_capacity(data.len() / vector_bytes);
    while buf.has_remaining() {
        inputs.push((0..width).map(|_| buf.get_f32_le()).collect());
    }
    Ok(inputs)
}

/// Read an input file of `width`-wide vectors
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or malformed.
pub fn read_inputs<P: AsRef<Path>>(path: P, width: usize) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(NeuroNetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let inputs = parse_inputs(&fs::read(path)?, width)?;
    info!("Read {} input vectors from {}", inputs.len(), path.display());
    Ok(inputs)
}

/// Read a label file (one byte per class)
///
/// # Errors
///
/// Returns error if the file is missing or unreadable.
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(NeuroNetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read(path)?.into_iter().map(usize::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_two_one() -> ModelFile {
        let shape = Shape::new(3, &[2, 2, 1]).unwrap();
        ModelFile::new(shape, vec![1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0]).unwrap()
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = two_two_one().to_bytes();
        assert_eq!(&bytes[..4], &[3, 0, 0, 0]);
        assert_eq!(&bytes[4..16], &[2, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(bytes.len(), 16 + 9 * 4);
    }

    #[test]
    fn parses_encoded_model() {
        let model = two_two_one();
        let parsed = ModelFile::from_bytes(&model.to_bytes()).unwrap();
        assert_eq!(parsed, model);
    }

    #[test]
    fn into_network_loads_weights() {
        let net = two_two_one().into_network().unwrap();
        assert!(net.is_loaded());
        assert_eq!(net.bias(4), Some(0.0));
        assert_eq!(net.total_weights(), 9);
    }

    #[test]
    fn rejects_truncated_weights() {
        let mut bytes = two_two_one().to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            ModelFile::from_bytes(&bytes),
            Err(NeuroNetError::ParseError { what: "model", .. })
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = two_two_one().to_bytes();
        bytes.extend_from_slice(&[0; 4]);
        assert!(ModelFile::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_layer_count_before_reading_widths() {
        let bytes = 1000u32.to_le_bytes();
        assert!(matches!(
            ModelFile::from_bytes(&bytes),
            Err(NeuroNetError::Configuration { .. })
        ));
        assert!(ModelFile::from_bytes(&[1, 0]).is_err());
    }

    #[test]
    fn oversized_header_is_an_error_not_a_panic() {
        let header: Vec<u8> = [2u32, 0x7FFF_FFFF, 0x8000_0000]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert!(ModelFile::from_bytes(&header).is_err());

        // valid shape, but far more weights than the file holds
        let header: Vec<u8> = [2u32, 0x0010_0000, 0x0010_0000]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert!(matches!(
            ModelFile::from_bytes(&header),
            Err(NeuroNetError::ParseError { what: "model", .. })
        ));
    }

    #[test]
    fn rejects_empty_layer() {
        let shape_bytes: Vec<u8> = [2u32, 3, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert!(matches!(
            ModelFile::from_bytes(&shape_bytes),
            Err(NeuroNetError::Configuration { .. })
        ));
    }

    #[test]
    fn new_requires_exact_weight_count() {
        let shape = Shape::new(2, &[1, 1]).unwrap();
        assert!(matches!(
            ModelFile::new(shape, vec![0.0; 3]),
            Err(NeuroNetError::WeightLengthMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn inputs_split_into_vectors() {
        let data: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let inputs = parse_inputs(&data, 2).unwrap();
        assert_eq!(inputs, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!(parse_inputs(&data, 3).is_err());
        assert!(parse_inputs(&data, 0).is_err());
        assert!(parse_inputs(&[], 2).unwrap().is_empty());
    }

    #[test]
    fn missing_file_reported() {
        assert!(matches!(
            ModelFile::from_file("/nonexistent/model.bin"),
            Err(NeuroNetError::FileNotFound { .. })
        ));
        assert!(matches!(
            read_labels("/nonexistent/labels.bin"),
            Err(NeuroNetError::FileNotFound { .. })
        ));
    }
}
