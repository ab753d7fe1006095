//! The boundary an alternate (native, accelerated) implementation plugs into.
//!
//! Payloads cross it as flat, element-typed buffers and parameters are
//! addressed by `(layer, unit, element)` instead of by reference. [`Network`]
//! is the in-process implementation.

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    F32,
    F64,
}

impl ElementType {
    pub fn byte_width(self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }
}

/// A flat numeric buffer tagged with its element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedBuffer {
    F64(Vec<f64>),
    F32(Vec<f32>),
}

impl TypedBuffer {
    pub fn element_type(&self) -> ElementType {
        match self {
            TypedBuffer::F64(_) => ElementType::F64,
            TypedBuffer::F32(_) => ElementType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedBuffer::F64(values) => values.len(),
            TypedBuffer::F32(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widens to `f64`; the engine computes in double precision.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            TypedBuffer::F64(values) => values.clone(),
            TypedBuffer::F32(values) => values.iter().map(|&v| f64::from(v)).collect(),
        }
    }

    /// Same element type as `self`, holding `values`.
    pub fn like(&self, values: Vec<f64>) -> TypedBuffer {
        match self {
            TypedBuffer::F64(_) => TypedBuffer::F64(values),
            TypedBuffer::F32(_) => TypedBuffer::F32(values.into_iter().map(|v| v as f32).collect()),
        }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TypedBuffer::F64(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TypedBuffer::F32(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    pub fn from_le_bytes(element_type: ElementType, bytes: &[u8]) -> Result<TypedBuffer> {
        let width = element_type.byte_width();
        if bytes.len() % width != 0 {
            return Err(Error::usage(format!(
                "{} bytes is not a whole number of {:?} elements",
                bytes.len(),
                element_type
            )));
        }

        Ok(match element_type {
            ElementType::F64 => TypedBuffer::F64(
                bytes.chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            ElementType::F32 => TypedBuffer::F32(
                bytes.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        })
    }
}

/// Element 0 of a unit is its bias, element `k + 1` its `k`-th weight in
/// flat (`[channel][ky][kx]` for filters) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterAddress {
    pub layer: usize,
    pub unit: usize,
    pub element: usize,
}

impl ParameterAddress {
    pub fn new(layer: usize, unit: usize, element: usize) -> ParameterAddress {
        ParameterAddress { layer, unit, element }
    }

    pub fn bias(layer: usize, unit: usize) -> ParameterAddress {
        ParameterAddress { layer, unit, element: 0 }
    }
}

/// The per-example contract every implementation honours: `forward`, then
/// `backward`, and once per mini-batch `apply_accumulated_gradients`
/// followed by `reset_accumulated_gradients`.
pub trait ComputeBackend {
    fn forward(&mut self, input: &TypedBuffer) -> Result<TypedBuffer>;

    /// `target` is compared against the last forward output.
    fn backward(&mut self, target: &TypedBuffer) -> Result<()>;

    fn reset_accumulated_gradients(&mut self);

    fn apply_accumulated_gradients(&mut self);

    fn parameter(&self, address: ParameterAddress) -> Result<f64>;

    fn set_parameter(&mut self, address: ParameterAddress, value: f64) -> Result<()>;
}

fn missing(address: ParameterAddress) -> Error {
    Error::usage(format!(
        "no parameter at layer {}, unit {}, element {}",
        address.layer, address.unit, address.element
    ))
}

impl ComputeBackend for Network {
    fn forward(&mut self, input: &TypedBuffer) -> Result<TypedBuffer> {
        let output = Network::forward(self, &input.to_f64())?;
        Ok(input.like(output))
    }

    fn backward(&mut self, target: &TypedBuffer) -> Result<()> {
        Network::backward(self, &target.to_f64())
    }

    fn reset_accumulated_gradients(&mut self) {
        Network::reset_accumulated_gradients(self)
    }

    fn apply_accumulated_gradients(&mut self) {
        Network::apply_accumulated_gradients(self)
    }

    fn parameter(&self, address: ParameterAddress) -> Result<f64> {
        self.layers()
            .get(address.layer)
            .and_then(|layer| layer.parameter(address.unit, address.element))
            .ok_or_else(|| missing(address))
    }

    fn set_parameter(&mut self, address: ParameterAddress, value: f64) -> Result<()> {
        let written = self.layers_mut()
            .get_mut(address.layer)
            .map_or(false, |layer| layer.set_parameter(address.unit, address.element, value));
        if written { Ok(()) } else { Err(missing(address)) }
    }
}
