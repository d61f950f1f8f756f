//! Resolve requests: the bound tensors and attributes of one operator node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vx_core::KernelId;

use crate::dtype::ElementKind;
use crate::families::OperatorFamily;
use crate::quant::QuantParams;

/// Element kind, shape and quantization of one bound tensor.
///
/// Shapes list the fastest-varying dimension first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorDesc {
    pub kind: ElementKind,
    pub shape: Vec<usize>,
    #[serde(default = "QuantParams::none")]
    pub quant: QuantParams,
}

impl TensorDesc {
    pub fn new(kind: ElementKind, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            kind,
            shape: shape.into(),
            quant: QuantParams::none(),
        }
    }

    pub fn with_affine(mut self, scale: f32, zero_point: i32) -> Self {
        self.quant = QuantParams::affine(scale, zero_point);
        self
    }

    pub fn with_dfp(mut self, fractional_length: i8) -> Self {
        self.quant = QuantParams::dynamic_fixed_point(fractional_length);
        self
    }

    pub fn with_quant(mut self, quant: QuantParams) -> Self {
        self.quant = quant;
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Dimension `i`, 1 past the rank.
    pub fn dim(&self, i: usize) -> usize {
        crate::shape::dim(&self.shape, i)
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Operator attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Ints(Vec<i32>),
}

/// Named operator attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpParams(BTreeMap<String, ParamValue>);

impl OpParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Float attribute; integer attributes are widened.
    pub fn float(&self, name: &str) -> Option<f32> {
        match self.0.get(name)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f32),
            ParamValue::Ints(_) => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.0.get(name)? {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(_) | ParamValue::Ints(_) => None,
        }
    }

    /// Integer list attribute; a single integer reads as a one-element list.
    pub fn ints(&self, name: &str) -> Option<Vec<i32>> {
        match self.0.get(name)? {
            ParamValue::Ints(v) => Some(v.clone()),
            ParamValue::Int(v) => Some(vec![*v]),
            ParamValue::Float(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One operator invocation to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub family: OperatorFamily,
    #[serde(default)]
    pub kernel_id: KernelId,
    pub inputs: Vec<TensorDesc>,
    pub outputs: Vec<TensorDesc>,
    /// Small sub-variant discriminators: axes, multiples, methods.
    #[serde(default)]
    pub modes: Vec<i32>,
    #[serde(default)]
    pub params: OpParams,
}

impl ResolveRequest {
    pub fn new(family: OperatorFamily) -> Self {
        Self {
            family,
            kernel_id: KernelId::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            modes: Vec::new(),
            params: OpParams::new(),
        }
    }

    pub fn with_kernel_id(mut self, id: KernelId) -> Self {
        self.kernel_id = id;
        self
    }

    pub fn input(mut self, tensor: TensorDesc) -> Self {
        self.inputs.push(tensor);
        self
    }

    pub fn output(mut self, tensor: TensorDesc) -> Self {
        self.outputs.push(tensor);
        self
    }

    pub fn modes(mut self, modes: impl Into<Vec<i32>>) -> Self {
        self.modes = modes.into();
        self
    }

    pub fn float_param(mut self, name: &str, value: f32) -> Self {
        self.params.set(name, ParamValue::Float(value));
        self
    }

    pub fn int_param(mut self, name: &str, value: i32) -> Self {
        self.params.set(name, ParamValue::Int(value));
        self
    }

    pub fn ints_param(mut self, name: &str, value: impl Into<Vec<i32>>) -> Self {
        self.params.set(name, ParamValue::Ints(value.into()));
        self
    }

    /// All bound tensors with a display label, inputs first.
    pub fn tensors(&self) -> impl Iterator<Item = (String, &TensorDesc)> {
        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("input{}", i), t));
        let outputs = self
            .outputs
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("output{}", i), t));
        inputs.chain(outputs)
    }
}
