//! Resolution errors

use thiserror::Error;
use vx_core::{CoreError, VxError};

use crate::quant::QuantError;
use crate::table::TableError;

const MODULE: &str = "vx-kernel-select::resolver";

/// Errors returned by [`crate::KernelVariantResolver::resolve`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// No table entry for the requested combination.
    #[error("no {family} kernel variant for {detail}")]
    UnsupportedVariant { family: &'static str, detail: String },

    #[error("malformed quantization on {tensor}: {source}")]
    MalformedQuantization {
        tensor: String,
        #[source]
        source: QuantError,
    },

    #[error("invalid shape {shape:?} for {tensor}: {reason}")]
    InvalidShape {
        tensor: String,
        shape: Vec<usize>,
        reason: String,
    },

    #[error(
        "{family} expects {expected_inputs} inputs and {expected_outputs} outputs, got {inputs} and {outputs}"
    )]
    Arity {
        family: &'static str,
        expected_inputs: usize,
        expected_outputs: usize,
        inputs: usize,
        outputs: usize,
    },

    #[error("{family} requires parameter '{name}'")]
    MissingParameter { family: &'static str, name: &'static str },

    #[error("invalid parameter '{name}'={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("variant table: {0}")]
    Table(#[from] TableError),
}

impl ResolveError {
    pub(crate) fn unsupported(family: &'static str, detail: impl Into<String>) -> Self {
        ResolveError::UnsupportedVariant {
            family,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_shape(tensor: &str, shape: &[usize], reason: impl Into<String>) -> Self {
        ResolveError::InvalidShape {
            tensor: tensor.to_string(),
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_param(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ResolveError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// `true` for the "not in the table" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::UnsupportedVariant { .. })
    }
}

impl From<ResolveError> for VxError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnsupportedVariant { family, detail } => {
                VxError::Core(CoreError::NotSupported {
                    feature: format!("{} kernel for {}", family, detail),
                    module: MODULE.to_string(),
                })
            }
            ResolveError::MalformedQuantization { tensor, source } => {
                VxError::Core(CoreError::InvalidParameter {
                    name: format!("{}.quant", tensor),
                    value: String::new(),
                    message: source.to_string(),
                })
            }
            ResolveError::InvalidShape {
                tensor,
                shape,
                reason,
            } => VxError::Core(CoreError::InvalidParameter {
                name: format!("{}.shape", tensor),
                value: format!("{:?}", shape),
                message: reason,
            }),
            err @ ResolveError::Arity { .. } => VxError::Core(CoreError::InvalidParameter {
                name: "tensors".to_string(),
                value: String::new(),
                message: err.to_string(),
            }),
            ResolveError::MissingParameter { family, name } => {
                VxError::Core(CoreError::InvalidParameter {
                    name: name.to_string(),
                    value: String::new(),
                    message: format!("required by {}", family),
                })
            }
            ResolveError::InvalidParameter {
                name,
                value,
                reason,
            } => VxError::Core(CoreError::InvalidParameter {
                name: name.to_string(),
                value,
                message: reason,
            }),
            ResolveError::Table(e) => VxError::Core(CoreError::Internal {
                message: e.to_string(),
                module: MODULE.to_string(),
            }),
        }
    }
}
