//! Per-tensor quantization metadata and the affine coefficients derived from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dtype::ElementKind;

/// Quantization scheme declared on a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuantKind {
    #[default]
    None,
    DynamicFixedPoint,
    AffineAsymmetric,
}

impl QuantKind {
    pub const fn code(self) -> u8 {
        match self {
            QuantKind::None => 0,
            QuantKind::DynamicFixedPoint => 1,
            QuantKind::AffineAsymmetric => 2,
        }
    }

    /// Decode a scheme code as stored in tensor attributes.
    ///
    /// Codes 3..=5 are the per-channel and symmetric schemes, which have no
    /// scalar representation here.
    pub fn from_code(code: u8) -> Result<Self, QuantError> {
        match code {
            0 => Ok(QuantKind::None),
            1 => Ok(QuantKind::DynamicFixedPoint),
            2 => Ok(QuantKind::AffineAsymmetric),
            3 => Err(QuantError::UnsupportedScheme("affine per-channel")),
            4 => Err(QuantError::UnsupportedScheme("symmetric")),
            5 => Err(QuantError::UnsupportedScheme("symmetric per-channel")),
            other => Err(QuantError::UnknownScheme(other)),
        }
    }
}

/// Why a tensor's quantization metadata was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantError {
    #[error("unknown quantization scheme code {0}")]
    UnknownScheme(u8),
    #[error("{0} quantization is not supported")]
    UnsupportedScheme(&'static str),
    #[error("affine scale {0} must be finite and positive")]
    InvalidScale(f32),
    #[error("dynamic fixed point declared on floating kind {0}")]
    FixedPointOnFloat(ElementKind),
    #[error("fractional length {fl} out of range for {kind}")]
    FractionalLengthOutOfRange { fl: i8, kind: ElementKind },
}

/// Quantization parameters of one tensor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuantParams {
    pub kind: QuantKind,
    pub scale: f32,
    pub zero_point: i32,
    pub fractional_length: i8,
}

impl QuantParams {
    pub const fn none() -> Self {
        Self {
            kind: QuantKind::None,
            scale: 1.0,
            zero_point: 0,
            fractional_length: 0,
        }
    }

    pub const fn affine(scale: f32, zero_point: i32) -> Self {
        Self {
            kind: QuantKind::AffineAsymmetric,
            scale,
            zero_point,
            fractional_length: 0,
        }
    }

    pub const fn dynamic_fixed_point(fractional_length: i8) -> Self {
        Self {
            kind: QuantKind::DynamicFixedPoint,
            scale: 1.0,
            zero_point: 0,
            fractional_length,
        }
    }

    /// Real value of one quantization step.
    ///
    /// Dynamic fixed point: `1 / 2^fl` for `fl > 0`, `2^(-fl)` otherwise.
    pub fn scale(&self) -> f32 {
        match self.kind {
            QuantKind::None => 1.0,
            QuantKind::DynamicFixedPoint => {
                let fl = i32::from(self.fractional_length);
                if fl > 0 {
                    1.0 / 2f32.powi(fl)
                } else {
                    2f32.powi(-fl)
                }
            }
            QuantKind::AffineAsymmetric => self.scale,
        }
    }

    pub fn zero_point(&self) -> i32 {
        match self.kind {
            QuantKind::AffineAsymmetric => self.zero_point,
            QuantKind::None | QuantKind::DynamicFixedPoint => 0,
        }
    }

    /// Dequantization tail: `real = q * scale + tail`.
    pub fn tail(&self) -> f32 {
        -(self.zero_point() as f32) * self.scale()
    }

    /// `1 / scale`, or `0.0` when the scale is below `epsilon`.
    pub fn inverse_scale(&self, epsilon: f32) -> f32 {
        let scale = self.scale();
        if scale.abs() < epsilon { 0.0 } else { 1.0 / scale }
    }

    /// Check the metadata against the element kind it is attached to.
    pub fn validate(&self, kind: ElementKind) -> Result<(), QuantError> {
        match self.kind {
            QuantKind::None => Ok(()),
            QuantKind::AffineAsymmetric => {
                if self.scale.is_finite() && self.scale > 0.0 {
                    Ok(())
                } else {
                    Err(QuantError::InvalidScale(self.scale))
                }
            }
            QuantKind::DynamicFixedPoint => {
                if kind.is_float() {
                    return Err(QuantError::FixedPointOnFloat(kind));
                }
                if i64::from(self.fractional_length).unsigned_abs() > u64::from(kind.bit_width()) {
                    return Err(QuantError::FractionalLengthOutOfRange {
                        fl: self.fractional_length,
                        kind,
                    });
                }
                Ok(())
            }
        }
    }
}
