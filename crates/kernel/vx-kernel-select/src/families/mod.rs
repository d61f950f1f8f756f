//! Operator families
//!
//! Each family owns a key layout, a static table built from plain rows, and
//! the code that turns a request into key fields, scalars and a work size.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::dispatch::{ResolvedDispatch, ScalarParams, WorkSize};
use crate::error::ResolveError;
use crate::request::{ResolveRequest, TensorDesc};
use crate::table::{TableError, VariantTable};

pub mod col2im;
pub mod crop_and_resize;
pub mod eltwise_unary;
pub mod erf;
pub mod grid_sample;
pub mod group_norm;
pub mod layer_norm;
pub mod moments;
pub mod sequence_mask;
pub mod slice;
pub mod tile;

pub use eltwise_unary::UnaryOp;

/// Module compiled ahead of most OpenCL kernels.
pub(crate) const ELTWISE_HELPER: &[&str] = &["eltwise_ops_helper"];

// ============================================================================
// Family identity
// ============================================================================

/// Operator family of a request; selects the table to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorFamily {
    Erf,
    Tile,
    Moments,
    Slice,
    LayerNorm,
    GroupNorm,
    EltwiseUnary(UnaryOp),
    CropAndResize,
    BilinearGridSample,
    SequenceMask,
    Col2Im,
}

impl OperatorFamily {
    /// Family names accepted in configuration.
    pub const NAMES: [&'static str; 11] = [
        "erf",
        "tile",
        "moments",
        "slice",
        "layer_norm",
        "group_norm",
        "eltwise_unary",
        "crop_and_resize",
        "bilinear_grid_sample",
        "sequence_mask",
        "col2im",
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            OperatorFamily::Erf => "erf",
            OperatorFamily::Tile => "tile",
            OperatorFamily::Moments => "moments",
            OperatorFamily::Slice => "slice",
            OperatorFamily::LayerNorm => "layer_norm",
            OperatorFamily::GroupNorm => "group_norm",
            OperatorFamily::EltwiseUnary(_) => "eltwise_unary",
            OperatorFamily::CropAndResize => "crop_and_resize",
            OperatorFamily::BilinearGridSample => "bilinear_grid_sample",
            OperatorFamily::SequenceMask => "sequence_mask",
            OperatorFamily::Col2Im => "col2im",
        }
    }
}

impl fmt::Display for OperatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorFamily::EltwiseUnary(op) => write!(f, "eltwise_unary({})", op.name()),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for OperatorFamily {
    type Err = String;

    /// Family names parse directly; unary op names such as `sin` parse to
    /// [`OperatorFamily::EltwiseUnary`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let family = match s {
            "erf" => OperatorFamily::Erf,
            "tile" => OperatorFamily::Tile,
            "moments" => OperatorFamily::Moments,
            "slice" => OperatorFamily::Slice,
            "layer_norm" => OperatorFamily::LayerNorm,
            "group_norm" => OperatorFamily::GroupNorm,
            "crop_and_resize" => OperatorFamily::CropAndResize,
            "bilinear_grid_sample" => OperatorFamily::BilinearGridSample,
            "sequence_mask" => OperatorFamily::SequenceMask,
            "col2im" => OperatorFamily::Col2Im,
            other => OperatorFamily::EltwiseUnary(
                other
                    .parse()
                    .map_err(|_| format!("unknown operator family '{}'", other))?,
            ),
        };
        Ok(family)
    }
}

// ============================================================================
// Family plumbing
// ============================================================================

/// Key fields plus whatever the family computed while producing them.
pub(crate) struct Planned<P> {
    /// One value per field of the family's key layout.
    pub fields: Vec<u64>,
    pub plan: P,
}

/// Launch data produced after a successful lookup.
pub(crate) struct Launch {
    pub scalars: ScalarParams,
    pub work_size: WorkSize,
    pub prerequisites: Vec<ResolvedDispatch>,
}

impl Launch {
    pub fn new(scalars: ScalarParams, work_size: WorkSize) -> Self {
        Self {
            scalars,
            work_size,
            prerequisites: Vec::new(),
        }
    }
}

pub(crate) trait KernelFamily {
    type Plan;

    const NAME: &'static str;
    const INPUTS: usize;
    const OUTPUTS: usize;

    fn table(&self) -> Result<&'static VariantTable, ResolveError>;

    /// Normalize kinds and shapes and produce the key fields.
    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<Self::Plan>, ResolveError>;

    /// Derive scalars and work size for a matched entry.
    fn launch(
        &self,
        req: &ResolveRequest,
        plan: Self::Plan,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError>;
}

/// Static table slot, built on first use.
pub(crate) type TableCell = OnceLock<Result<VariantTable, TableError>>;

pub(crate) fn cached_table(
    cell: &'static TableCell,
    build: fn() -> Result<VariantTable, TableError>,
) -> Result<&'static VariantTable, ResolveError> {
    cell.get_or_init(build)
        .as_ref()
        .map_err(|e| ResolveError::Table(e.clone()))
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn flag(value: bool) -> u64 {
    u64::from(value)
}

pub(crate) fn kind_field(kind: crate::dtype::ElementKind) -> u64 {
    u64::from(kind.code())
}

pub(crate) fn require_float(
    req: &ResolveRequest,
    family: &'static str,
    name: &'static str,
) -> Result<f32, ResolveError> {
    req.params
        .float(name)
        .ok_or(ResolveError::MissingParameter { family, name })
}

pub(crate) fn require_int(
    req: &ResolveRequest,
    family: &'static str,
    name: &'static str,
) -> Result<i32, ResolveError> {
    req.params
        .int(name)
        .ok_or(ResolveError::MissingParameter { family, name })
}

/// Dimension as a kernel `I32` scalar.
pub(crate) fn dim_i32(name: &'static str, value: usize) -> Result<i32, ResolveError> {
    i32::try_from(value)
        .map_err(|_| ResolveError::invalid_param(name, value, "does not fit a 32-bit scalar"))
}

/// `inputScale, inputTail, outputScale, outputZP`.
pub(crate) fn push_affine_io(
    scalars: &mut ScalarParams,
    input: &TensorDesc,
    output: &TensorDesc,
    config: &ResolverConfig,
) {
    scalars
        .push_f32("inputScale", input.quant.scale())
        .push_f32("inputTail", input.quant.tail())
        .push_f32("outputScale", output.quant.inverse_scale(config.output_scale_epsilon))
        .push_f32("outputZP", output.quant.zero_point() as f32);
}

/// Element-wise launch: `[align(w, 4), h, c or 1]`, 2-D when the shape is.
pub(crate) fn elementwise_work_size(shape: &[usize]) -> WorkSize {
    let dim = if crate::shape::is_image_2d(shape) { 2 } else { 3 };
    WorkSize::new(dim).with_global_size([
        WorkSize::aligned_extent(crate::shape::dim(shape, 0), 1, 4),
        crate::shape::dim(shape, 1),
        crate::shape::dim(shape, 2),
    ])
}
