//! Element-wise unary activations sharing one kernel table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::dispatch::ScalarParams;
use crate::dtype::ElementKind;
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, is_image_2d, optimize_element_shape};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    KernelFamily, Launch, Planned, TableCell, cached_table, elementwise_work_size, flag,
    kind_field, push_affine_io,
};

/// Unary operation; the discriminant is packed into the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum UnaryOp {
    Sin = 0,
    Cos = 1,
    Exp = 2,
    Log = 3,
    Neg = 4,
    HardSigmoid = 5,
    Mish = 6,
    Round = 7,
    Gelu = 8,
    HardGelu = 9,
    Selu = 10,
    Celu = 11,
    Rcp = 12,
    Sign = 13,
    Softsign = 14,
    Atan = 15,
    Atanh = 16,
    Acosh = 17,
    InverseSigmoid = 18,
    Tan = 19,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 20] = [
        UnaryOp::Sin,
        UnaryOp::Cos,
        UnaryOp::Exp,
        UnaryOp::Log,
        UnaryOp::Neg,
        UnaryOp::HardSigmoid,
        UnaryOp::Mish,
        UnaryOp::Round,
        UnaryOp::Gelu,
        UnaryOp::HardGelu,
        UnaryOp::Selu,
        UnaryOp::Celu,
        UnaryOp::Rcp,
        UnaryOp::Sign,
        UnaryOp::Softsign,
        UnaryOp::Atan,
        UnaryOp::Atanh,
        UnaryOp::Acosh,
        UnaryOp::InverseSigmoid,
        UnaryOp::Tan,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Name used in kernel names and configuration.
    pub const fn name(self) -> &'static str {
        match self {
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Neg => "neg",
            UnaryOp::HardSigmoid => "hard_sigmoid",
            UnaryOp::Mish => "mish",
            UnaryOp::Round => "round",
            UnaryOp::Gelu => "gelu",
            UnaryOp::HardGelu => "hard_gelu",
            UnaryOp::Selu => "selu",
            UnaryOp::Celu => "celu",
            UnaryOp::Rcp => "rcp",
            UnaryOp::Sign => "sign",
            UnaryOp::Softsign => "softsign",
            UnaryOp::Atan => "atan",
            UnaryOp::Atanh => "atanh",
            UnaryOp::Acosh => "acosh",
            UnaryOp::InverseSigmoid => "inverse_sigmoid",
            UnaryOp::Tan => "tan",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnaryOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnaryOp::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| format!("unknown unary op '{}'", s))
    }
}

const LAYOUT: &[KeyField] = &[
    KeyField::new("op", 20, 8),
    KeyField::new("in", 12, 8),
    KeyField::new("out", 4, 8),
    KeyField::new("image_2d", 0, 4),
];

const KINDS: &[(ElementKind, ElementKind)] = &[
    (ElementKind::F32, ElementKind::F32),
    (ElementKind::U8, ElementKind::U8),
    (ElementKind::U8, ElementKind::F32),
];

static TABLE: TableCell = TableCell::new();

fn push_rows(
    table: &mut TableBuilder,
    op: UnaryOp,
    input: ElementKind,
    output: ElementKind,
) -> Result<(), TableError> {
    let fields = |image_2d| {
        [
            u64::from(op.code()),
            kind_field(input),
            kind_field(output),
            flag(image_2d),
        ]
    };
    table.row(
        &fields(false),
        format!("cl.{}_{}to{}", op, input, output),
        "eltwise_unary_1",
    )?;
    table.row(
        &fields(true),
        format!("cl.{}_{}to{}_2D", op, input, output),
        "eltwise_unary_0",
    )
}

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(EltwiseUnary::NAME, LAYOUT)?;
    for op in UnaryOp::ALL {
        for &(input, output) in KINDS {
            push_rows(&mut table, op, input, output)?;
        }
    }
    push_rows(&mut table, UnaryOp::Neg, ElementKind::I32, ElementKind::I32)?;
    table.build()
}

/// Half precision runs on the F32 kernels.
fn normalize(input: ElementKind, output: ElementKind) -> (ElementKind, ElementKind) {
    match (input, output) {
        (ElementKind::F16, ElementKind::F16) => (ElementKind::F32, ElementKind::F32),
        (ElementKind::U8, ElementKind::F16) => (ElementKind::U8, ElementKind::F32),
        other => other,
    }
}

pub(crate) struct EltwiseUnary(pub UnaryOp);

impl EltwiseUnary {
    /// `alpha` and `beta` as the kernels expect them.
    fn coefficients(&self, req: &ResolveRequest) -> Result<(f32, f32), ResolveError> {
        let alpha = req.params.float("alpha").unwrap_or(1.0);
        let beta = req.params.float("beta").unwrap_or(0.0);
        match self.0 {
            UnaryOp::Selu => Ok((alpha * beta, beta)),
            UnaryOp::Celu if alpha == 0.0 => Err(ResolveError::invalid_param(
                "alpha",
                alpha,
                "celu needs a non-zero alpha",
            )),
            UnaryOp::Celu => Ok((alpha, 1.0 / alpha)),
            _ => Ok((alpha, beta)),
        }
    }
}

impl KernelFamily for EltwiseUnary {
    /// Collapsed launch shape.
    type Plan = Vec<usize>;

    const NAME: &'static str = "eltwise_unary";
    const INPUTS: usize = 1;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<Vec<usize>>, ResolveError> {
        let shape = optimize_element_shape(&req.inputs[0].shape, config.max_tensor_width);
        check_shape("input0", &shape, config.max_tensor_width)?;

        let (input, output) = normalize(req.inputs[0].kind, req.outputs[0].kind);
        Ok(Planned {
            fields: vec![
                u64::from(self.0.code()),
                kind_field(input),
                kind_field(output),
                flag(is_image_2d(&shape)),
            ],
            plan: shape,
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        shape: Vec<usize>,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let (alpha, beta) = self.coefficients(req)?;

        let mut scalars = ScalarParams::new();
        push_affine_io(&mut scalars, &req.inputs[0], &req.outputs[0], config);
        scalars.push_f32("alpha", alpha).push_f32("beta", beta);
        Ok(Launch::new(scalars, elementwise_work_size(&shape)))
    }
}
