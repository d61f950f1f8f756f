//! Slice: copy a window whose start comes from a second, index tensor.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::{ElementKind, widen_f16};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim, is_image_2d};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, flag, kind_field,
    push_affine_io,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in1", 18, 8),
    KeyField::new("in0", 10, 8),
    KeyField::new("out", 2, 8),
    KeyField::new("image_2d", 0, 2),
];

/// `(data, start, output)` kinds.
const VARIANTS: &[(ElementKind, ElementKind, ElementKind)] = &[
    (ElementKind::F32, ElementKind::I32, ElementKind::F32),
    (ElementKind::I32, ElementKind::I32, ElementKind::I32),
    (ElementKind::U8, ElementKind::I32, ElementKind::U8),
];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(Slice::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for &(in0, in1, out) in VARIANTS {
        for image_2d in [false, true] {
            let suffix = if image_2d { "_2D" } else { "" };
            table.row(
                &[kind_field(in1), kind_field(in0), kind_field(out), flag(image_2d)],
                format!("cl.slice_{}_{}to{}{}", in0, in1, out, suffix),
                "slice",
            )?;
        }
    }
    table.build()
}

/// Rank-1 shapes launch as `[n, 1]`.
fn pad_rank(shape: &[usize]) -> Vec<usize> {
    match shape {
        [n] => vec![*n, 1],
        other => other.to_vec(),
    }
}

pub(crate) struct Slice;

impl KernelFamily for Slice {
    /// Padded output shape.
    type Plan = Vec<usize>;

    const NAME: &'static str = "slice";
    const INPUTS: usize = 2;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<Vec<usize>>, ResolveError> {
        let input = pad_rank(&req.inputs[0].shape);
        let output = pad_rank(&req.outputs[0].shape);

        check_shape("input0", &input, config.max_tensor_width)?;
        if dim(&input, 3) != dim(&output, 3) {
            return Err(ResolveError::invalid_shape(
                "output0",
                &req.outputs[0].shape,
                format!("batch must match input batch {}", dim(&input, 3)),
            ));
        }

        Ok(Planned {
            fields: vec![
                kind_field(widen_f16(req.inputs[1].kind)),
                kind_field(widen_f16(req.inputs[0].kind)),
                kind_field(widen_f16(req.outputs[0].kind)),
                flag(is_image_2d(&input)),
            ],
            plan: output,
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        output: Vec<usize>,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let mut scalars = ScalarParams::new();
        push_affine_io(&mut scalars, &req.inputs[0], &req.outputs[0], config);

        let work_dim = if is_image_2d(&output) { 2 } else { 3 };
        let work_size = WorkSize::new(work_dim).with_global_size([
            WorkSize::aligned_extent(dim(&output, 0), 1, 4),
            dim(&output, 1),
            dim(&output, 2),
        ]);
        Ok(Launch::new(scalars, work_size))
    }
}
