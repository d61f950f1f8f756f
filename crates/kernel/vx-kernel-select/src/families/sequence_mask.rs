//! Sequence mask: expand lengths into `[max_len, ...]` boolean masks.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::ElementKind;
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim, is_image_2d, optimize_element_shape};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, flag, kind_field,
    require_int,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 24, 8),
    KeyField::new("out", 8, 16),
    KeyField::new("image_2d", 0, 8),
];

const OUTPUT_KINDS: &[ElementKind] = &[ElementKind::U8, ElementKind::I32, ElementKind::F32];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(SequenceMask::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for image_2d in [false, true] {
        let suffix = if image_2d { "_2D" } else { "" };
        for &output in OUTPUT_KINDS {
            table.row(
                &[kind_field(ElementKind::I32), kind_field(output), flag(image_2d)],
                format!("cl.sequence_mask_I32to{}{}", output, suffix),
                "sequence_mask",
            )?;
        }
    }
    table.build()
}

pub(crate) struct SequenceMask;

pub(crate) struct SequenceMaskPlan {
    max_len: i32,
    /// `[max_len, lengths...]`.
    shape: Vec<usize>,
}

impl KernelFamily for SequenceMask {
    type Plan = SequenceMaskPlan;

    const NAME: &'static str = "sequence_mask";
    const INPUTS: usize = 1;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<SequenceMaskPlan>, ResolveError> {
        let max_len = require_int(req, Self::NAME, "max_len")?;
        let len = usize::try_from(max_len)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| ResolveError::invalid_param("max_len", max_len, "must be positive"))?;
        check_shape("output0", &req.outputs[0].shape, config.max_tensor_width)?;

        let lengths = optimize_element_shape(&req.inputs[0].shape, config.max_tensor_width);
        check_shape("input0", &lengths, config.max_tensor_width)?;
        let mut shape = Vec::with_capacity(3);
        shape.push(len);
        shape.extend_from_slice(&lengths);

        let output = match req.outputs[0].kind {
            ElementKind::Bool8 => ElementKind::U8,
            other => other,
        };
        Ok(Planned {
            fields: vec![
                kind_field(req.inputs[0].kind),
                kind_field(output),
                flag(is_image_2d(&shape)),
            ],
            plan: SequenceMaskPlan { max_len, shape },
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        plan: SequenceMaskPlan,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let input = &req.inputs[0].quant;
        let output = &req.outputs[0].quant;

        let mut scalars = ScalarParams::new();
        scalars
            .push_i32("max_len", plan.max_len)
            .push_f32("input_scale", input.scale())
            .push_f32("input_zpScale", input.scale() * input.zero_point() as f32)
            .push_f32(
                "outputVal1",
                output.inverse_scale(config.output_scale_epsilon) + output.zero_point() as f32,
            )
            .push_i32("output_zp", output.zero_point());

        let work_size = WorkSize::new(3).with_global_size([
            WorkSize::aligned_extent(plan.shape[0], 1, 4),
            dim(&plan.shape, 1),
            dim(&plan.shape, 2),
        ]);
        Ok(Launch::new(scalars, work_size))
    }
}
