//! Bilinear sampling of an image at the coordinates of a grid tensor.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::{ElementKind, widen_f16};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, kind_field};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in1", 20, 8),
    KeyField::new("in0", 8, 12),
    KeyField::new("out", 0, 8),
];

/// `(image, grid, output)` kinds.
const VARIANTS: &[(ElementKind, ElementKind, ElementKind)] = &[
    (ElementKind::F32, ElementKind::F32, ElementKind::F32),
    (ElementKind::U8, ElementKind::U8, ElementKind::U8),
];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(BilinearGridSample::NAME, LAYOUT)?;
    for &(in0, in1, out) in VARIANTS {
        table.row(
            &[kind_field(in1), kind_field(in0), kind_field(out)],
            format!("cl.bilinear_grid_sample_{}_{}to{}", in0, in1, out),
            "bilinear_grid_sample",
        )?;
    }
    table.build()
}

/// `(half, add)` mapping a normalized coordinate onto pixel space.
fn coordinate_transform(extent: usize, align_corners: bool) -> (f32, f32) {
    if align_corners {
        let half = (extent as f32 - 1.0) * 0.5;
        (half, half)
    } else {
        let half = extent as f32 * 0.5;
        (half, half - 0.5)
    }
}

pub(crate) struct BilinearGridSample;

impl KernelFamily for BilinearGridSample {
    /// Whether the quantized kernel signature applies.
    type Plan = bool;

    const NAME: &'static str = "bilinear_grid_sample";
    const INPUTS: usize = 2;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<bool>, ResolveError> {
        let image = &req.inputs[0];
        let grid = &req.inputs[1];
        check_shape("input0", &image.shape, config.max_tensor_width)?;
        check_shape("input1", &grid.shape, config.max_tensor_width)?;
        if grid.rank() >= 3 {
            let folded = [dim(&grid.shape, 0) * dim(&grid.shape, 1), dim(&grid.shape, 2)];
            check_shape("input1", &folded, config.max_tensor_width)?;
        }

        let in0 = widen_f16(image.kind);
        let out = widen_f16(req.outputs[0].kind);
        Ok(Planned {
            fields: vec![kind_field(widen_f16(grid.kind)), kind_field(in0), kind_field(out)],
            plan: in0 == ElementKind::U8 || out == ElementKind::U8,
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        quantized: bool,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let image = &req.inputs[0];
        let grid = &req.inputs[1];
        let output = &req.outputs[0];
        let align_corners = req.params.int("align_corners").unwrap_or(0) != 0;

        let (half_w, add_w) = coordinate_transform(dim(&image.shape, 0), align_corners);
        let (half_h, add_h) = coordinate_transform(dim(&image.shape, 1), align_corners);

        let mut scalars = ScalarParams::new();
        scalars
            .push_f32("half_input0_w", half_w)
            .push_f32("half_input0_h", half_h)
            .push_f32("add_float_value_w", add_w)
            .push_f32("add_float_value_h", add_h)
            .push_i32("depth", dim_i32("depth", dim(&image.shape, 2))?);
        if quantized {
            scalars
                .push_f32("input0_scale", image.quant.scale())
                .push_f32("input0_tail", image.quant.tail())
                .push_f32("input1_scale", grid.quant.scale())
                .push_f32("input1_tail", grid.quant.tail())
                .push_f32(
                    "output_scale",
                    output.quant.inverse_scale(config.output_scale_epsilon),
                )
                .push_f32("output_zp", output.quant.zero_point() as f32);
        }

        let work_size = WorkSize::new(2).with_global_size([
            WorkSize::aligned_extent(dim(&output.shape, 0), 1, 4),
            dim(&output.shape, 1),
            1,
        ]);
        Ok(Launch::new(scalars, work_size))
    }
}
