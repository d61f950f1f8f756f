//! Gauss error function.

use crate::config::ResolverConfig;
use crate::dispatch::ScalarParams;
use crate::dtype::{ElementKind, widen_f16};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, is_image_2d, optimize_element_shape};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    KernelFamily, Launch, Planned, TableCell, cached_table, elementwise_work_size, flag,
    kind_field, push_affine_io,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 12, 8),
    KeyField::new("out", 4, 8),
    KeyField::new("image_2d", 0, 4),
];

const VARIANTS: &[(ElementKind, ElementKind)] = &[
    (ElementKind::F32, ElementKind::F32),
    (ElementKind::U8, ElementKind::U8),
];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(Erf::NAME, LAYOUT)?;
    for &(input, output) in VARIANTS {
        for image_2d in [false, true] {
            let suffix = if image_2d { "_2D" } else { "" };
            table.row(
                &[kind_field(input), kind_field(output), flag(image_2d)],
                format!("cl.erf_{}to{}{}", input, output, suffix),
                "erf",
            )?;
        }
    }
    table.build()
}

pub(crate) struct Erf;

impl KernelFamily for Erf {
    /// Collapsed launch shape.
    type Plan = Vec<usize>;

    const NAME: &'static str = "erf";
    const INPUTS: usize = 1;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<Self::Plan>, ResolveError> {
        let input = &req.inputs[0];
        let shape = optimize_element_shape(&input.shape, config.max_tensor_width);
        check_shape("input0", &shape, config.max_tensor_width)?;

        let in_kind = widen_f16(input.kind);
        let out_kind = widen_f16(req.outputs[0].kind);
        Ok(Planned {
            fields: vec![
                kind_field(in_kind),
                kind_field(out_kind),
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
        let mut scalars = ScalarParams::new();
        push_affine_io(&mut scalars, &req.inputs[0], &req.outputs[0], config);
        Ok(Launch::new(scalars, elementwise_work_size(&shape)))
    }
}
