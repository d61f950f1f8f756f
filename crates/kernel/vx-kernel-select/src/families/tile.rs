//! Tile: repeat the input along each axis.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::{ElementKind, widen_to_word};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim, is_image_2d};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, flag,
    kind_field,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 12, 8),
    KeyField::new("out", 4, 8),
    KeyField::new("image_2d", 0, 4),
];

const KINDS: &[ElementKind] = &[ElementKind::I32, ElementKind::U32, ElementKind::F32];

/// Multiples past this many axes are not handled by the kernels.
const MAX_MULTIPLES: usize = 4;

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(Tile::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for &kind in KINDS {
        table.row(
            &[kind_field(kind), kind_field(kind), flag(false)],
            format!("cl.tile_{}to{}", kind, kind),
            "tile",
        )?;
        table.row(
            &[kind_field(kind), kind_field(kind), flag(true)],
            format!("cl.tile_{}to{}_2D", kind, kind),
            "tile",
        )?;
    }
    table.build()
}

/// Only the first three axes may repeat.
fn is_supported_axis(multiples: &[usize]) -> bool {
    match multiples.len() {
        n if n < MAX_MULTIPLES => true,
        n if n > MAX_MULTIPLES => false,
        _ => multiples[3..].iter().all(|&m| m <= 1),
    }
}

pub(crate) struct Tile;

pub(crate) struct TilePlan {
    multiples: Vec<usize>,
}

impl Tile {
    /// Multiples from `modes`, or `out / in` per input axis.
    fn multiples(req: &ResolveRequest) -> Result<Vec<usize>, ResolveError> {
        let input = &req.inputs[0];
        let output = &req.outputs[0];

        if req.modes.is_empty() {
            return Ok(input
                .shape
                .iter()
                .enumerate()
                .map(|(i, &d)| output.dim(i) / d.max(1))
                .collect());
        }

        req.modes
            .iter()
            .map(|&m| {
                usize::try_from(m)
                    .ok()
                    .filter(|&m| m > 0)
                    .ok_or_else(|| ResolveError::invalid_param("multiples", m, "must be positive"))
            })
            .collect()
    }
}

impl KernelFamily for Tile {
    type Plan = TilePlan;

    const NAME: &'static str = "tile";
    const INPUTS: usize = 1;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<TilePlan>, ResolveError> {
        let input = &req.inputs[0];
        let output = &req.outputs[0];
        let multiples = Self::multiples(req)?;

        if !is_supported_axis(&multiples) {
            return Err(ResolveError::unsupported(
                Self::NAME,
                format!("multiples {:?}", multiples),
            ));
        }

        let rank = input.rank().max(output.rank()).max(multiples.len());
        for i in 0..rank {
            let expected = input.dim(i) * multiples.get(i).copied().unwrap_or(1);
            if output.dim(i) != expected {
                return Err(ResolveError::invalid_shape(
                    "output0",
                    &output.shape,
                    format!("axis {} should be {}", i, expected),
                ));
            }
        }
        check_shape("output0", &output.shape, config.max_tensor_width)?;

        Ok(Planned {
            fields: vec![
                kind_field(widen_to_word(input.kind)),
                kind_field(widen_to_word(output.kind)),
                flag(is_image_2d(&input.shape)),
            ],
            plan: TilePlan { multiples },
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        plan: TilePlan,
        _config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let input = &req.inputs[0].shape;
        let output = &req.outputs[0].shape;

        let mut scalars = ScalarParams::new();
        scalars
            .push_i32("batchIn", dim_i32("batchIn", dim(input, 3))?)
            .push_i32("depthIn", dim_i32("depthIn", dim(input, 2))?)
            .push_i32("depthOut", dim_i32("depthOut", dim(output, 2))?);
        for (i, name) in ["multiples_0", "multiples_1", "multiples_2", "multiples_3"]
            .into_iter()
            .enumerate()
        {
            let m = plan.multiples.get(i).copied().unwrap_or(1);
            scalars.push_i32(name, dim_i32(name, m)?);
        }

        let work_size =
            WorkSize::new(3).with_global_size([dim(input, 0), dim(input, 1), dim(input, 2)]);
        Ok(Launch::new(scalars, work_size))
    }
}
