//! Group normalization
//!
//! Resolves to three launches sharing one kernel id: per-group sums and
//! squares, then mean and variance, then the normalization itself. The first
//! two are returned as prerequisites of the third.

use crate::config::ResolverConfig;
use crate::dispatch::{ResolvedDispatch, ScalarParams, WorkSize};
use crate::dtype::{ElementKind, widen_f16};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim, optimize_element_shape};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, flag,
    kind_field, require_float, require_int,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 24, 8),
    KeyField::new("out", 16, 8),
    KeyField::new("image_2d", 8, 8),
];

const MEAN_VARI_LAYOUT: &[KeyField] = &[KeyField::new("in", 24, 8), KeyField::new("out", 16, 8)];

const SUM_SQR_KINDS: &[ElementKind] = &[ElementKind::U8, ElementKind::F32, ElementKind::I32];

const NORM_VARIANTS: &[(ElementKind, ElementKind)] = &[
    (ElementKind::U8, ElementKind::U8),
    (ElementKind::U8, ElementKind::F32),
    (ElementKind::F32, ElementKind::F32),
    (ElementKind::I32, ElementKind::I32),
    (ElementKind::I32, ElementKind::F32),
];

static SUM_SQR_TABLE: TableCell = TableCell::new();
static MEAN_VARI_TABLE: TableCell = TableCell::new();
static NORM_TABLE: TableCell = TableCell::new();

fn source_for(input: ElementKind) -> &'static str {
    match input {
        ElementKind::U8 => "group_normalization_u8",
        ElementKind::I32 => "group_normalization_i32",
        _ => "group_normalization_f32",
    }
}

fn suffix(image_2d: bool) -> &'static str {
    if image_2d { "_2D" } else { "" }
}

fn build_sum_sqr_table() -> Result<VariantTable, TableError> {
    let mut table =
        TableBuilder::for_fields("group_norm_sumsqr", LAYOUT)?.helpers(ELTWISE_HELPER);
    for &input in SUM_SQR_KINDS {
        for image_2d in [false, true] {
            table.row(
                &[kind_field(input), kind_field(ElementKind::F32), flag(image_2d)],
                format!("cl.group_norm_sumsqr_{}{}", input, suffix(image_2d)),
                source_for(input),
            )?;
        }
    }
    table.build()
}

fn build_mean_vari_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields("group_norm_meanvari", MEAN_VARI_LAYOUT)?
        .helpers(ELTWISE_HELPER);
    table.row(
        &[kind_field(ElementKind::F32), kind_field(ElementKind::F32)],
        "cl.group_norm_meanvari",
        "group_normalization_f32",
    )?;
    table.build()
}

fn build_norm_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(GroupNorm::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for &(input, output) in NORM_VARIANTS {
        for image_2d in [false, true] {
            table.row(
                &[kind_field(input), kind_field(output), flag(image_2d)],
                format!("cl.group_norm_{}to{}{}", input, output, suffix(image_2d)),
                source_for(input),
            )?;
        }
    }
    table.build()
}

/// Working shape `[w, h, c, batch]` after folding each group into `w x h`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GroupShape {
    pub shape: [usize; 4],
    pub is_2d: bool,
}

/// Fold `[w, h, group_size]` into two dimensions and lay the groups out
/// behind them.
fn fold_groups(
    input: &[usize],
    group_num: usize,
    group_size: usize,
    max_width: usize,
) -> GroupShape {
    let folded = optimize_element_shape(&[dim(input, 0), dim(input, 1), group_size], max_width);
    let batch = dim(input, 3);
    if folded[1] == 1 {
        GroupShape {
            shape: [folded[0], group_num, 1, batch],
            is_2d: true,
        }
    } else {
        GroupShape {
            shape: [folded[0], folded[1], group_num, batch],
            is_2d: false,
        }
    }
}

pub(crate) struct GroupNorm;

pub(crate) struct GroupNormPlan {
    eps: f32,
    group_num: usize,
    group_size: usize,
    input_kind: ElementKind,
    folded: GroupShape,
}

/// Look up one stage and wrap it as a standalone dispatch.
fn stage(
    table: &VariantTable,
    fields: &[u64],
    req: &ResolveRequest,
    scalars: ScalarParams,
    work_size: WorkSize,
) -> Result<ResolvedDispatch, ResolveError> {
    let key = table
        .layout()
        .pack(fields)
        .map_err(|e| ResolveError::unsupported(GroupNorm::NAME, e.to_string()))?;
    let entry = table.lookup(key).ok_or_else(|| {
        ResolveError::unsupported(GroupNorm::NAME, table.layout().describe(fields))
    })?;
    Ok(ResolvedDispatch {
        kernel_id: req.kernel_id,
        kernel_name: entry.kernel_name.clone(),
        source_modules: entry.source_modules(),
        scalar_params: scalars,
        work_size,
        prerequisites: Vec::new(),
    })
}

impl KernelFamily for GroupNorm {
    type Plan = GroupNormPlan;

    const NAME: &'static str = "group_norm";
    const INPUTS: usize = 3;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&NORM_TABLE, build_norm_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<GroupNormPlan>, ResolveError> {
        let eps = require_float(req, Self::NAME, "eps")?;
        let group_num = require_int(req, Self::NAME, "group_num")?;
        let input = &req.inputs[0];
        let chn = dim(&input.shape, 2);

        let group_num = usize::try_from(group_num)
            .ok()
            .filter(|&g| g > 0 && chn % g == 0)
            .ok_or_else(|| {
                ResolveError::invalid_param(
                    "group_num",
                    group_num,
                    format!("must be positive and divide {} channels", chn),
                )
            })?;
        check_shape("output0", &req.outputs[0].shape, config.max_tensor_width)?;

        let group_size = chn / group_num;
        let folded = fold_groups(&input.shape, group_num, group_size, config.max_tensor_width);
        check_shape("input0", &folded.shape, config.max_tensor_width)?;
        let input_kind = widen_f16(input.kind);

        Ok(Planned {
            fields: vec![
                kind_field(input_kind),
                kind_field(widen_f16(req.outputs[0].kind)),
                flag(folded.is_2d),
            ],
            plan: GroupNormPlan {
                eps,
                group_num,
                group_size,
                input_kind,
                folded,
            },
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        plan: GroupNormPlan,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let input = &req.inputs[0];
        let output = &req.outputs[0];
        let GroupShape { shape, is_2d } = plan.folded;

        let width = shape[0];
        let height = if is_2d { 1 } else { shape[1] };
        let aligned_width = (width + 15) / 16 * 16;
        let group_stride = (width + 15) / 16 * 4;
        let spatial = dim(&input.shape, 0) * dim(&input.shape, 1);
        let group_ratio = 1.0 / (spatial * plan.group_size) as f32;

        let (r_space_org, p_stride) = if is_2d {
            (1.0 / spatial as f32, 0)
        } else {
            let beta = &req.inputs[1];
            let p_stride = dim(&beta.shape, 0) / shape[1];
            let span = if p_stride == 0 { 0 } else { width / p_stride };
            if span == 0 {
                return Err(ResolveError::invalid_shape(
                    "input1",
                    &beta.shape,
                    format!("does not tile the folded width {}", width),
                ));
            }
            (1.0 / span as f32, p_stride)
        };

        let in_zp = input.quant.zero_point() as f32;
        let in_scale = input.quant.scale();
        let is_2d_i32 = i32::from(is_2d);

        let mut sum_sqr = ScalarParams::new();
        sum_sqr
            .push_f32("eps", plan.eps)
            .push_i32("is2D", is_2d_i32)
            .push_f32("input_zp", in_zp)
            .push_f32("input_scale", in_scale)
            .push_i32("width", dim_i32("width", width)?)
            .push_i32("height", dim_i32("height", height)?);
        let sum_sqr = stage(
            cached_table(&SUM_SQR_TABLE, build_sum_sqr_table)?,
            &[
                kind_field(plan.input_kind),
                kind_field(ElementKind::F32),
                flag(is_2d),
            ],
            req,
            sum_sqr,
            WorkSize::new(3)
                .with_local_size([16, 1, 1])
                .with_global_size([aligned_width, plan.group_num, 1]),
        )?;

        let mut mean_vari = ScalarParams::new();
        mean_vari
            .push_f32("eps", plan.eps)
            .push_f32("group_ratio", group_ratio)
            .push_i32("group_stride", dim_i32("group_stride", group_stride)?);
        let mean_vari = stage(
            cached_table(&MEAN_VARI_TABLE, build_mean_vari_table)?,
            &[kind_field(ElementKind::F32), kind_field(ElementKind::F32)],
            req,
            mean_vari,
            WorkSize::new(3)
                .with_global_scale([4, 1, 1])
                .with_local_size([16, 1, 1])
                .with_global_size([16, plan.group_num, 1]),
        )?;

        let mut scalars = ScalarParams::new();
        scalars
            .push_f32("eps", plan.eps)
            .push_i32("is2D", is_2d_i32)
            .push_f32("input_zp", in_zp)
            .push_f32("input_scale", in_scale)
            .push_f32("output_zp", output.quant.zero_point() as f32)
            .push_f32(
                "output_scale",
                output.quant.inverse_scale(config.output_scale_epsilon),
            )
            .push_f32("rSpaceOrg", r_space_org)
            .push_i32("width", dim_i32("width", width)?)
            .push_i32("height", dim_i32("height", height)?)
            .push_i32("pStride", dim_i32("pStride", p_stride)?);

        let global_size = if is_2d {
            [aligned_width, plan.group_num, 1]
        } else {
            [aligned_width, height, plan.group_num]
        };
        let work_size = WorkSize::new(3)
            .with_local_size([16, 1, 1])
            .with_global_size(global_size);

        Ok(Launch {
            scalars,
            work_size,
            prerequisites: vec![sum_sqr, mean_vari],
        })
    }
}
