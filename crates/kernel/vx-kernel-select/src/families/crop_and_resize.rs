//! Crop boxes out of an image batch and resize them to a fixed size.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::{ElementKind, widen_to_word};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, kind_field,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 16, 8),
    KeyField::new("out", 8, 8),
    KeyField::new("method", 0, 8),
];

const VARIANTS: &[(ElementKind, ElementKind)] = &[
    (ElementKind::U32, ElementKind::U32),
    (ElementKind::U32, ElementKind::F32),
    (ElementKind::F32, ElementKind::F32),
    (ElementKind::F32, ElementKind::U32),
    (ElementKind::F32, ElementKind::I32),
    (ElementKind::I32, ElementKind::I32),
    (ElementKind::I32, ElementKind::F32),
];

/// Sampling used inside each box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResizeMethod {
    NearestNeighbor = 0,
    Bilinear = 1,
}

impl ResizeMethod {
    const ALL: [ResizeMethod; 2] = [ResizeMethod::NearestNeighbor, ResizeMethod::Bilinear];

    fn name(self) -> &'static str {
        match self {
            ResizeMethod::NearestNeighbor => "nearest_neighbor",
            ResizeMethod::Bilinear => "bilinear",
        }
    }

    fn source(self) -> &'static str {
        match self {
            ResizeMethod::NearestNeighbor => "crop_and_resize_nearest_neighbor",
            ResizeMethod::Bilinear => "crop_and_resize_bilinear",
        }
    }
}

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table =
        TableBuilder::for_fields(CropAndResize::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for method in ResizeMethod::ALL {
        for &(input, output) in VARIANTS {
            table.row(
                &[kind_field(input), kind_field(output), method as u64],
                format!("cl.crop_and_resize_{}_{}to{}", method.name(), input, output),
                method.source(),
            )?;
        }
    }
    table.build()
}

/// `(i - 1) / (c - 1)` when the crop has more than one sample, else 0.
fn sample_step(image: usize, crop: usize) -> f32 {
    if crop > 1 {
        (image as f32 - 1.0) / (crop as f32 - 1.0)
    } else {
        0.0
    }
}

pub(crate) struct CropAndResize;

impl KernelFamily for CropAndResize {
    type Plan = ();

    const NAME: &'static str = "crop_and_resize";
    const INPUTS: usize = 3;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<()>, ResolveError> {
        let method = req
            .modes
            .first()
            .copied()
            .or_else(|| req.params.int("resize_method"))
            .ok_or(ResolveError::MissingParameter {
                family: Self::NAME,
                name: "resize_method",
            })?;
        let method = u64::try_from(method).map_err(|_| {
            ResolveError::invalid_param("resize_method", method, "must not be negative")
        })?;

        check_shape("output0", &req.outputs[0].shape, config.max_tensor_width)?;

        Ok(Planned {
            fields: vec![
                kind_field(widen_to_word(req.inputs[0].kind)),
                kind_field(widen_to_word(req.outputs[0].kind)),
                method,
            ],
            plan: (),
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        _plan: (),
        _config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let image = &req.inputs[0];
        let output = &req.outputs[0];

        let in_out_scale = image.quant.scale() / output.quant.scale();
        let in_out_tile =
            output.quant.zero_point() as f32 - in_out_scale * image.quant.zero_point() as f32;
        let (image_w, image_h) = (dim(&image.shape, 0), dim(&image.shape, 1));
        let (crop_w, crop_h) = (dim(&output.shape, 0), dim(&output.shape, 1));
        let batch_out = dim(&output.shape, 3);

        let mut scalars = ScalarParams::new();
        scalars
            .push_i32("ori_depth", dim_i32("ori_depth", dim(&image.shape, 2))?)
            .push_i32("ori_batchout", dim_i32("ori_batchout", batch_out)?)
            .push_f32("inOutScale", in_out_scale)
            .push_f32("inOutTile", in_out_tile)
            .push_f32(
                "extrapolation_value",
                req.params.float("extrapolation_value").unwrap_or(0.0),
            )
            .push_f32("width_scale", sample_step(image_w, crop_w))
            .push_f32("height_scale", sample_step(image_h, crop_h))
            .push_i32("image_width", dim_i32("image_width", image_w)?)
            .push_i32("image_height", dim_i32("image_height", image_h)?);

        let work_size = WorkSize::new(3).with_global_size([crop_w, crop_h, batch_out]);
        Ok(Launch::new(scalars, work_size))
    }
}
