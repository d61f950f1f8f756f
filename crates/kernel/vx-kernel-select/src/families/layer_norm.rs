//! Layer normalization over the innermost axis.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::ElementKind;
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, flag,
    kind_field, require_float,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 24, 8),
    KeyField::new("out", 16, 8),
    KeyField::new("reshape", 8, 8),
];

const VARIANTS: &[(ElementKind, ElementKind)] = &[
    (ElementKind::F32, ElementKind::F32),
    (ElementKind::U8, ElementKind::U8),
];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(LayerNorm::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for &(input, output) in VARIANTS {
        table.row(
            &[kind_field(input), kind_field(output), flag(false)],
            format!("cl.layer_norm_{}to{}", input, output),
            "layer_normalization",
        )?;
    }
    table.build()
}

pub(crate) struct LayerNorm;

impl KernelFamily for LayerNorm {
    /// `eps`.
    type Plan = f32;

    const NAME: &'static str = "layer_norm";
    const INPUTS: usize = 3;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<f32>, ResolveError> {
        let eps = require_float(req, Self::NAME, "eps")?;
        check_shape("output0", &req.outputs[0].shape, config.max_tensor_width)?;

        let (input, output) = match (req.inputs[0].kind, req.outputs[0].kind) {
            (ElementKind::F16, ElementKind::F16) => (ElementKind::F32, ElementKind::F32),
            other => other,
        };
        Ok(Planned {
            fields: vec![kind_field(input), kind_field(output), flag(false)],
            plan: eps,
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        eps: f32,
        config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let input = &req.inputs[0];
        let output = &req.outputs[0];
        let width = dim(&input.shape, 0);
        let height = dim(&input.shape, 1);
        let chn = dim(&input.shape, 2);

        let in_zp = input.quant.zero_point() as f32;
        let in_scale = input.quant.scale();
        let out_scale = output.quant.inverse_scale(config.output_scale_epsilon);
        let e2_in_scale = in_scale * in_scale;
        let w = width as f32;

        let mut scalars = ScalarParams::new();
        scalars
            .push_f32("eps", eps)
            .push_f32("input_zp", in_zp)
            .push_f32("input_scale", in_scale)
            .push_f32("output_zp", output.quant.zero_point() as f32)
            .push_f32("output_scale", out_scale)
            .push_f32("e2InScale", e2_in_scale)
            .push_f32("scale_inOut", in_scale * out_scale)
            .push_f32("sumZpScale", w * in_zp * in_scale)
            .push_f32("zp2ScaleE2", in_zp * 2.0 * e2_in_scale)
            .push_f32("sumZpScaleE2", w * in_zp * in_zp * e2_in_scale)
            .push_i32("width", dim_i32("width", width)?)
            .push_i32("height", dim_i32("height", height)?)
            .push_f32("dim_ratio", 1.0 / w);

        let work_size = WorkSize::new(3)
            .with_local_size([16, 1, 1])
            .with_global_size([16, height, chn]);
        Ok(Launch::new(scalars, work_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::OperatorFamily;
    use crate::request::TensorDesc;

    fn request() -> ResolveRequest {
        ResolveRequest::new(OperatorFamily::LayerNorm)
            .input(TensorDesc::new(ElementKind::U8, [4, 3, 2]).with_affine(0.5, 2))
            .input(TensorDesc::new(ElementKind::F32, [4]))
            .input(TensorDesc::new(ElementKind::F32, [4]))
            .output(TensorDesc::new(ElementKind::U8, [4, 3, 2]).with_affine(0.25, 0))
    }

    #[test]
    fn test_eps_is_required() {
        assert!(matches!(
            LayerNorm.plan(&request(), &ResolverConfig::default()),
            Err(ResolveError::MissingParameter { name: "eps", .. })
        ));
    }

    #[test]
    fn test_quantized_scalars() {
        let req = request().float_param("eps", 1e-4);
        let config = ResolverConfig::default();
        let planned = LayerNorm.plan(&req, &config).unwrap();
        assert_eq!(planned.fields, vec![4, 4, 0]);

        let launch = LayerNorm.launch(&req, planned.plan, &config).unwrap();
        let s = &launch.scalars;
        assert_eq!(s.len(), 13);
        assert_eq!(s.f32("output_scale"), Some(4.0));
        assert_eq!(s.f32("e2InScale"), Some(0.25));
        assert_eq!(s.f32("scale_inOut"), Some(2.0));
        assert_eq!(s.f32("sumZpScale"), Some(4.0));
        assert_eq!(s.f32("zp2ScaleE2"), Some(1.0));
        assert_eq!(s.f32("sumZpScaleE2"), Some(4.0));
        assert_eq!(s.f32("dim_ratio"), Some(0.25));
        assert_eq!(launch.work_size.global_size, [16, 3, 2]);
        assert_eq!(launch.work_size.local_size, [16, 1, 1]);
    }

    #[test]
    fn test_half_precision_pair_uses_f32_kernel() {
        let table = LayerNorm.table().unwrap();
        assert!(table.find_by_name("cl.layer_norm_F32toF32").is_some());

        let req = ResolveRequest::new(OperatorFamily::LayerNorm)
            .input(TensorDesc::new(ElementKind::F16, [4, 3]))
            .input(TensorDesc::new(ElementKind::F32, [4]))
            .input(TensorDesc::new(ElementKind::F32, [4]))
            .output(TensorDesc::new(ElementKind::F16, [4, 3]))
            .float_param("eps", 1e-5);
        let planned = LayerNorm.plan(&req, &ResolverConfig::default()).unwrap();
        assert_eq!(planned.fields, vec![9, 9, 0]);
    }
}
