//! Moments: mean and variance over one, two or three leading axes.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::ElementKind;
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, kind_field,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 24, 8),
    KeyField::new("out", 20, 4),
    KeyField::new("axis_num", 16, 4),
    KeyField::new("axis0", 12, 4),
    KeyField::new("axis1", 8, 4),
    KeyField::new("axis2", 4, 4),
    KeyField::new("image_2d", 0, 4),
];

const KINDS: &[(ElementKind, ElementKind)] = &[
    (ElementKind::U8, ElementKind::F16),
    (ElementKind::F16, ElementKind::F16),
    (ElementKind::F32, ElementKind::F32),
    (ElementKind::I32, ElementKind::F32),
];

/// Reduction axis sets with a kernel, paired with their source module.
const AXES: &[(&[u64], &str)] = &[
    (&[0], "moments_axis0"),
    (&[1], "moments_axis1"),
    (&[2], "moments_axis2"),
    (&[0, 1], "moments_axis01"),
    (&[0, 1, 2], "moments_axis012"),
];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(Moments::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for &(axes, source) in AXES {
        let suffix: String = axes.iter().map(|a| a.to_string()).collect();
        for &(input, output) in KINDS {
            table.row(
                &key_fields(input, output, axes),
                format!("cl.moments_axis{}_{}to{}", suffix, input, output),
                source,
            )?;
        }
    }
    table.build()
}

fn key_fields(input: ElementKind, output: ElementKind, axes: &[u64]) -> Vec<u64> {
    let axis = |i: usize| axes.get(i).copied().unwrap_or(0);
    vec![
        kind_field(input),
        kind_field(output),
        axes.len() as u64,
        axis(0),
        axis(1),
        axis(2),
        0,
    ]
}

/// `1 / (number of reduced elements)` for a supported axis set.
fn dim_ratio(axes: &[u64], width: usize, height: usize, chn: usize) -> f32 {
    let reduced = match axes {
        [0] => width,
        [1] => height,
        [2] => chn,
        [0, 1, 2] => width * height * chn,
        _ => width * height,
    };
    1.0 / reduced as f32
}

pub(crate) struct Moments;

impl KernelFamily for Moments {
    /// Reduction axes in request order.
    type Plan = Vec<u64>;

    const NAME: &'static str = "moments";
    const INPUTS: usize = 1;
    const OUTPUTS: usize = 2;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<Vec<u64>>, ResolveError> {
        if req.modes.is_empty() || req.modes.len() > 3 {
            return Err(ResolveError::invalid_param(
                "axis",
                format!("{:?}", req.modes),
                "expected one to three axes",
            ));
        }
        let axes = req
            .modes
            .iter()
            .map(|&a| {
                u64::try_from(a)
                    .map_err(|_| ResolveError::invalid_param("axis", a, "must not be negative"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        check_shape("output0", &req.outputs[0].shape, config.max_tensor_width)?;

        Ok(Planned {
            fields: key_fields(req.inputs[0].kind, req.outputs[0].kind, &axes),
            plan: axes,
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        axes: Vec<u64>,
        _config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let input = &req.inputs[0];
        let width = dim(&input.shape, 0);
        let height = dim(&input.shape, 1);
        let chn = dim(&input.shape, 2);

        let mut scalars = ScalarParams::new();
        scalars
            .push_i32("axis", axes[0] as i32)
            .push_i32("axis_num", axes.len() as i32)
            .push_i32("input_zp", input.quant.zero_point())
            .push_f32("input_scale", input.quant.scale())
            .push_i32("width", dim_i32("width", width)?)
            .push_i32("height", dim_i32("height", height)?)
            .push_i32("chn", dim_i32("chn", chn)?)
            .push_f32("dimRatio", dim_ratio(&axes, width, height, chn));

        let work_size = match axes.as_slice() {
            [0] => WorkSize::new(3).with_global_size([
                WorkSize::aligned_extent(height, 1, 4),
                chn,
                1,
            ]),
            [1] => WorkSize::new(3).with_global_size([
                WorkSize::aligned_extent(width, 1, 4),
                chn,
                1,
            ]),
            [_] => WorkSize::new(3).with_global_size([
                WorkSize::aligned_extent(width, 1, 4),
                height,
                1,
            ]),
            [_, _] => WorkSize::new(3)
                .with_local_size([16, 1, 1])
                .with_global_size([16, chn, 1]),
            _ => WorkSize::new(3)
                .with_local_size([16, 1, 1])
                .with_global_size([16, 1, 1]),
        };
        Ok(Launch::new(scalars, work_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::OperatorFamily;
    use crate::request::TensorDesc;

    fn request(axes: &[i32]) -> ResolveRequest {
        ResolveRequest::new(OperatorFamily::Moments)
            .input(TensorDesc::new(ElementKind::U8, [8, 6, 3]).with_affine(0.5, 3))
            .output(TensorDesc::new(ElementKind::F16, [1, 1, 1]))
            .output(TensorDesc::new(ElementKind::F16, [1, 1, 1]))
            .modes(axes.to_vec())
    }

    #[test]
    fn test_table_covers_axis_sets() {
        let table = Moments.table().unwrap();
        assert_eq!(table.len(), 20);
        let entry = table.find_by_name("cl.moments_axis012_U8toF16").unwrap();
        assert_eq!(entry.source_module, "moments_axis012");
        assert_eq!(
            table.layout().unpack(entry.key),
            vec![4, 8, 3, 0, 1, 2, 0]
        );
    }

    #[test]
    fn test_dim_ratio_per_axis_set() {
        assert_eq!(dim_ratio(&[0], 8, 6, 3), 1.0 / 8.0);
        assert_eq!(dim_ratio(&[1], 8, 6, 3), 1.0 / 6.0);
        assert_eq!(dim_ratio(&[2], 8, 6, 3), 1.0 / 3.0);
        assert_eq!(dim_ratio(&[0, 1], 8, 6, 3), 1.0 / 48.0);
        assert_eq!(dim_ratio(&[0, 1, 2], 8, 6, 3), 1.0 / 144.0);
    }

    #[test]
    fn test_launch_single_axis() {
        let req = request(&[0]);
        let planned = Moments.plan(&req, &ResolverConfig::default()).unwrap();
        let launch = Moments
            .launch(&req, planned.plan, &ResolverConfig::default())
            .unwrap();
        assert_eq!(launch.work_size.global_size, [8, 3, 1]);
        assert_eq!(launch.scalars.i32("input_zp"), Some(3));
        assert_eq!(launch.scalars.len(), 8);
    }

    #[test]
    fn test_rejects_bad_axis_lists() {
        let config = ResolverConfig::default();
        assert!(Moments.plan(&request(&[]), &config).is_err());
        assert!(Moments.plan(&request(&[0, 1, 2, 3]), &config).is_err());
        assert!(matches!(
            Moments.plan(&request(&[-1]), &config),
            Err(ResolveError::InvalidParameter { name: "axis", .. })
        ));
    }
}
