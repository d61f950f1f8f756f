//! Col2im: scatter sliding-window columns back into an image.

use crate::config::ResolverConfig;
use crate::dispatch::{ScalarParams, WorkSize};
use crate::dtype::{ElementKind, widen_to_word};
use crate::error::ResolveError;
use crate::key::KeyField;
use crate::request::ResolveRequest;
use crate::shape::{check_shape, dim};
use crate::table::{TableBuilder, TableError, VariantTable};

use super::{
    ELTWISE_HELPER, KernelFamily, Launch, Planned, TableCell, cached_table, dim_i32, flag,
    kind_field,
};

const LAYOUT: &[KeyField] = &[
    KeyField::new("in", 16, 8),
    KeyField::new("out", 8, 8),
    KeyField::new("image_2d", 0, 8),
];

const KINDS: &[ElementKind] = &[ElementKind::F32, ElementKind::U32, ElementKind::I32];

static TABLE: TableCell = TableCell::new();

fn build_table() -> Result<VariantTable, TableError> {
    let mut table = TableBuilder::for_fields(Col2Im::NAME, LAYOUT)?.helpers(ELTWISE_HELPER);
    for image_2d in [false, true] {
        let suffix = if image_2d { "_2D" } else { "" };
        for &input in KINDS {
            for &output in KINDS {
                table.row(
                    &[kind_field(input), kind_field(output), flag(image_2d)],
                    format!("cl.col2im_{}to{}{}", input, output, suffix),
                    "col2im",
                )?;
            }
        }
    }
    table.build()
}

/// Window geometry per spatial axis, ordered `w, h, d`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Window {
    strides: [i32; 3],
    dilations: [i32; 3],
    /// `w_front, w_end, h_front, h_end, d_front, d_end`.
    pads: [i32; 6],
    kernel: [i32; 3],
}

impl Window {
    fn from_request(req: &ResolveRequest) -> Result<Self, ResolveError> {
        let block_shape = req
            .params
            .ints("block_shape")
            .ok_or(ResolveError::MissingParameter {
                family: Col2Im::NAME,
                name: "block_shape",
            })?;
        if block_shape.is_empty() || block_shape.len() > 3 {
            return Err(ResolveError::invalid_param(
                "block_shape",
                format!("{:?}", block_shape),
                "expected one to three sizes",
            ));
        }
        require_positive("block_shape", &block_shape)?;

        let strides = fill::<3>(req, "strides", 1)?;
        require_positive("strides", &strides)?;
        let dilations = fill::<3>(req, "dilations", 1)?;
        require_positive("dilations", &dilations)?;
        let mut kernel = [1; 3];
        kernel[..block_shape.len()].copy_from_slice(&block_shape);

        Ok(Self {
            strides,
            dilations,
            pads: fill::<6>(req, "pads", 0)?,
            kernel,
        })
    }

    /// Extent covered by one kernel along `axis`.
    fn span(&self, axis: usize) -> i64 {
        (i64::from(self.kernel[axis]) - 1) * i64::from(self.dilations[axis]) + 1
    }

    /// Window positions along `axis` over a padded extent.
    fn moves(&self, axis: usize, padded: i64) -> i64 {
        let stride = i64::from(self.strides[axis]);
        (padded - self.span(axis) + stride) / stride
    }
}

fn require_positive(name: &'static str, values: &[i32]) -> Result<(), ResolveError> {
    if values.iter().any(|&v| v <= 0) {
        return Err(ResolveError::invalid_param(
            name,
            format!("{:?}", values),
            "must be positive",
        ));
    }
    Ok(())
}

/// Read an int-list parameter into `N` slots, padding with `default`.
fn fill<const N: usize>(
    req: &ResolveRequest,
    name: &'static str,
    default: i32,
) -> Result<[i32; N], ResolveError> {
    let mut out = [default; N];
    if let Some(values) = req.params.ints(name) {
        if values.len() > N {
            return Err(ResolveError::invalid_param(
                name,
                format!("{:?}", values),
                format!("expected at most {} values", N),
            ));
        }
        out[..values.len()].copy_from_slice(&values);
    }
    Ok(out)
}

fn derived_i32(name: &'static str, value: i64) -> Result<i32, ResolveError> {
    i32::try_from(value)
        .map_err(|_| ResolveError::invalid_param(name, value, "does not fit a 32-bit scalar"))
}

pub(crate) struct Col2Im;

pub(crate) struct Col2ImPlan {
    window: Window,
    /// Output as `[w, h, depth * channels * batch]`.
    output: [usize; 3],
    /// Columns as `[w, h / channels, batch * channels]`.
    input: [usize; 3],
}

impl KernelFamily for Col2Im {
    type Plan = Col2ImPlan;

    const NAME: &'static str = "col2im";
    const INPUTS: usize = 1;
    const OUTPUTS: usize = 1;

    fn table(&self) -> Result<&'static VariantTable, ResolveError> {
        cached_table(&TABLE, build_table)
    }

    fn plan(
        &self,
        req: &ResolveRequest,
        config: &ResolverConfig,
    ) -> Result<Planned<Col2ImPlan>, ResolveError> {
        let window = Window::from_request(req)?;
        let spatial = req.params.ints("block_shape").map_or(1, |b| b.len());
        let image_2d = spatial <= 2;

        let input = &req.inputs[0].shape;
        let output = &req.outputs[0].shape;
        let channels = dim(output, spatial);
        if channels == 0 {
            return Err(ResolveError::invalid_shape(
                "output0",
                output,
                "channel dimension is empty",
            ));
        }

        let input_ws = [dim(input, 0), dim(input, 1) / channels, dim(input, 2) * channels];
        let rest = if image_2d {
            dim(output, 2) * dim(output, 3)
        } else {
            dim(output, 2) * dim(output, 3) * dim(output, 4)
        };
        let output_ws = [dim(output, 0), dim(output, 1), rest];
        check_shape("output0", &output_ws, config.max_tensor_width)?;
        if input_ws[2] == 0 {
            return Err(ResolveError::invalid_shape("input0", input, "batch is empty"));
        }

        Ok(Planned {
            fields: vec![
                kind_field(widen_to_word(req.inputs[0].kind)),
                kind_field(widen_to_word(req.outputs[0].kind)),
                flag(image_2d),
            ],
            plan: Col2ImPlan {
                window,
                output: output_ws,
                input: input_ws,
            },
        })
    }

    fn launch(
        &self,
        req: &ResolveRequest,
        plan: Col2ImPlan,
        _config: &ResolverConfig,
    ) -> Result<Launch, ResolveError> {
        let Col2ImPlan {
            window,
            output,
            input,
        } = plan;
        let in_q = &req.inputs[0].quant;
        let out_q = &req.outputs[0].quant;
        let in_out_scale = in_q.scale() / out_q.scale();
        let in_out_tile = out_q.zero_point() as f32 - in_out_scale * in_q.zero_point() as f32;

        let [pw0, pw1, ph0, ph1, pd0, pd1] = window.pads.map(i64::from);
        let depth = output[2] / input[2];
        let width_pad = output[0] as i64 + pw0 + pw1;
        let height_pad = output[1] as i64 + ph0 + ph1;
        let depth_pad = depth as i64 + pd0 + pd1;

        let mut scalars = ScalarParams::new();
        for (name, value) in [
            ("stride_w", window.strides[0]),
            ("stride_h", window.strides[1]),
            ("stride_d", window.strides[2]),
            ("dilation_w", window.dilations[0]),
            ("dilation_h", window.dilations[1]),
            ("dilation_d", window.dilations[2]),
            ("pad_w_front", window.pads[0]),
            ("pad_w_end", window.pads[1]),
            ("pad_h_front", window.pads[2]),
            ("pad_h_end", window.pads[3]),
            ("pad_d_front", window.pads[4]),
            ("pad_d_end", window.pads[5]),
            ("kernel_w", window.kernel[0]),
            ("kernel_h", window.kernel[1]),
            ("kernel_d", window.kernel[2]),
        ] {
            scalars.push_i32(name, value);
        }
        scalars
            .push_f32("inOutScale", in_out_scale)
            .push_f32("inOutTile", in_out_tile)
            .push_i32("width_pad", derived_i32("width_pad", width_pad)?)
            .push_i32("height_pad", derived_i32("height_pad", height_pad)?)
            .push_i32("depth_pad", derived_i32("depth_pad", depth_pad)?)
            .push_i32(
                "move_time_x",
                derived_i32("move_time_x", window.moves(0, width_pad))?,
            )
            .push_i32(
                "move_time_y",
                derived_i32("move_time_y", window.moves(1, height_pad))?,
            )
            .push_i32("kernel_x_new", derived_i32("kernel_x_new", window.span(0))?)
            .push_i32("kernel_y_new", derived_i32("kernel_y_new", window.span(1))?)
            .push_i32("kernel_z_new", derived_i32("kernel_z_new", window.span(2))?)
            .push_i32("depth", dim_i32("depth", depth)?);

        Ok(Launch::new(scalars, WorkSize::new(3).with_global_size(output)))
    }
}
