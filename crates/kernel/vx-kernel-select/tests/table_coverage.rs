//! Every table entry is reachable through `resolve` and maps back to itself.

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow, bail};
use vx_core::logging::init_test_logging;
use vx_kernel_select::{
    ElementKind, KernelVariantResolver, OperatorFamily, ResolveRequest, TensorDesc, UnaryOp,
    VariantEntry,
};

fn kind(code: u64) -> Result<ElementKind> {
    u8::try_from(code)
        .ok()
        .and_then(ElementKind::from_code)
        .ok_or_else(|| anyhow!("no element kind with code {code}"))
}

fn unary_op(code: u64) -> Result<UnaryOp> {
    UnaryOp::ALL
        .into_iter()
        .find(|op| u64::from(op.code()) == code)
        .ok_or_else(|| anyhow!("no unary op with code {code}"))
}

fn tensor(kind: ElementKind, shape: &[usize]) -> TensorDesc {
    TensorDesc::new(kind, shape.to_vec())
}

/// Build a request whose normalized key is `fields`, or `None` when no
/// request can produce it.
fn request_for(family: OperatorFamily, fields: &[u64]) -> Result<Option<ResolveRequest>> {
    let req = ResolveRequest::new(family);
    let req = match (family, fields) {
        // Element-wise kernels always launch on a collapsed rank-2 shape.
        (OperatorFamily::Erf, &[_, _, 0]) | (OperatorFamily::EltwiseUnary(_), &[_, _, _, 0]) => {
            return Ok(None);
        }
        (OperatorFamily::Erf, &[input, output, 1])
        | (OperatorFamily::EltwiseUnary(_), &[_, input, output, 1]) => req
            .input(tensor(kind(input)?, &[8, 8]))
            .output(tensor(kind(output)?, &[8, 8])),
        (OperatorFamily::Tile, &[input, output, image_2d]) => {
            let shape: &[usize] = if image_2d == 1 { &[4, 4] } else { &[4, 4, 2] };
            req.input(tensor(kind(input)?, shape))
                .output(tensor(kind(output)?, shape))
        }
        (OperatorFamily::Moments, &[input, output, axis_num, a0, a1, a2, _]) => {
            let axes = [a0, a1, a2]
                .into_iter()
                .take(usize::try_from(axis_num)?)
                .map(i32::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            req.input(tensor(kind(input)?, &[8, 6, 3]))
                .output(tensor(kind(output)?, &[1, 1, 1]))
                .output(tensor(kind(output)?, &[1, 1, 1]))
                .modes(axes)
        }
        (OperatorFamily::Slice, &[in1, in0, output, image_2d]) => {
            let (input, sliced): (&[usize], &[usize]) = if image_2d == 1 {
                (&[8, 8], &[4, 4])
            } else {
                (&[8, 8, 3], &[4, 4, 3])
            };
            req.input(tensor(kind(in0)?, input))
                .input(tensor(kind(in1)?, &[4]))
                .output(tensor(kind(output)?, sliced))
        }
        (OperatorFamily::LayerNorm, &[input, output, _]) => req
            .input(tensor(kind(input)?, &[16, 4, 2]))
            .input(tensor(ElementKind::F32, &[16]))
            .input(tensor(ElementKind::F32, &[16]))
            .output(tensor(kind(output)?, &[16, 4, 2]))
            .float_param("eps", 1e-5),
        (OperatorFamily::GroupNorm, &[input, output, image_2d]) => {
            let (shape, groups): (&[usize], i32) = if image_2d == 1 {
                (&[8, 8, 12], 4)
            } else {
                (&[256, 256, 4], 2)
            };
            let chn = shape[2];
            req.input(tensor(kind(input)?, shape))
                .input(tensor(ElementKind::F32, &[chn]))
                .input(tensor(ElementKind::F32, &[chn]))
                .output(tensor(kind(output)?, shape))
                .float_param("eps", 1e-5)
                .int_param("group_num", groups)
        }
        (OperatorFamily::CropAndResize, &[input, output, method]) => req
            .input(tensor(kind(input)?, &[16, 16, 3, 1]))
            .input(tensor(ElementKind::F32, &[4, 2]))
            .input(tensor(ElementKind::I32, &[2]))
            .output(tensor(kind(output)?, &[8, 8, 3, 2]))
            .modes(vec![i32::try_from(method)?]),
        (OperatorFamily::BilinearGridSample, &[in1, in0, output]) => req
            .input(tensor(kind(in0)?, &[10, 6, 3]))
            .input(tensor(kind(in1)?, &[2, 5, 7]))
            .output(tensor(kind(output)?, &[5, 7, 3])),
        (OperatorFamily::SequenceMask, &[input, output, image_2d]) => {
            // 131072 lengths split into [32768, 4].
            let (lengths, mask): (&[usize], &[usize]) = if image_2d == 1 {
                (&[3], &[5, 3])
            } else {
                (&[131_072], &[5, 32_768, 4])
            };
            req.input(tensor(kind(input)?, lengths))
                .output(tensor(kind(output)?, mask))
                .int_param("max_len", 5)
        }
        (OperatorFamily::Col2Im, &[input, output, image_2d]) => {
            if image_2d == 1 {
                req.input(tensor(kind(input)?, &[36, 18, 1]))
                    .output(tensor(kind(output)?, &[6, 6, 2, 1]))
                    .ints_param("block_shape", vec![3, 3])
                    .ints_param("pads", vec![1, 1, 1, 1])
            } else {
                req.input(tensor(kind(input)?, &[27, 16, 1]))
                    .output(tensor(kind(output)?, &[4, 4, 4, 2, 1]))
                    .ints_param("block_shape", vec![2, 2, 2])
            }
        }
        _ => bail!("unexpected key fields {fields:?} for {family}"),
    };
    Ok(Some(req))
}

fn families() -> Vec<OperatorFamily> {
    let mut families: Vec<OperatorFamily> = OperatorFamily::NAMES
        .iter()
        .filter(|&&name| name != "eltwise_unary")
        .filter_map(|name| name.parse().ok())
        .collect();
    families.extend(UnaryOp::ALL.into_iter().map(OperatorFamily::EltwiseUnary));
    families
}

#[test]
fn test_every_entry_resolves_to_itself() -> Result<()> {
    init_test_logging();
    let resolver = KernelVariantResolver::new();
    let mut covered = BTreeSet::new();

    for family in families() {
        let table = resolver.variant_table(family)?;
        let layout = table.layout();
        let entries: Vec<&VariantEntry> = match family {
            OperatorFamily::EltwiseUnary(op) => table
                .entries()
                .iter()
                .filter(|e| layout.unpack(e.key)[0] == u64::from(op.code()))
                .collect(),
            _ => table.entries().iter().collect(),
        };

        for entry in entries {
            let fields = layout.unpack(entry.key);
            if let OperatorFamily::EltwiseUnary(op) = family {
                assert_eq!(unary_op(fields[0])?, op);
            }
            let Some(req) = request_for(family, &fields)? else {
                continue;
            };
            let dispatch = resolver
                .resolve(&req)
                .with_context(|| format!("{family}: {}", entry.kernel_name))?;
            assert_eq!(dispatch.kernel_name, entry.kernel_name, "{family}");
            assert_eq!(dispatch.source_modules, entry.source_modules());
            covered.insert(family.name());
        }
    }

    assert_eq!(covered, OperatorFamily::NAMES.into_iter().collect::<BTreeSet<_>>());
    Ok(())
}
