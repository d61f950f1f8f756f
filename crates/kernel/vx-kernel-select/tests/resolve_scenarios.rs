//! End-to-end resolution scenarios

use anyhow::Result;
use vx_core::logging::init_test_logging;
use vx_kernel_select::{
    ElementKind, KernelIdAllocator, KernelVariantResolver, OperatorFamily, QuantParams,
    ResolveError, ResolveRequest, ResolverConfig, TensorDesc, UnaryOp,
};

fn resolver() -> KernelVariantResolver {
    init_test_logging();
    KernelVariantResolver::new()
}

fn erf_u8(shape: &[usize]) -> ResolveRequest {
    ResolveRequest::new(OperatorFamily::Erf)
        .input(TensorDesc::new(ElementKind::U8, shape.to_vec()).with_affine(0.5, 10))
        .output(TensorDesc::new(ElementKind::U8, shape.to_vec()).with_affine(0.25, 85))
}

fn tile_i8(input: &[usize], multiples: &[i32]) -> ResolveRequest {
    let output: Vec<usize> = input
        .iter()
        .zip(multiples)
        .map(|(&d, &m)| d * m as usize)
        .collect();
    ResolveRequest::new(OperatorFamily::Tile)
        .input(TensorDesc::new(ElementKind::I8, input.to_vec()))
        .output(TensorDesc::new(ElementKind::I8, output))
        .modes(multiples.to_vec())
}

#[test]
fn test_erf_quantized_2d() -> Result<()> {
    let dispatch = resolver().resolve(&erf_u8(&[16, 16]))?;

    assert_eq!(dispatch.kernel_name, "cl.erf_U8toU8_2D");
    assert_eq!(dispatch.source_modules, vec!["erf"]);
    let s = &dispatch.scalar_params;
    assert_eq!(s.names(), vec!["inputScale", "inputTail", "outputScale", "outputZP"]);
    assert_eq!(s.f32("inputScale"), Some(0.5));
    assert_eq!(s.f32("inputTail"), Some(-5.0));
    assert_eq!(s.f32("outputScale"), Some(4.0));
    assert_eq!(s.f32("outputZP"), Some(85.0));
    assert_eq!(dispatch.work_size.dim, 2);
    assert_eq!(dispatch.work_size.global_size, [256, 1, 1]);
    assert!(dispatch.prerequisites.is_empty());
    Ok(())
}

#[test]
fn test_tile_four_multiples_trailing_one() -> Result<()> {
    let dispatch = resolver().resolve(&tile_i8(&[2, 3, 4, 1], &[2, 1, 1, 1]))?;
    assert_eq!(dispatch.kernel_name, "cl.tile_I32toI32");
    assert_eq!(dispatch.scalar_params.i32("multiples_0"), Some(2));
    assert_eq!(dispatch.scalar_params.i32("depthOut"), Some(4));
    Ok(())
}

#[test]
fn test_tile_four_multiples_repeating_batch() {
    let err = resolver()
        .resolve(&tile_i8(&[2, 3, 4, 1], &[1, 1, 1, 2]))
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    let err = resolver()
        .resolve(&tile_i8(&[2, 3, 4, 1, 1], &[1, 1, 1, 1, 1]))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_moments_three_axes() -> Result<()> {
    let req = ResolveRequest::new(OperatorFamily::Moments)
        .input(TensorDesc::new(ElementKind::U8, [8, 6, 3]).with_affine(0.5, 3))
        .output(TensorDesc::new(ElementKind::F16, [1, 1, 1]))
        .output(TensorDesc::new(ElementKind::F16, [1, 1, 1]))
        .modes(vec![0, 1, 2]);
    let dispatch = resolver().resolve(&req)?;

    assert_eq!(dispatch.kernel_name, "cl.moments_axis012_U8toF16");
    assert_eq!(
        dispatch.source_modules,
        vec!["eltwise_ops_helper", "moments_axis012"]
    );
    let s = &dispatch.scalar_params;
    assert_eq!(s.i32("axis_num"), Some(3));
    assert_eq!(s.f32("dimRatio"), Some(1.0 / (8.0 * 6.0 * 3.0)));
    assert_eq!(dispatch.work_size.local_size, [16, 1, 1]);
    assert_eq!(dispatch.work_size.global_size, [16, 1, 1]);
    Ok(())
}

#[test]
fn test_resolution_is_idempotent() -> Result<()> {
    let resolver = resolver();
    let mut ids = KernelIdAllocator::new();
    let req = erf_u8(&[7, 5, 3]).with_kernel_id(ids.allocate());

    let first = resolver.resolve(&req)?;
    let second = resolver.resolve(&req)?;
    assert_eq!(first, second);
    assert_eq!(first.kernel_id, req.kernel_id);
    Ok(())
}

#[test]
fn test_shared_resolver_across_threads() {
    let resolver = resolver();
    let req = erf_u8(&[32, 8]);
    let expected = resolver.resolve(&req).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| resolver.resolve(&req).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_unknown_combination_reports_fields() {
    let req = ResolveRequest::new(OperatorFamily::Erf)
        .input(TensorDesc::new(ElementKind::U8, [4, 4]).with_affine(1.0, 0))
        .output(TensorDesc::new(ElementKind::F32, [4, 4]));
    match resolver().resolve(&req) {
        Err(ResolveError::UnsupportedVariant { family, detail }) => {
            assert_eq!(family, "erf");
            assert_eq!(detail, "in=4 out=9 image_2d=1");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_malformed_quantization_is_not_a_miss() {
    let req = ResolveRequest::new(OperatorFamily::Erf)
        .input(TensorDesc::new(ElementKind::U8, [4]).with_quant(QuantParams::affine(-1.0, 0)))
        .output(TensorDesc::new(ElementKind::U8, [4]));
    let err = resolver().resolve(&req).unwrap_err();
    assert!(!err.is_not_found());
    assert!(matches!(
        err,
        ResolveError::MalformedQuantization { ref tensor, .. } if tensor == "input0"
    ));
}

#[test]
fn test_disabled_family_from_toml() -> Result<()> {
    use vx_core::config::Config;

    let config = ResolverConfig::from_toml("disabled_families = [\"moments\", \"erf\"]")?;
    let resolver = KernelVariantResolver::with_config(config)?;
    assert!(resolver.resolve(&erf_u8(&[4])).unwrap_err().is_not_found());

    let tile = resolver.resolve(&tile_i8(&[4, 4], &[2, 1]))?;
    assert_eq!(tile.kernel_name, "cl.tile_I32toI32_2D");
    Ok(())
}

#[test]
fn test_group_norm_prerequisites_share_kernel_id() -> Result<()> {
    let mut ids = KernelIdAllocator::starting_at(7);
    let req = ResolveRequest::new(OperatorFamily::GroupNorm)
        .with_kernel_id(ids.allocate())
        .input(TensorDesc::new(ElementKind::F16, [8, 8, 12]))
        .input(TensorDesc::new(ElementKind::F32, [12]))
        .input(TensorDesc::new(ElementKind::F32, [12]))
        .output(TensorDesc::new(ElementKind::F16, [8, 8, 12]))
        .float_param("eps", 1e-5)
        .int_param("group_num", 4);
    let dispatch = resolver().resolve(&req)?;

    let order: Vec<_> = dispatch
        .launch_order()
        .iter()
        .map(|d| d.kernel_name.as_str())
        .collect();
    assert_eq!(
        order,
        [
            "cl.group_norm_sumsqr_F32_2D",
            "cl.group_norm_meanvari",
            "cl.group_norm_F32toF32_2D",
        ]
    );
    assert!(dispatch.launch_order().iter().all(|d| d.kernel_id.get() == 7));
    Ok(())
}

#[test]
fn test_unary_family_by_name() -> Result<()> {
    let family: OperatorFamily = "hard_sigmoid".parse().map_err(anyhow::Error::msg)?;
    assert_eq!(family, OperatorFamily::EltwiseUnary(UnaryOp::HardSigmoid));

    let req = ResolveRequest::new(family)
        .input(TensorDesc::new(ElementKind::F16, [10, 4, 2]))
        .output(TensorDesc::new(ElementKind::F16, [10, 4, 2]));
    let dispatch = resolver().resolve(&req)?;
    assert_eq!(dispatch.kernel_name, "cl.hard_sigmoid_F32toF32_2D");
    assert_eq!(dispatch.scalar_params.f32("alpha"), Some(1.0));
    Ok(())
}

#[test]
fn test_request_and_dispatch_serialize() -> Result<()> {
    let req = erf_u8(&[16, 16]).float_param("unused", 0.5);
    let json = serde_json::to_string(&req)?;
    let back: ResolveRequest = serde_json::from_str(&json)?;
    assert_eq!(back, req);

    let dispatch = resolver().resolve(&back)?;
    let value: serde_json::Value = serde_json::from_str(&dispatch.to_json()?)?;
    assert_eq!(value["kernel_name"], "cl.erf_U8toU8_2D");
    assert_eq!(value["work_size"]["dim"], 2);
    assert_eq!(value["scalar_params"][1]["name"], "inputTail");
    Ok(())
}
