//! # vx-kernel-select
//!
//! Maps a tensor operator request onto one of the precompiled OpenCL kernel
//! variants and computes the scalar arguments and work size for launching it.
//!
//! ## Components
//!
//! - **Keys**: [`VariantKey`] packs per-family fields (element kinds, flags,
//!   modes) into one integer through a [`key::KeyLayout`]
//! - **Tables**: one static [`table::VariantTable`] per family, built from
//!   plain rows on first use
//! - **Families**: [`OperatorFamily`] selects normalization, key fields,
//!   scalars and work size for erf, tile, moments, slice, layer and group
//!   normalization, element-wise unary ops, crop-and-resize, bilinear grid
//!   sampling, sequence mask and col2im
//! - **Resolution**: [`KernelVariantResolver::resolve`] returns a
//!   [`ResolvedDispatch`] or a [`ResolveError`]
//!
//! ## Example
//!
//! ```rust
//! use vx_kernel_select::{
//!     ElementKind, KernelVariantResolver, OperatorFamily, ResolveRequest, TensorDesc,
//! };
//!
//! let resolver = KernelVariantResolver::new();
//! let req = ResolveRequest::new(OperatorFamily::Erf)
//!     .input(TensorDesc::new(ElementKind::U8, [8, 8]).with_affine(0.5, 10))
//!     .output(TensorDesc::new(ElementKind::U8, [8, 8]).with_affine(0.25, 85));
//!
//! let dispatch = resolver.resolve(&req).unwrap();
//! assert_eq!(dispatch.kernel_name, "cl.erf_U8toU8_2D");
//! assert_eq!(dispatch.scalar_params.f32("outputScale"), Some(4.0));
//! ```

pub mod config;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod families;
pub mod key;
pub mod quant;
pub mod request;
pub mod resolver;
pub mod shape;
pub mod table;

pub use config::ResolverConfig;
pub use dispatch::{ResolvedDispatch, ScalarParam, ScalarParams, ScalarValue, WorkSize};
pub use dtype::ElementKind;
pub use error::ResolveError;
pub use families::{OperatorFamily, UnaryOp};
pub use key::VariantKey;
pub use quant::{QuantError, QuantKind, QuantParams};
pub use request::{OpParams, ParamValue, ResolveRequest, TensorDesc};
pub use resolver::KernelVariantResolver;
pub use table::{VariantEntry, VariantTable};
pub use vx_core::{KernelId, KernelIdAllocator};
