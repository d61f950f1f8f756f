//! Kernel variant resolution
//!
//! [`KernelVariantResolver::resolve`] is the single entry point: it checks the
//! request, lets the operator family normalize kinds and shapes into key
//! fields, finds the exact table entry and asks the family for the launch
//! scalars and work size. The resolver holds no mutable state, so one instance
//! can be shared across threads.

use vx_core::config::{Config, ConfigError};

use crate::config::ResolverConfig;
use crate::dispatch::ResolvedDispatch;
use crate::error::ResolveError;
use crate::families::col2im::Col2Im;
use crate::families::crop_and_resize::CropAndResize;
use crate::families::eltwise_unary::EltwiseUnary;
use crate::families::erf::Erf;
use crate::families::grid_sample::BilinearGridSample;
use crate::families::group_norm::GroupNorm;
use crate::families::layer_norm::LayerNorm;
use crate::families::moments::Moments;
use crate::families::sequence_mask::SequenceMask;
use crate::families::slice::Slice;
use crate::families::tile::Tile;
use crate::families::{KernelFamily, OperatorFamily};
use crate::request::ResolveRequest;
use crate::table::VariantTable;

/// Maps operator requests onto precompiled kernel variants.
#[derive(Debug, Clone, Default)]
pub struct KernelVariantResolver {
    config: ResolverConfig,
}

impl KernelVariantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with validated configuration.
    pub fn with_config(config: ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve one request into a launch descriptor.
    ///
    /// The result depends only on the request and the configuration; calling
    /// this twice with the same request yields equal dispatches.
    pub fn resolve(&self, req: &ResolveRequest) -> Result<ResolvedDispatch, ResolveError> {
        if self.config.is_disabled(&req.family) {
            return Err(ResolveError::unsupported(
                req.family.name(),
                "family disabled by configuration",
            ));
        }

        match req.family {
            OperatorFamily::Erf => self.run(&Erf, req),
            OperatorFamily::Tile => self.run(&Tile, req),
            OperatorFamily::Moments => self.run(&Moments, req),
            OperatorFamily::Slice => self.run(&Slice, req),
            OperatorFamily::LayerNorm => self.run(&LayerNorm, req),
            OperatorFamily::GroupNorm => self.run(&GroupNorm, req),
            OperatorFamily::EltwiseUnary(op) => self.run(&EltwiseUnary(op), req),
            OperatorFamily::CropAndResize => self.run(&CropAndResize, req),
            OperatorFamily::BilinearGridSample => self.run(&BilinearGridSample, req),
            OperatorFamily::SequenceMask => self.run(&SequenceMask, req),
            OperatorFamily::Col2Im => self.run(&Col2Im, req),
        }
    }

    /// The static table searched for `family`.
    pub fn variant_table(
        &self,
        family: OperatorFamily,
    ) -> Result<&'static VariantTable, ResolveError> {
        match family {
            OperatorFamily::Erf => Erf.table(),
            OperatorFamily::Tile => Tile.table(),
            OperatorFamily::Moments => Moments.table(),
            OperatorFamily::Slice => Slice.table(),
            OperatorFamily::LayerNorm => LayerNorm.table(),
            OperatorFamily::GroupNorm => GroupNorm.table(),
            OperatorFamily::EltwiseUnary(op) => EltwiseUnary(op).table(),
            OperatorFamily::CropAndResize => CropAndResize.table(),
            OperatorFamily::BilinearGridSample => BilinearGridSample.table(),
            OperatorFamily::SequenceMask => SequenceMask.table(),
            OperatorFamily::Col2Im => Col2Im.table(),
        }
    }

    fn run<F: KernelFamily>(
        &self,
        family: &F,
        req: &ResolveRequest,
    ) -> Result<ResolvedDispatch, ResolveError> {
        if req.inputs.len() != F::INPUTS || req.outputs.len() != F::OUTPUTS {
            return Err(ResolveError::Arity {
                family: F::NAME,
                expected_inputs: F::INPUTS,
                expected_outputs: F::OUTPUTS,
                inputs: req.inputs.len(),
                outputs: req.outputs.len(),
            });
        }
        for (tensor, desc) in req.tensors() {
            desc.quant
                .validate(desc.kind)
                .map_err(|source| ResolveError::MalformedQuantization { tensor, source })?;
        }

        let planned = family.plan(req, &self.config)?;
        let table = family.table()?;
        let layout = table.layout();
        let key = layout
            .pack(&planned.fields)
            .map_err(|e| ResolveError::unsupported(F::NAME, e.to_string()))?;

        let Some(entry) = table.lookup(key) else {
            let detail = layout.describe(&planned.fields);
            log::debug!("no {} variant for {} (key {})", req.family, detail, key);
            return Err(ResolveError::unsupported(F::NAME, detail));
        };

        let launch = family.launch(req, planned.plan, &self.config)?;
        log::debug!(
            "resolved {} {} -> {} (key {})",
            req.family,
            req.kernel_id,
            entry.kernel_name,
            key
        );

        Ok(ResolvedDispatch {
            kernel_id: req.kernel_id,
            kernel_name: entry.kernel_name.clone(),
            source_modules: entry.source_modules(),
            scalar_params: launch.scalars,
            work_size: launch.work_size,
            prerequisites: launch.prerequisites,
        })
    }
}
