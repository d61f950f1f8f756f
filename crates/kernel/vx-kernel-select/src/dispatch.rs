//! Resolved dispatch descriptors handed back to the graph compiler.

use std::fmt;

use serde::Serialize;
use vx_core::KernelId;

use crate::key::utils::align_up;

/// Value of one kernel scalar argument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ScalarValue {
    F32(f32),
    I32(i32),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::F32(v) => write!(f, "{}f", v),
            ScalarValue::I32(v) => write!(f, "{}", v),
        }
    }
}

/// Named scalar argument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalarParam {
    pub name: &'static str,
    pub value: ScalarValue,
}

/// Scalar arguments in kernel parameter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScalarParams(Vec<ScalarParam>);

impl ScalarParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_f32(&mut self, name: &'static str, value: f32) -> &mut Self {
        self.0.push(ScalarParam {
            name,
            value: ScalarValue::F32(value),
        });
        self
    }

    pub fn push_i32(&mut self, name: &'static str, value: i32) -> &mut Self {
        self.0.push(ScalarParam {
            name,
            value: ScalarValue::I32(value),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<ScalarValue> {
        self.0.iter().find(|p| p.name == name).map(|p| p.value)
    }

    pub fn f32(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            ScalarValue::F32(v) => Some(v),
            ScalarValue::I32(_) => None,
        }
    }

    pub fn i32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            ScalarValue::I32(v) => Some(v),
            ScalarValue::F32(_) => None,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|p| p.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScalarParam> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Launch geometry, at most three dimensions.
///
/// A `local_size` of zero leaves the work-group size to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkSize {
    pub dim: u32,
    pub global_scale: [usize; 3],
    pub global_size: [usize; 3],
    pub local_size: [usize; 3],
}

impl WorkSize {
    /// `dim` is clamped to `1..=3`; every scale starts at 1.
    pub fn new(dim: u32) -> Self {
        Self {
            dim: dim.clamp(1, 3),
            global_scale: [1, 1, 1],
            global_size: [0, 0, 0],
            local_size: [0, 0, 0],
        }
    }

    pub fn with_global_size(mut self, size: [usize; 3]) -> Self {
        self.global_size = size;
        self
    }

    pub fn with_local_size(mut self, size: [usize; 3]) -> Self {
        self.local_size = size;
        self
    }

    pub fn with_global_scale(mut self, scale: [usize; 3]) -> Self {
        self.global_scale = scale;
        self
    }

    /// `align_up(ceil(n / per_thread), alignment)`.
    pub fn aligned_extent(n: usize, per_thread: usize, alignment: usize) -> usize {
        align_up(n.div_ceil(per_thread.max(1)), alignment)
    }
}

/// Everything the device layer needs to launch one kernel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDispatch {
    pub kernel_id: KernelId,
    pub kernel_name: String,
    pub source_modules: Vec<String>,
    pub scalar_params: ScalarParams,
    pub work_size: WorkSize,
    /// Dispatches that must run before this one, in order.
    pub prerequisites: Vec<ResolvedDispatch>,
}

impl ResolvedDispatch {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Prerequisites followed by this dispatch, in launch order.
    pub fn launch_order(&self) -> Vec<&ResolvedDispatch> {
        let mut order: Vec<&ResolvedDispatch> = self
            .prerequisites
            .iter()
            .flat_map(|p| p.launch_order())
            .collect();
        order.push(self);
        order
    }
}
