//! # vx-core
//!
//! Shared foundation for the VX kernel selection layer.
//!
//! ## Components
//!
//! - **Errors**: [`VxError`] and [`CoreError`], the error model every crate converts into
//! - **Configuration**: the [`config::Config`] trait and [`config::ConfigBuilder`]
//! - **Logging**: [`logging::init_logging`] on top of `env_logger`
//! - **Kernel identity**: [`KernelId`] and the per-graph [`KernelIdAllocator`]
//!
//! ## Example
//!
//! ```rust
//! use vx_core::KernelIdAllocator;
//!
//! let mut ids = KernelIdAllocator::new();
//! let first = ids.allocate();
//! let second = ids.allocate();
//! assert_ne!(first, second);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod logging;

pub use error::{CoreError, ErrorContext, ErrorLogger, VxError, VxResult};

// ============================================================================
// Kernel identity
// ============================================================================

/// Identifier of one kernel instance inside a graph.
///
/// Ids are handed out by the graph that owns the kernel; there is no
/// process-wide counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct KernelId(pub u32);

impl KernelId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel#{}", self.0)
    }
}

impl From<u32> for KernelId {
    fn from(id: u32) -> Self {
        KernelId(id)
    }
}

/// Hands out [`KernelId`]s for a single graph or compile context.
///
/// Each graph owns its allocator, so two graphs compiling concurrently never
/// share state.
#[derive(Debug, Clone, Default)]
pub struct KernelIdAllocator {
    next: u32,
}

impl KernelIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first`, e.g. when a graph is deserialized with
    /// kernels already registered.
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Register a new kernel and return its id.
    ///
    /// Wraps around after `u32::MAX` registrations.
    pub fn allocate(&mut self) -> KernelId {
        let id = KernelId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }

    /// The id the next [`allocate`](Self::allocate) call returns.
    pub fn peek(&self) -> KernelId {
        KernelId(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_sequential() {
        let mut ids = KernelIdAllocator::new();
        assert_eq!(ids.allocate(), KernelId(0));
        assert_eq!(ids.allocate(), KernelId(1));
        assert_eq!(ids.peek(), KernelId(2));
    }

    #[test]
    fn test_allocators_are_independent() {
        let mut graph_a = KernelIdAllocator::new();
        let mut graph_b = KernelIdAllocator::starting_at(100);

        assert_eq!(graph_a.allocate(), KernelId(0));
        assert_eq!(graph_b.allocate(), KernelId(100));
        assert_eq!(graph_a.allocate(), KernelId(1));
    }

    #[test]
    fn test_kernel_id_display() {
        assert_eq!(KernelId(7).to_string(), "kernel#7");
    }
}
