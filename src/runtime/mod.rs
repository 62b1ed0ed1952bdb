//! Runtime support for reactive state.
//!
//! This module provides the infrastructure for dependency tracking,
//! observer registration, and execution contexts.

mod context;

pub use context::{Path, ReactiveRuntime};
