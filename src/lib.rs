//! Retargetable decompiler core: instruction decoding, RTL rewriting,
//! expression pattern matching and platform-level resolution of external
//! procedures.

/// Architecture-neutral data types
pub mod core;

/// Processor architectures
pub mod arch;

/// Operating environments
pub mod platform;

/// Type library configuration, loaders and registry
pub mod typelib;

pub mod error;
pub mod logging;

pub use crate::error::{Result, RtliftError};
