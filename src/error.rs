//! Crate-level error type.
//!
//! Each layer has its own error enum; `RtliftError` wraps them so callers of
//! the platform and session APIs can use one `Result` type.

use thiserror::Error;

use crate::core::address::AddressError;
use crate::core::disassembler::DisassemblerError;
use crate::core::image::ImageError;
use crate::typelib::TypeLibraryError;

#[derive(Debug, Error)]
pub enum RtliftError {
    /// Address construction errors
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// Image reads outside the loaded bytes
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Decoding failures
    #[error("Disassembly error: {0}")]
    Disassembler(#[from] DisassemblerError),

    /// Configuration and type library loading errors
    #[error("Type library error: {0}")]
    TypeLibrary(#[from] TypeLibraryError),
}

/// Result type alias for rtlift operations
pub type Result<T> = std::result::Result<T, RtliftError>;
