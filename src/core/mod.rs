//! Core data types shared by every architecture.
//!
//! Addresses and the image reader sit at the bottom; expressions, RTL and
//! the pattern matcher build on them.

pub mod address;
pub mod disassembler;
pub mod expression;
pub mod frame;
pub mod image;
pub mod instruction;
pub mod pattern;
pub mod procedure;
pub mod register;
pub mod rtl;
pub mod state;
