//! External procedures and their signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One formal parameter of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Signature of an external procedure as described by a type library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureSignature {
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
    /// Bytes of return address the call leaves on the stack.
    pub return_address_on_stack: u32,
    /// Net stack adjustment performed by the callee.
    pub stack_delta: i32,
    pub calling_convention: Option<String>,
}

/// A procedure that lives outside the image being decompiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProcedure {
    pub name: String,
    pub signature: Option<ProcedureSignature>,
}

impl ExternalProcedure {
    pub fn new(name: impl Into<String>, signature: Option<ProcedureSignature>) -> Self {
        Self {
            name: name.into(),
            signature,
        }
    }
}

impl fmt::Display for ExternalProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(sig) = &self.signature {
            write!(f, "(")?;
            for (i, p) in sig.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", p.type_name, p.name)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
