//! Type libraries: per-module metadata describing external services.
//!
//! A platform loads the libraries declared for its environment once, through
//! [`registry::load_type_libraries`], and resolves imports against them by
//! ordinal or by name.

pub mod config;
pub mod loader;
pub mod registry;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::procedure::ProcedureSignature;

/// Errors raised while reading configuration or loading type libraries.
#[derive(Debug, Error)]
pub enum TypeLibraryError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed text metadata.
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The configuration names a loader type nothing is registered for.
    #[error("unknown metadata loader type: {0}")]
    UnknownLoaderType(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
}

/// One exported service of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemService {
    pub name: String,
    #[serde(default)]
    pub ordinal: Option<i32>,
    #[serde(default)]
    pub signature: Option<ProcedureSignature>,
}

/// The services one module exports, indexed by ordinal and by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeLibrary {
    pub module_name: String,
    services_by_ordinal: BTreeMap<i32, SystemService>,
    services_by_name: BTreeMap<String, SystemService>,
}

impl TypeLibrary {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Default::default()
        }
    }

    /// Add a service. A later service with the same ordinal or name replaces
    /// the earlier one.
    pub fn add_service(&mut self, service: SystemService) {
        if let Some(ordinal) = service.ordinal {
            self.services_by_ordinal.insert(ordinal, service.clone());
        }
        self.services_by_name.insert(service.name.clone(), service);
    }

    pub fn lookup_ordinal(&self, ordinal: i32) -> Option<&SystemService> {
        self.services_by_ordinal.get(&ordinal)
    }

    pub fn lookup_name(&self, name: &str) -> Option<&SystemService> {
        self.services_by_name.get(name)
    }

    /// Module names compare case-insensitively.
    pub fn is_module(&self, name: &str) -> bool {
        self.module_name.eq_ignore_ascii_case(name)
    }

    pub fn len(&self) -> usize {
        self.services_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services_by_name.is_empty()
    }
}
