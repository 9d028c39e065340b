//! Common test utilities and helpers.
//!
//! Image builders, a scripted rewriter host and on-disk type library
//! fixtures shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rtlift::arch::RewriterHost;
use rtlift::core::address::Address;
use rtlift::core::image::{Endianness, LoadedImage};
use rtlift::core::procedure::ExternalProcedure;
use rtlift::typelib::config::{JsonConfiguration, Services};

/// A MIPS image holding `words` at `base` in the given byte order.
pub fn mips_image(base: u32, words: &[u32], endianness: Endianness) -> LoadedImage {
    let bytes = words
        .iter()
        .flat_map(|w| match endianness {
            Endianness::Little => w.to_le_bytes(),
            Endianness::Big => w.to_be_bytes(),
        })
        .collect();
    LoadedImage::new(Address::ptr32(base), bytes)
}

/// Host that answers from fixed tables and records every import query.
#[derive(Default)]
pub struct ScriptedHost {
    imports: HashMap<Address, ExternalProcedure>,
    intercepts: HashMap<Address, ExternalProcedure>,
    pub import_queries: RefCell<Vec<(Address, Address)>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import(mut self, addr: u32, name: &str) -> Self {
        self.imports
            .insert(Address::ptr32(addr), ExternalProcedure::new(name, None));
        self
    }

    pub fn with_intercept(mut self, addr: u32, name: &str) -> Self {
        self.intercepts
            .insert(Address::ptr32(addr), ExternalProcedure::new(name, None));
        self
    }
}

impl RewriterHost for ScriptedHost {
    fn get_imported_procedure(&self, target: Address, continuation: Address) -> Option<ExternalProcedure> {
        self.import_queries.borrow_mut().push((target, continuation));
        self.imports.get(&target).cloned()
    }

    fn get_intercepted_call(&self, target: Address) -> Option<ExternalProcedure> {
        self.intercepts.get(&target).cloned()
    }
}

/// Write `files` into `dir` and a configuration declaring `libs` (file name,
/// loader label) for `env`. Both `json` and `def` loader labels are known.
pub fn write_environment(
    dir: &Path,
    env: &str,
    libs: &[(&str, &str)],
    files: &[(&str, &str)],
) -> Services {
    for (name, content) in files {
        fs::write(dir.join(name), content).expect("write fixture");
    }
    let type_libraries: Vec<_> = libs
        .iter()
        .map(|(name, loader)| serde_json::json!({ "name": name, "loader": loader }))
        .collect();
    let doc = serde_json::json!({
        "environments": [ { "name": env, "type_libraries": type_libraries } ],
        "loaders": [
            { "label": "json", "type_name": "json" },
            { "label": "def", "type_name": "def" }
        ]
    });
    let cfg_path = dir.join("rtlift.json");
    fs::write(&cfg_path, doc.to_string()).expect("write config");
    Services::new(JsonConfiguration::from_file(&cfg_path).expect("parse config"))
}
