//! A platform for environments without special conventions.

use tracing::trace;

use crate::arch::{ProcessorArchitecture, RewriterHost};
use crate::core::image::ImageReader;
use crate::core::procedure::ExternalProcedure;
use crate::core::register::RegisterSet;
use crate::error::Result;
use crate::platform::{find_by_name, find_by_ordinal, Platform, ProcedureLookup, TypeLibraryCache};
use crate::typelib::config::Services;
use crate::typelib::loader::LoaderRegistry;
use crate::typelib::{SystemService, TypeLibrary};

/// Any architecture, with a caller-chosen identifier and calling convention.
/// Recognizes no trampolines; only the stack pointer is an implicit argument.
pub struct DefaultPlatform {
    arch: Box<dyn ProcessorArchitecture>,
    identifier: String,
    calling_convention: String,
    services: Services,
    loaders: LoaderRegistry,
    type_libs: TypeLibraryCache,
}

impl DefaultPlatform {
    pub fn new(
        arch: Box<dyn ProcessorArchitecture>,
        identifier: impl Into<String>,
        calling_convention: impl Into<String>,
        services: Services,
    ) -> Self {
        Self {
            arch,
            identifier: identifier.into(),
            calling_convention: calling_convention.into(),
            services,
            loaders: LoaderRegistry::new(),
            type_libs: TypeLibraryCache::new(),
        }
    }

    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    fn lookup(
        &self,
        module_name: &str,
        find: impl FnOnce(&[TypeLibrary]) -> Option<&SystemService>,
    ) -> Result<ProcedureLookup> {
        let libs = self
            .type_libs
            .ensure(&self.identifier, &self.services, &self.loaders, self)?;
        let proc = find(libs).map(|svc| ExternalProcedure::new(svc.name.clone(), svc.signature.clone()));
        trace!(module = module_name, found = proc.is_some(), "procedure lookup");
        Ok(proc.into())
    }
}

impl Platform for DefaultPlatform {
    fn platform_identifier(&self) -> &str {
        &self.identifier
    }

    fn architecture(&self) -> &dyn ProcessorArchitecture {
        self.arch.as_ref()
    }

    fn default_calling_convention(&self) -> &str {
        &self.calling_convention
    }

    fn create_implicit_argument_registers(&self) -> RegisterSet {
        let mut regs = self.arch.create_register_bitset();
        regs.insert(self.arch.stack_register().number);
        regs
    }

    fn get_trampoline_destination<'a>(
        &self,
        _rdr: ImageReader<'a>,
        _host: &'a dyn RewriterHost,
    ) -> Option<ExternalProcedure> {
        None
    }

    fn lookup_procedure_by_ordinal(&self, module_name: &str, ordinal: i32) -> Result<ProcedureLookup> {
        self.lookup(module_name, |libs| find_by_ordinal(libs, module_name, ordinal))
    }

    fn lookup_procedure_by_name(&self, module_name: &str, proc_name: &str) -> Result<ProcedureLookup> {
        self.lookup(module_name, |libs| find_by_name(libs, module_name, proc_name))
    }
}
