//! Platforms: an architecture paired with an operating environment.
//!
//! A platform supplies calling-convention facts and resolves references to
//! procedures outside the image, either through trampoline recognition or
//! through the type libraries declared for its environment.

pub mod default;
pub mod win32_mips;

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::arch::{ProcessorArchitecture, RewriterHost};
use crate::core::address::Address;
use crate::core::image::ImageReader;
use crate::core::procedure::ExternalProcedure;
use crate::core::register::RegisterSet;
use crate::error::Result;
use crate::typelib::config::Services;
use crate::typelib::loader::LoaderRegistry;
use crate::typelib::registry::load_type_libraries;
use crate::typelib::{SystemService, TypeLibrary};

pub use default::DefaultPlatform;
pub use win32_mips::Win32MipsPlatform;

/// Outcome of resolving an external procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureLookup {
    Found(ExternalProcedure),
    /// The lookup ran and nothing matched.
    NotFound,
    /// This platform does not implement this kind of lookup.
    NotSupported,
}

impl ProcedureLookup {
    pub fn found(self) -> Option<ExternalProcedure> {
        match self {
            ProcedureLookup::Found(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, ProcedureLookup::NotSupported)
    }
}

impl From<Option<ExternalProcedure>> for ProcedureLookup {
    fn from(p: Option<ExternalProcedure>) -> Self {
        p.map_or(ProcedureLookup::NotFound, ProcedureLookup::Found)
    }
}

pub trait Platform {
    /// Environment name used to find this platform's type libraries.
    fn platform_identifier(&self) -> &str;

    fn architecture(&self) -> &dyn ProcessorArchitecture;

    /// Label of the calling convention signatures default to.
    fn default_calling_convention(&self) -> &str;

    /// Registers live-in to every procedure.
    fn create_implicit_argument_registers(&self) -> RegisterSet;

    /// Correct a raw procedure address for architecture or OS quirks.
    fn adjust_procedure_address(&self, addr: Address) -> Address {
        addr
    }

    /// If the code under `rdr` is a trampoline, the procedure it reaches.
    fn get_trampoline_destination<'a>(
        &self,
        rdr: ImageReader<'a>,
        host: &'a dyn RewriterHost,
    ) -> Option<ExternalProcedure>;

    fn lookup_procedure_by_ordinal(&self, module_name: &str, ordinal: i32) -> Result<ProcedureLookup>;

    fn lookup_procedure_by_name(&self, module_name: &str, proc_name: &str) -> Result<ProcedureLookup>;
}

/// Type libraries loaded on first use and kept for the platform's lifetime.
/// A failed load leaves the cache empty.
#[derive(Debug, Default)]
pub struct TypeLibraryCache {
    libs: OnceCell<Vec<TypeLibrary>>,
}

impl TypeLibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.libs.get().is_some()
    }

    pub fn ensure(
        &self,
        env_name: &str,
        services: &Services,
        loaders: &LoaderRegistry,
        platform: &dyn Platform,
    ) -> Result<&[TypeLibrary]> {
        let libs = self.libs.get_or_try_init(|| {
            debug!(env = env_name, "loading type libraries");
            load_type_libraries(env_name, services, loaders, platform)
        })?;
        Ok(libs)
    }
}

/// The first library, in load order, for `module_name` that has `ordinal`.
pub fn find_by_ordinal<'l>(
    libs: &'l [TypeLibrary],
    module_name: &str,
    ordinal: i32,
) -> Option<&'l SystemService> {
    libs.iter()
        .filter(|tl| tl.is_module(module_name))
        .find_map(|tl| tl.lookup_ordinal(ordinal))
}

/// The first library, in load order, for `module_name` that exports `name`.
pub fn find_by_name<'l>(
    libs: &'l [TypeLibrary],
    module_name: &str,
    name: &str,
) -> Option<&'l SystemService> {
    libs.iter()
        .filter(|tl| tl.is_module(module_name))
        .find_map(|tl| tl.lookup_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tl(module: &str, services: &[(&str, i32)]) -> TypeLibrary {
        let mut tl = TypeLibrary::new(module);
        for (name, ord) in services {
            tl.add_service(SystemService {
                name: name.to_string(),
                ordinal: Some(*ord),
                signature: None,
            });
        }
        tl
    }

    #[test]
    fn first_library_wins() {
        let libs = vec![
            tl("USER32", &[("MessageBoxA", 17)]),
            tl("kernel32", &[("ExitProcess", 17)]),
            tl("KERNEL32", &[("Other", 17), ("Sleep", 18)]),
        ];
        assert_eq!(find_by_ordinal(&libs, "KERNEL32", 17).unwrap().name, "ExitProcess");
        assert_eq!(find_by_ordinal(&libs, "Kernel32", 18).unwrap().name, "Sleep");
        assert!(find_by_ordinal(&libs, "KERNEL32", 19).is_none());
        assert_eq!(find_by_name(&libs, "KERNEL32", "Other").unwrap().ordinal, Some(17));
    }

    #[test]
    fn lookup_from_option() {
        assert_eq!(ProcedureLookup::from(None), ProcedureLookup::NotFound);
        let p = ExternalProcedure::new("f", None);
        assert_eq!(ProcedureLookup::from(Some(p.clone())).found(), Some(p));
        assert!(ProcedureLookup::NotSupported.is_not_supported());
    }
}
