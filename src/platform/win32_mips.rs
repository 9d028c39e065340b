//! Windows CE on MIPS ("winMips").

use tracing::{debug, trace};

use crate::arch::mips::MipsArchitecture;
use crate::arch::{ProcessorArchitecture, RewriterHost};
use crate::core::disassembler::DisassemblerResult;
use crate::core::expression::{DataType, Operator};
use crate::core::image::ImageReader;
use crate::core::pattern::{match_sequence, DataTypePattern, ExpressionPattern as Ep, RtlPattern};
use crate::core::procedure::ExternalProcedure;
use crate::core::register::RegisterSet;
use crate::core::rtl::{RtlClass, RtlInstruction, RtlInstructionCluster};
use crate::error::Result;
use crate::platform::{find_by_ordinal, Platform, ProcedureLookup, TypeLibraryCache};
use crate::typelib::config::Services;
use crate::typelib::loader::LoaderRegistry;

const TRAMPOLINE_LENGTH: usize = 3;

/// The sequence
///
/// ```text
/// lui rX,hiword
/// lw  rY,loword(rX)
/// jr  rY
/// ```
///
/// as RTL.
fn trampoline_pattern() -> Vec<RtlPattern> {
    vec![
        RtlPattern::assign(Ep::any_id("r0d"), Ep::any_constant("hi")),
        RtlPattern::assign(
            Ep::any_id("r1d"),
            Ep::mem(
                Ep::binary(
                    Operator::IAdd,
                    DataTypePattern::Any,
                    Ep::any_id("r1s"),
                    Ep::any_constant("lo"),
                ),
                DataTypePattern::Exact(DataType::Word32),
            ),
        ),
        RtlPattern::goto(Ep::any_id("r2s"), RtlClass::TRANSFER | RtlClass::DELAY),
    ]
}

pub struct Win32MipsPlatform {
    arch: MipsArchitecture,
    services: Services,
    loaders: LoaderRegistry,
    type_libs: TypeLibraryCache,
    implicit_args: RegisterSet,
    trampoline: Vec<RtlPattern>,
}

impl Win32MipsPlatform {
    pub fn new(arch: MipsArchitecture, services: Services) -> Self {
        let mut implicit_args = arch.create_register_bitset();
        for name in ["r28", "sp"] {
            if let Some(r) = arch.get_register(name) {
                implicit_args.insert(r.number);
            }
        }
        Self {
            arch,
            services,
            loaders: LoaderRegistry::new(),
            type_libs: TypeLibraryCache::new(),
            implicit_args,
            trampoline: trampoline_pattern(),
        }
    }

    /// Replace the metadata loader factories.
    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn type_libraries_loaded(&self) -> bool {
        self.type_libs.is_loaded()
    }
}

impl Platform for Win32MipsPlatform {
    fn platform_identifier(&self) -> &str {
        "winMips"
    }

    fn architecture(&self) -> &dyn ProcessorArchitecture {
        &self.arch
    }

    fn default_calling_convention(&self) -> &str {
        ""
    }

    fn create_implicit_argument_registers(&self) -> RegisterSet {
        self.implicit_args.clone()
    }

    fn get_trampoline_destination<'a>(
        &self,
        rdr: ImageReader<'a>,
        host: &'a dyn RewriterHost,
    ) -> Option<ExternalProcedure> {
        let start = rdr.address();
        let rtls: DisassemblerResult<Vec<RtlInstructionCluster>> = self
            .arch
            .create_rewriter(
                rdr,
                self.arch.create_processor_state(),
                self.arch.create_frame(),
                host,
            )
            .take(TRAMPOLINE_LENGTH)
            .collect();
        let rtls = match rtls {
            Ok(rtls) => rtls,
            Err(e) => {
                trace!(address = %start, error = %e, "not a trampoline: undecodable");
                return None;
            }
        };
        if rtls.len() < TRAMPOLINE_LENGTH {
            trace!(address = %start, clusters = rtls.len(), "not a trampoline: too short");
            return None;
        }
        let instrs: Vec<RtlInstruction> = rtls
            .iter()
            .flat_map(|c| c.instructions.iter().cloned())
            .collect();
        let caps = match_sequence(&self.trampoline, &instrs)?;
        if caps.get("r0d") != caps.get("r1s") || caps.get("r1d") != caps.get("r2s") {
            trace!(address = %start, "not a trampoline: registers differ");
            return None;
        }
        let (hi, lo) = (caps.constant("hi")?, caps.constant("lo")?);
        let target = self
            .arch
            .make_address_from_constant(&Operator::IAdd.apply_constants(hi, lo));
        let proc = host
            .get_imported_procedure(target, rtls[2].address)
            .or_else(|| host.get_intercepted_call(target));
        match &proc {
            Some(p) => debug!(address = %start, target = %target, procedure = %p.name, "trampoline"),
            None => trace!(address = %start, target = %target, "not a trampoline: unresolved target"),
        }
        proc
    }

    fn lookup_procedure_by_ordinal(&self, module_name: &str, ordinal: i32) -> Result<ProcedureLookup> {
        let libs = self
            .type_libs
            .ensure(self.platform_identifier(), &self.services, &self.loaders, self)?;
        let Some(svc) = find_by_ordinal(libs, module_name, ordinal) else {
            return Ok(ProcedureLookup::NotFound);
        };
        // Return addresses are never passed on the stack on this platform,
        // whatever the library declared.
        let signature = svc.signature.clone().map(|mut sig| {
            sig.return_address_on_stack = 0;
            sig
        });
        Ok(ProcedureLookup::Found(ExternalProcedure::new(svc.name.clone(), signature)))
    }

    fn lookup_procedure_by_name(&self, _module_name: &str, _proc_name: &str) -> Result<ProcedureLookup> {
        Ok(ProcedureLookup::NotSupported)
    }
}
