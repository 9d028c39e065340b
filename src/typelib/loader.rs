//! Metadata loaders and the factory registry that selects them by type name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::trace;

use crate::platform::Platform;
use crate::typelib::config::Services;
use crate::typelib::{SystemService, TypeLibrary, TypeLibraryError};

/// Reads one type library file.
pub trait MetadataLoader {
    /// Build the library. Signatures without a calling convention get the
    /// platform's default one.
    fn load(&self, platform: &dyn Platform) -> Result<TypeLibrary, TypeLibraryError>;
}

/// Constructs a loader from (services, file name, raw bytes).
pub type LoaderFactory = fn(&Services, &Path, Vec<u8>) -> Box<dyn MetadataLoader>;

/// Loader factories keyed by the type name used in configuration.
#[derive(Clone)]
pub struct LoaderRegistry {
    factories: HashMap<String, LoaderFactory>,
}

impl LoaderRegistry {
    /// A registry with no loaders.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in `json` and `def` loaders.
    pub fn new() -> Self {
        let mut r = Self::empty();
        r.register("json", JsonTypeLibraryLoader::create);
        r.register("def", ModuleDefinitionLoader::create);
        r
    }

    pub fn register(&mut self, type_name: impl Into<String>, factory: LoaderFactory) {
        self.factories.insert(type_name.into(), factory);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn create(
        &self,
        type_name: &str,
        services: &Services,
        path: &Path,
        bytes: Vec<u8>,
    ) -> Result<Box<dyn MetadataLoader>, TypeLibraryError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| TypeLibraryError::UnknownLoaderType(type_name.to_string()))?;
        Ok(factory(services, path, bytes))
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn with_default_convention(mut svc: SystemService, platform: &dyn Platform) -> SystemService {
    if let Some(sig) = svc.signature.as_mut() {
        if sig.calling_convention.is_none() {
            sig.calling_convention = Some(platform.default_calling_convention().to_string());
        }
    }
    svc
}

#[derive(Debug, Deserialize)]
struct TypeLibraryDocument {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    services: Vec<SystemService>,
}

/// Loads a JSON document:
/// `{ "module": "KERNEL32", "services": [ { "name", "ordinal", "signature" } ] }`.
/// The module name defaults to the file stem.
pub struct JsonTypeLibraryLoader {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl JsonTypeLibraryLoader {
    pub fn new(path: &Path, bytes: Vec<u8>) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes,
        }
    }

    fn create(_services: &Services, path: &Path, bytes: Vec<u8>) -> Box<dyn MetadataLoader> {
        Box::new(Self::new(path, bytes))
    }
}

impl MetadataLoader for JsonTypeLibraryLoader {
    fn load(&self, platform: &dyn Platform) -> Result<TypeLibrary, TypeLibraryError> {
        let doc: TypeLibraryDocument = serde_json::from_slice(&self.bytes)?;
        let mut tl = TypeLibrary::new(doc.module.unwrap_or_else(|| file_stem(&self.path)));
        for svc in doc.services {
            tl.add_service(with_default_convention(svc, platform));
        }
        trace!(path = %self.path.display(), module = %tl.module_name, services = tl.len(), "loaded JSON type library");
        Ok(tl)
    }
}

/// Loads a module-definition (`.def`) file:
///
/// ```text
/// ; comment
/// LIBRARY KERNEL32
/// EXPORTS
///     ExitProcess @17
///     GetTickCount
/// ```
///
/// Entries carry no signatures.
pub struct ModuleDefinitionLoader {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ModuleDefinitionLoader {
    pub fn new(path: &Path, bytes: Vec<u8>) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes,
        }
    }

    fn create(_services: &Services, path: &Path, bytes: Vec<u8>) -> Box<dyn MetadataLoader> {
        Box::new(Self::new(path, bytes))
    }

    fn error(&self, line: usize, message: impl Into<String>) -> TypeLibraryError {
        TypeLibraryError::Parse {
            path: self.path.clone(),
            line,
            message: message.into(),
        }
    }

    fn parse_export(&self, line_no: usize, line: &str) -> Result<SystemService, TypeLibraryError> {
        let mut tokens = line.split_whitespace();
        let first = tokens.next().ok_or_else(|| self.error(line_no, "empty export"))?;
        // `external=internal` exports under the external name.
        let name = first.split('=').next().unwrap_or(first);
        let mut ordinal = None;
        for tok in tokens {
            if let Some(n) = tok.strip_prefix('@') {
                let n = n
                    .parse::<i32>()
                    .map_err(|_| self.error(line_no, format!("bad ordinal '{}'", tok)))?;
                ordinal = Some(n);
            }
        }
        Ok(SystemService {
            name: name.to_string(),
            ordinal,
            signature: None,
        })
    }
}

impl MetadataLoader for ModuleDefinitionLoader {
    fn load(&self, _platform: &dyn Platform) -> Result<TypeLibrary, TypeLibraryError> {
        let text = std::str::from_utf8(&self.bytes).map_err(|e| self.error(0, e.to_string()))?;
        let mut module = None;
        let mut services = Vec::new();
        let mut in_exports = false;
        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let keyword = line.split_whitespace().next().unwrap_or("");
            if keyword.eq_ignore_ascii_case("LIBRARY") {
                let name = line[keyword.len()..].trim().trim_matches('"');
                if name.is_empty() {
                    return Err(self.error(line_no, "LIBRARY without a name"));
                }
                module = Some(name.to_string());
                in_exports = false;
            } else if keyword.eq_ignore_ascii_case("EXPORTS") {
                in_exports = true;
            } else if in_exports {
                services.push(self.parse_export(line_no, line)?);
            }
        }
        let mut tl = TypeLibrary::new(module.unwrap_or_else(|| file_stem(&self.path)));
        for svc in services {
            tl.add_service(svc);
        }
        trace!(path = %self.path.display(), module = %tl.module_name, services = tl.len(), "loaded module definition");
        Ok(tl)
    }
}
