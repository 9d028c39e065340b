//! Configuration and file-system services consumed by type library loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::typelib::TypeLibraryError;

/// A type library declared for an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeLibraryElement {
    /// File name, relative to the installation directory unless absolute.
    pub name: String,
    /// Label of the loader that reads this file. Empty means none.
    #[serde(default)]
    pub loader: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentElement {
    pub name: String,
    #[serde(default)]
    pub type_libraries: Vec<TypeLibraryElement>,
}

/// Binds a loader label to the type name of a registered loader factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderElement {
    pub label: String,
    pub type_name: String,
}

/// Source of environment and loader declarations.
pub trait ConfigurationService {
    fn environment(&self, name: &str) -> Option<&EnvironmentElement>;

    fn image_loaders(&self) -> &[LoaderElement];

    fn installation_relative_path(&self, name: &str) -> PathBuf;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    environments: Vec<EnvironmentElement>,
    #[serde(default)]
    loaders: Vec<LoaderElement>,
}

/// Configuration read from a JSON document of the form
/// `{ "environments": [...], "loaders": [...] }`.
#[derive(Debug, Clone)]
pub struct JsonConfiguration {
    environments: BTreeMap<String, EnvironmentElement>,
    loaders: Vec<LoaderElement>,
    installation_dir: PathBuf,
}

impl JsonConfiguration {
    pub fn new(
        environments: Vec<EnvironmentElement>,
        loaders: Vec<LoaderElement>,
        installation_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            environments: environments
                .into_iter()
                .map(|e| (e.name.clone(), e))
                .collect(),
            loaders,
            installation_dir: installation_dir.into(),
        }
    }

    pub fn from_json(text: &str, installation_dir: impl Into<PathBuf>) -> Result<Self, TypeLibraryError> {
        let doc: ConfigDocument = serde_json::from_str(text)?;
        Ok(Self::new(doc.environments, doc.loaders, installation_dir))
    }

    /// Read `path`; its directory becomes the installation directory.
    pub fn from_file(path: &Path) -> Result<Self, TypeLibraryError> {
        let text = std::fs::read_to_string(path).map_err(|source| TypeLibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&text, dir)
    }

    pub fn installation_dir(&self) -> &Path {
        &self.installation_dir
    }
}

impl ConfigurationService for JsonConfiguration {
    fn environment(&self, name: &str) -> Option<&EnvironmentElement> {
        self.environments.get(name)
    }

    fn image_loaders(&self) -> &[LoaderElement] {
        &self.loaders
    }

    fn installation_relative_path(&self, name: &str) -> PathBuf {
        let p = Path::new(name);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.installation_dir.join(p)
        }
    }
}

pub trait FileSystemService {
    fn read_all_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystemService for OsFileSystem {
    fn read_all_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// The services handed to platforms and metadata loaders.
pub struct Services {
    pub config: Box<dyn ConfigurationService>,
    pub fs: Box<dyn FileSystemService>,
}

impl Services {
    pub fn new(config: impl ConfigurationService + 'static) -> Self {
        Self {
            config: Box::new(config),
            fs: Box::new(OsFileSystem),
        }
    }

    pub fn with_file_system(mut self, fs: impl FileSystemService + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "environments": [
            { "name": "winMips", "type_libraries": [
                { "name": "kernel32.json", "loader": "json" },
                { "name": "orphan.xml" }
            ] }
        ],
        "loaders": [ { "label": "json", "type_name": "json" } ]
    }"#;

    #[test]
    fn parses_document() {
        let cfg = JsonConfiguration::from_json(DOC, "/opt/rtlift").unwrap();
        let env = cfg.environment("winMips").unwrap();
        assert_eq!(env.type_libraries.len(), 2);
        assert_eq!(env.type_libraries[1].loader, "");
        assert_eq!(cfg.image_loaders()[0].type_name, "json");
        assert!(cfg.environment("win32").is_none());
    }

    #[test]
    fn resolves_relative_paths() {
        let cfg = JsonConfiguration::from_json(DOC, "/opt/rtlift").unwrap();
        assert_eq!(
            cfg.installation_relative_path("kernel32.json"),
            PathBuf::from("/opt/rtlift/kernel32.json")
        );
        assert_eq!(
            cfg.installation_relative_path("/etc/k.json"),
            PathBuf::from("/etc/k.json")
        );
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            JsonConfiguration::from_json("{", "."),
            Err(TypeLibraryError::Json(_))
        ));
    }
}
