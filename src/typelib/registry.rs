//! Resolve and load the type libraries declared for an environment.

use tracing::{debug, info_span};

use crate::platform::Platform;
use crate::typelib::config::Services;
use crate::typelib::loader::LoaderRegistry;
use crate::typelib::{TypeLibrary, TypeLibraryError};

/// Load every type library declared for `env_name`, in declaration order.
///
/// Declared libraries are joined with the configured loaders on the loader
/// label. A library with an empty loader label, or one no loader carries,
/// is skipped.
pub fn load_type_libraries(
    env_name: &str,
    services: &Services,
    loaders: &LoaderRegistry,
    platform: &dyn Platform,
) -> Result<Vec<TypeLibrary>, TypeLibraryError> {
    let _span = info_span!("load_type_libraries", env = env_name).entered();
    let config = services.config.as_ref();
    let env = config
        .environment(env_name)
        .ok_or_else(|| TypeLibraryError::UnknownEnvironment(env_name.to_string()))?;

    let mut libs = Vec::new();
    for tl in &env.type_libraries {
        if tl.loader.is_empty() {
            debug!(library = %tl.name, "no loader declared; skipping");
            continue;
        }
        let mut matched = false;
        for ldr in config.image_loaders().iter().filter(|l| l.label == tl.loader) {
            matched = true;
            let path = config.installation_relative_path(&tl.name);
            let bytes = services
                .fs
                .read_all_bytes(&path)
                .map_err(|source| TypeLibraryError::Io {
                    path: path.clone(),
                    source,
                })?;
            let loader = loaders.create(&ldr.type_name, services, &path, bytes)?;
            let lib = loader.load(platform)?;
            debug!(library = %tl.name, module = %lib.module_name, services = lib.len(), "type library loaded");
            libs.push(lib);
        }
        if !matched {
            debug!(library = %tl.name, loader = %tl.loader, "unknown loader; skipping");
        }
    }
    Ok(libs)
}
