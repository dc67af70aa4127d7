//! Ownership and lookup of all command specs.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::spec::CommandSpec;

/// Owns every registered [`CommandSpec`], keyed by unique name.
///
/// Registration moves the spec into the registry, so a spec can be
/// bound at most once; only duplicate names need a runtime check.
#[derive(Default)]
pub struct CommandRegistry {
    specs: HashMap<String, Arc<CommandSpec>>,
}

impl CommandRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a spec, taking ownership. Fails if the name is taken.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), RegistryError> {
        let name = spec.name().to_string();
        if self.specs.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        self.specs.insert(name, Arc::new(spec));
        Ok(())
    }

    /// Look up a spec by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<CommandSpec>, RegistryError> {
        self.specs
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownCommand {
                name: name.to_string(),
            })
    }

    /// Whether a command name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Read-only snapshot of all specs, sorted by name. The sort is for
    /// display only; it has no effect on matching order.
    pub fn list(&self) -> Vec<Arc<CommandSpec>> {
        let mut specs: Vec<_> = self.specs.values().cloned().collect();
        specs.sort_by(|a, b| a.name().cmp(b.name()));
        specs
    }

    /// Fetch the utils object another spec exposed, downcast to `T`.
    ///
    /// This is the side-channel that lets one command's handlers call
    /// helper functions of another command without going through the
    /// full dispatch/locking path.
    pub fn utils<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let spec = self.lookup(name)?;
        let utils = spec.utils_any().ok_or_else(|| RegistryError::NoUtils {
            name: name.to_string(),
        })?;
        utils
            .downcast::<T>()
            .map_err(|_| RegistryError::NoUtils {
                name: name.to_string(),
            })
    }
}
