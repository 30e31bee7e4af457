use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::cli;
use crate::error::Result;

/// Signature shared by all hook handlers
pub type HookHandler = Box<dyn Fn(&Path, &[String]) -> Result<i32>>;

/// A named hook and the handler it runs
pub struct Hook {
    name: String,
    description: String,
    handler: HookHandler,
}

impl Hook {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the handler for the repository at `repo_path`
    pub fn run(&self, repo_path: &Path, args: &[String]) -> Result<i32> {
        (self.handler)(repo_path, args)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Hook name → handler mapping
///
/// Built once at startup and only read afterwards. Hooks are kept sorted by
/// name so the usage text is stable.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        HookRegistry {
            hooks: BTreeMap::new(),
        }
    }

    /// Add a hook, replacing any earlier one of the same name
    pub fn register<F>(mut self, name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(&Path, &[String]) -> Result<i32> + 'static,
    {
        self.hooks.insert(
            name.to_string(),
            Hook {
                name: name.to_string(),
                description: description.to_string(),
                handler: Box::new(handler),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&Hook> {
        self.hooks.get(name)
    }

    /// Registered hooks, sorted by name
    pub fn hooks(&self) -> impl Iterator<Item = &Hook> {
        self.hooks.values()
    }
}

/// The hooks this binary answers to
pub fn default_registry() -> HookRegistry {
    HookRegistry::new().register(
        "post-receive",
        "Check, upload and activate the sieve script from the configured ref",
        cli::post_receive,
    )
}
