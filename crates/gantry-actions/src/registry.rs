//! Static action registry.

use async_trait::async_trait;
use gantry_core::ports::{ActionInput, ActionRegistry, ResolvedAction};
use gantry_core::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

/// Definition of one registered action.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: String,
    /// Versions this definition answers for. `latest` always resolves to
    /// the registered definition; an empty list accepts any version.
    pub versions: Vec<String>,
    /// Command template; may reference `${{ inputs.* }}`.
    pub command: String,
    pub inputs: Vec<ActionInput>,
}

impl ActionSpec {
    fn accepts(&self, version: &str) -> bool {
        version == "latest"
            || self.versions.is_empty()
            || self.versions.iter().any(|v| v == version)
    }
}

/// Registry backed by an in-memory table of action definitions.
///
/// Serves both the built-in action set and embedders that register their
/// own actions (tests use it with handcrafted specs).
pub struct StaticRegistry {
    actions: HashMap<String, ActionSpec>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    pub fn with_action(mut self, spec: ActionSpec) -> Self {
        self.actions.insert(spec.name.clone(), spec);
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionRegistry for StaticRegistry {
    async fn resolve(&self, name: &str, version: &str) -> Result<ResolvedAction> {
        let spec = self
            .actions
            .get(name)
            .ok_or_else(|| Error::ActionNotFound(name.to_string()))?;

        if !spec.accepts(version) {
            return Err(Error::ActionNotFound(format!("{}@{}", name, version)));
        }

        debug!(action = %name, version = %version, "Resolved action");
        Ok(ResolvedAction {
            name: spec.name.clone(),
            version: version.to_string(),
            command: spec.command.clone(),
            inputs: spec.inputs.clone(),
        })
    }
}
