//! Named model clients available to agents.

use crate::conversation::ports::ModelClient;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Model clients by name, with a default for agents that name none.
#[derive(Clone)]
pub struct ModelRegistry {
    default: Arc<dyn ModelClient>,
    named: HashMap<String, Arc<dyn ModelClient>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.named.keys().map(String::as_str).collect();
        names.sort_unstable();
        formatter
            .debug_struct("ModelRegistry")
            .field("named", &names)
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Creates a registry with only a default client.
    #[must_use]
    pub fn new(default: Arc<dyn ModelClient>) -> Self {
        Self {
            default,
            named: HashMap::new(),
        }
    }

    /// Registers a named client, replacing any previous one.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>, client: Arc<dyn ModelClient>) -> Self {
        self.named.insert(name.into(), client);
        self
    }

    /// Returns the client for `name`, or the default when `name` is `None`.
    #[must_use]
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<dyn ModelClient>> {
        name.map_or_else(
            || Some(Arc::clone(&self.default)),
            |model| self.named.get(model).cloned(),
        )
    }
}
