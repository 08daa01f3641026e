use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::Provider;
use crate::error::DriverError;

/// Resolves a provider name to its [`Provider`] implementation.
///
/// Read-only after construction — registration happens once at startup.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { providers: HashMap::new() }
    }

    /// Register a provider under its own [`Provider::name`]. Returns `&mut
    /// self` for chaining.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> &mut Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Resolve a provider by name. Fails with `ProviderNotConfigured` for an
    /// unknown name — the CLI calls this at startup for the configured
    /// default provider so misconfiguration is a hard error, not a
    /// runtime surprise deep in a reconcile pass.
    pub fn for_name(&self, name: &str) -> Result<Arc<dyn Provider>, DriverError> {
        self.providers.get(name).cloned().ok_or_else(|| DriverError::ProviderNotConfigured(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalProvider;

    #[test]
    fn for_name_resolves_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(LocalProvider::new()));
        assert!(registry.for_name("local").is_ok());
    }

    #[test]
    fn for_name_rejects_unknown_provider() {
        let registry = ProviderRegistry::new();
        assert!(matches!(registry.for_name("nonexistent"), Err(DriverError::ProviderNotConfigured(_))));
    }
}
