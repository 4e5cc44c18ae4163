//! Name-indexed registry of components.
//!
//! The registry is both collaborators the session cache needs: it resolves
//! names to descriptors and builds instances from a configuration.

use std::collections::HashMap;
use std::sync::Arc;

use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle,
    ComponentRuntime, DescriptorResolver,
};
use tracing::debug;

use crate::analyzers::{Completeness, ValueDistribution};
use crate::columns::ColumnBinding;
use crate::component::Component;
use crate::transformers::{Concatenator, StringLength, Uppercase};

/// Registry of available components, keyed by name.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in component.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Uppercase);
        registry.register(Concatenator);
        registry.register(StringLength);
        registry.register(ValueDistribution);
        registry.register(Completeness);
        registry
    }

    /// Register a component. A component with the same name is replaced.
    pub fn register<C: Component + 'static>(&mut self, component: C) {
        self.register_arc(Arc::new(component));
    }

    pub fn register_arc(&mut self, component: Arc<dyn Component>) {
        let name = component.descriptor().name;
        self.components.insert(name, component);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.names())
            .finish()
    }
}

impl DescriptorResolver for ComponentRegistry {
    fn resolve(&self, name: &str) -> Option<ComponentDescriptor> {
        self.components.get(name).map(|c| c.descriptor())
    }

    fn descriptors(&self) -> Vec<ComponentDescriptor> {
        self.names()
            .into_iter()
            .filter_map(|name| self.resolve(name))
            .collect()
    }
}

impl ComponentRuntime for ComponentRegistry {
    fn build(
        &self,
        descriptor: &ComponentDescriptor,
        configuration: &ComponentConfiguration,
    ) -> Result<Box<dyn ComponentHandle>, ComponentError> {
        let component = self.get(&descriptor.name).ok_or_else(|| {
            ComponentError::Validation(format!("component '{}' is not registered", descriptor.name))
        })?;

        for name in configuration.properties.keys() {
            if descriptor.property(name).is_none() {
                debug!(component = %descriptor.name, property = %name, "Ignoring unknown property");
            }
        }
        if let Some(missing) = descriptor
            .properties
            .iter()
            .find(|p| p.required && configuration.property(&p.name).is_none())
        {
            return Err(ComponentError::Validation(format!(
                "property '{}' is required",
                missing.name
            )));
        }

        let binding = ColumnBinding::new(configuration)?;
        component.build(binding, configuration)
    }
}
