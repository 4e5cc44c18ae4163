//! Collaborator interfaces the cache drives.
//!
//! The cache never knows what a component does. It resolves a name to a
//! [`ComponentDescriptor`] through a [`DescriptorResolver`], asks a
//! [`ComponentRuntime`] to build a [`ComponentHandle`] from that descriptor
//! and the session's [`ComponentConfiguration`], then pushes row batches
//! through the handle until it is closed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ComponentError;

/// One input or output row, positionally matching the declared columns.
pub type Row = Vec<Value>;

/// Token substituted for `/` in component names carried in URL paths.
pub const PATH_SEPARATOR_TOKEN: &str = "_@_";

/// Escape a component name for use as a single path segment.
pub fn escape_component_name(name: &str) -> String {
    name.replace('/', PATH_SEPARATOR_TOKEN)
}

/// Reverse [`escape_component_name`].
pub fn unescape_component_name(name: &str) -> String {
    name.replace(PATH_SEPARATOR_TOKEN, "/")
}

// ─────────────────────────────────────────────────────────────────────────────
// Creation input
// ─────────────────────────────────────────────────────────────────────────────

/// Declared input columns plus configured property values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfiguration {
    /// Names of the columns, in the order values appear in each row.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Configured property values by property name.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl ComponentConfiguration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input column.
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    /// Set a property value.
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Look up a property value.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Input supplied when a session is created. Held immutably by the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateInput {
    pub configuration: ComponentConfiguration,
}

impl CreateInput {
    pub fn new(configuration: ComponentConfiguration) -> Self {
        Self { configuration }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a component emits rows or only accumulates a final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Transformer,
    Analyzer,
}

/// A configurable property of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub required: bool,
    /// The property names one or more of the declared input columns.
    pub input_column: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            input_column: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn input_column(mut self) -> Self {
        self.input_column = true;
        self
    }
}

/// Metadata describing a resolvable component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            properties: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Look up a property descriptor by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// An output column produced by a built component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a component name to its descriptor.
pub trait DescriptorResolver: Send + Sync {
    /// Resolve a component by name. `None` means the name is unknown.
    fn resolve(&self, name: &str) -> Option<ComponentDescriptor>;

    /// All resolvable descriptors, for catalog listings.
    fn descriptors(&self) -> Vec<ComponentDescriptor> {
        Vec::new()
    }
}

/// Builds live component instances.
pub trait ComponentRuntime: Send + Sync {
    /// Construct, validate and initialize one component instance.
    fn build(
        &self,
        descriptor: &ComponentDescriptor,
        configuration: &ComponentConfiguration,
    ) -> Result<Box<dyn ComponentHandle>, ComponentError>;
}

/// A constructed, initialized component instance owned by one session.
///
/// `close` consumes the handle, so a handle can be released at most once.
pub trait ComponentHandle: Send {
    /// Consume a batch of rows in order and return the rows produced.
    /// Analyzers return an empty batch.
    fn run(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ComponentError>;

    /// Columns of the rows returned by `run`.
    fn output_columns(&self) -> Vec<OutputColumn>;

    /// Release the instance and return its final aggregated result, if any.
    fn close(self: Box<Self>) -> Result<Option<Value>, ComponentError>;
}
