//! Component traits and the handles that drive them.

use serde_json::Value;
use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle, OutputColumn,
    Row,
};

use crate::columns::ColumnBinding;

/// A registered component type that can build instances of itself.
pub trait Component: Send + Sync {
    /// Metadata published in the catalog and used for validation.
    fn descriptor(&self) -> ComponentDescriptor;

    /// Build one instance from validated columns and the raw configuration.
    fn build(
        &self,
        binding: ColumnBinding,
        configuration: &ComponentConfiguration,
    ) -> Result<Box<dyn ComponentHandle>, ComponentError>;
}

/// Produces exactly one output row per input row.
pub trait Transformer: Send {
    fn output_columns(&self) -> Vec<OutputColumn>;

    /// Transform one row, given as text values aligned with the declared columns.
    fn transform(&mut self, values: &[Option<String>]) -> Result<Row, ComponentError>;
}

/// Consumes rows and produces one aggregated result when closed.
pub trait Analyzer: Send {
    fn run(&mut self, values: &[Option<String>]) -> Result<(), ComponentError>;

    fn result(&self) -> Value;
}

/// Drives a [`Transformer`] through the session handle interface.
pub struct TransformerHandle<T> {
    binding: ColumnBinding,
    transformer: T,
}

impl<T: Transformer + 'static> TransformerHandle<T> {
    pub fn boxed(binding: ColumnBinding, transformer: T) -> Box<dyn ComponentHandle> {
        Box::new(Self {
            binding,
            transformer,
        })
    }
}

impl<T: Transformer> ComponentHandle for TransformerHandle<T> {
    fn run(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ComponentError> {
        rows.iter()
            .map(|row| self.transformer.transform(&self.binding.row_values(row)))
            .collect()
    }

    fn output_columns(&self) -> Vec<OutputColumn> {
        self.transformer.output_columns()
    }

    fn close(self: Box<Self>) -> Result<Option<Value>, ComponentError> {
        Ok(None)
    }
}

/// Drives an [`Analyzer`] through the session handle interface.
pub struct AnalyzerHandle<A> {
    binding: ColumnBinding,
    analyzer: A,
}

impl<A: Analyzer + 'static> AnalyzerHandle<A> {
    pub fn boxed(binding: ColumnBinding, analyzer: A) -> Box<dyn ComponentHandle> {
        Box::new(Self { binding, analyzer })
    }
}

impl<A: Analyzer> ComponentHandle for AnalyzerHandle<A> {
    fn run(&mut self, rows: Vec<Row>) -> Result<Vec<Row>, ComponentError> {
        for row in &rows {
            self.analyzer.run(&self.binding.row_values(row))?;
        }
        Ok(Vec::new())
    }

    fn output_columns(&self) -> Vec<OutputColumn> {
        Vec::new()
    }

    fn close(self: Box<Self>) -> Result<Option<Value>, ComponentError> {
        Ok(Some(self.analyzer.result()))
    }
}
