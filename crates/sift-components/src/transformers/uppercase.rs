//! Upper-casing of text columns.

use serde_json::Value;
use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle, ComponentKind,
    OutputColumn, PropertyDescriptor, Row,
};

use crate::columns::{ColumnBinding, InputColumn};
use crate::component::{Component, Transformer, TransformerHandle};

// ─────────────────────────────────────────────────────────────────────────────
// Uppercase
// ─────────────────────────────────────────────────────────────────────────────

/// Converts text values to upper case, one output column per input column.
///
/// Without a `columns` property every declared column is converted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uppercase;

impl Uppercase {
    pub const NAME: &'static str = "Uppercase";
}

impl Component for Uppercase {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(Self::NAME, ComponentKind::Transformer)
            .with_description("Converts text values to upper case")
            .with_property(
                PropertyDescriptor::new("columns", "Columns to convert (default: all)")
                    .input_column(),
            )
    }

    fn build(
        &self,
        binding: ColumnBinding,
        configuration: &ComponentConfiguration,
    ) -> Result<Box<dyn ComponentHandle>, ComponentError> {
        let columns = binding
            .input_columns(configuration, "columns")?
            .unwrap_or_else(|| binding.all());
        Ok(TransformerHandle::boxed(binding, UppercaseTransformer { columns }))
    }
}

struct UppercaseTransformer {
    columns: Vec<InputColumn>,
}

impl Transformer for UppercaseTransformer {
    fn output_columns(&self) -> Vec<OutputColumn> {
        self.columns
            .iter()
            .map(|c| OutputColumn::new(format!("{} (upper)", c.name), "string"))
            .collect()
    }

    fn transform(&mut self, values: &[Option<String>]) -> Result<Row, ComponentError> {
        Ok(self
            .columns
            .iter()
            .map(|c| match c.value(values) {
                Some(v) => Value::String(v.to_uppercase()),
                None => Value::Null,
            })
            .collect())
    }
}
