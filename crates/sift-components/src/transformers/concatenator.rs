//! Concatenation of several columns into one.

use serde_json::Value;
use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle, ComponentKind,
    OutputColumn, PropertyDescriptor, Row,
};

use crate::columns::{ColumnBinding, InputColumn, string_property};
use crate::component::{Component, Transformer, TransformerHandle};

/// Joins the non-null values of the selected columns with a separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concatenator;

impl Concatenator {
    pub const NAME: &'static str = "Concatenator";
}

impl Component for Concatenator {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(Self::NAME, ComponentKind::Transformer)
            .with_description("Concatenates the values of several columns")
            .with_property(
                PropertyDescriptor::new("columns", "Columns to concatenate, in order")
                    .required()
                    .input_column(),
            )
            .with_property(PropertyDescriptor::new(
                "separator",
                "Text inserted between values (default: none)",
            ))
    }

    fn build(
        &self,
        binding: ColumnBinding,
        configuration: &ComponentConfiguration,
    ) -> Result<Box<dyn ComponentHandle>, ComponentError> {
        let columns = binding
            .input_columns(configuration, "columns")?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ComponentError::Validation("property 'columns' must name at least one column".into())
            })?;
        let separator = string_property(configuration, "separator").unwrap_or_default();

        Ok(TransformerHandle::boxed(
            binding,
            ConcatenatorTransformer { columns, separator },
        ))
    }
}

struct ConcatenatorTransformer {
    columns: Vec<InputColumn>,
    separator: String,
}

impl Transformer for ConcatenatorTransformer {
    fn output_columns(&self) -> Vec<OutputColumn> {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        vec![OutputColumn::new(
            format!("Concat of {}", names.join(", ")),
            "string",
        )]
    }

    fn transform(&mut self, values: &[Option<String>]) -> Result<Row, ComponentError> {
        let parts: Vec<&str> = self.columns.iter().filter_map(|c| c.value(values)).collect();
        let joined = if parts.is_empty() {
            Value::Null
        } else {
            Value::String(parts.join(&self.separator))
        };
        Ok(vec![joined])
    }
}
