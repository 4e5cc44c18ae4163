use serde_json::{Value, json};
use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle, ComponentKind,
    OutputColumn, PropertyDescriptor, Row,
};

use crate::columns::{ColumnBinding, InputColumn};
use crate::component::{Component, Transformer, TransformerHandle};

/// Emits the character count of one column.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLength;

impl StringLength {
    pub const NAME: &'static str = "String length";
}

impl Component for StringLength {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(Self::NAME, ComponentKind::Transformer)
            .with_description("Counts the characters of a text value")
            .with_property(
                PropertyDescriptor::new("column", "Column to measure")
                    .required()
                    .input_column(),
            )
    }

    fn build(
        &self,
        binding: ColumnBinding,
        configuration: &ComponentConfiguration,
    ) -> Result<Box<dyn ComponentHandle>, ComponentError> {
        let column = binding.input_column(configuration, "column")?;
        Ok(TransformerHandle::boxed(binding, LengthTransformer { column }))
    }
}

struct LengthTransformer {
    column: InputColumn,
}

impl Transformer for LengthTransformer {
    fn output_columns(&self) -> Vec<OutputColumn> {
        vec![OutputColumn::new(
            format!("{} length", self.column.name),
            "integer",
        )]
    }

    fn transform(&mut self, values: &[Option<String>]) -> Result<Row, ComponentError> {
        let length = match self.column.value(values) {
            Some(v) => json!(v.chars().count()),
            None => Value::Null,
        };
        Ok(vec![length])
    }
}
