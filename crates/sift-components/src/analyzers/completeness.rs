use serde_json::{Map, Value, json};
use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle, ComponentKind,
    PropertyDescriptor,
};

use crate::columns::{ColumnBinding, InputColumn};
use crate::component::{Analyzer, AnalyzerHandle, Component};

/// Counts null or empty values per column.
#[derive(Debug, Clone, Copy, Default)]
pub struct Completeness;

impl Completeness {
    pub const NAME: &'static str = "Completeness";
}

impl Component for Completeness {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(Self::NAME, ComponentKind::Analyzer)
            .with_description("Counts null or empty values per column")
            .with_property(
                PropertyDescriptor::new("columns", "Columns to check (default: all)")
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
        let missing = vec![0; columns.len()];
        Ok(AnalyzerHandle::boxed(
            binding,
            CompletenessAnalyzer {
                columns,
                rows: 0,
                missing,
            },
        ))
    }
}

struct CompletenessAnalyzer {
    columns: Vec<InputColumn>,
    rows: u64,
    missing: Vec<u64>,
}

impl Analyzer for CompletenessAnalyzer {
    fn run(&mut self, values: &[Option<String>]) -> Result<(), ComponentError> {
        self.rows += 1;
        for (column, missing) in self.columns.iter().zip(self.missing.iter_mut()) {
            if column.value(values).is_none_or(str::is_empty) {
                *missing += 1;
            }
        }
        Ok(())
    }

    fn result(&self) -> Value {
        let columns: Map<String, Value> = self
            .columns
            .iter()
            .zip(&self.missing)
            .map(|(column, missing)| {
                (
                    column.name.clone(),
                    json!({ "rows": self.rows, "null_or_empty": missing }),
                )
            })
            .collect();
        Value::Object(columns)
    }
}
