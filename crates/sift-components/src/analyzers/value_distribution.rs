//! Frequency of each distinct value in a column.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use sift_session::{
    ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentHandle, ComponentKind,
    PropertyDescriptor,
};

use crate::columns::{ColumnBinding, InputColumn};
use crate::component::{Analyzer, AnalyzerHandle, Component};

/// Key under which null values are counted.
pub const NULL_KEY: &str = "<null>";

/// Counts how often each value occurs in one column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueDistribution;

impl ValueDistribution {
    pub const NAME: &'static str = "Value distribution";
}

impl Component for ValueDistribution {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(Self::NAME, ComponentKind::Analyzer)
            .with_description("Counts the occurrences of each distinct value")
            .with_property(
                PropertyDescriptor::new("column", "Column to analyze")
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
        Ok(AnalyzerHandle::boxed(
            binding,
            DistributionAnalyzer {
                column,
                total: 0,
                counts: BTreeMap::new(),
            },
        ))
    }
}

struct DistributionAnalyzer {
    column: InputColumn,
    total: u64,
    counts: BTreeMap<String, u64>,
}

impl Analyzer for DistributionAnalyzer {
    fn run(&mut self, values: &[Option<String>]) -> Result<(), ComponentError> {
        let key = self.column.value(values).unwrap_or(NULL_KEY);
        *self.counts.entry(key.to_string()).or_default() += 1;
        self.total += 1;
        Ok(())
    }

    fn result(&self) -> Value {
        json!({
            "column": self.column.name,
            "total": self.total,
            "distinct": self.counts.len(),
            "values": self.counts,
        })
    }
}
