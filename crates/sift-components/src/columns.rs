//! Mapping of declared input columns and configured properties onto rows.
//!
//! Every row value is treated as text. A row is read positionally against
//! the declared columns: extra values are ignored, missing ones read as null.

use serde_json::Value;
use sift_session::{ComponentConfiguration, ComponentError, Row};
use tracing::debug;

/// Coerce a JSON value to text.
///
/// Strings are taken verbatim, `[]` becomes `""`, a one-element array is
/// unwrapped, null stays null and anything else is rendered as JSON.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => Some(String::new()),
        Value::Array(items) if items.len() == 1 => text_value(&items[0]),
        other => Some(other.to_string()),
    }
}

/// Coerce a property value to a list of strings. Scalars become one item.
pub fn text_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text_value).collect(),
        other => text_value(other).into_iter().collect(),
    }
}

/// Read a configured property as text.
pub fn string_property(configuration: &ComponentConfiguration, name: &str) -> Option<String> {
    configuration.property(name).and_then(text_value)
}

/// A declared column selected by a component property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumn {
    pub name: String,
    pub index: usize,
}

impl InputColumn {
    /// The value of this column in a bound row.
    pub fn value<'a>(&self, values: &'a [Option<String>]) -> Option<&'a str> {
        values.get(self.index).and_then(|v| v.as_deref())
    }
}

/// The declared columns of one component instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnBinding {
    declared: Vec<String>,
}

impl ColumnBinding {
    /// Bind the columns declared in a configuration. Names must be unique.
    pub fn new(configuration: &ComponentConfiguration) -> Result<Self, ComponentError> {
        let mut declared: Vec<String> = Vec::with_capacity(configuration.columns.len());
        for name in &configuration.columns {
            if declared.contains(name) {
                return Err(ComponentError::Validation(format!(
                    "column '{name}' is declared more than once"
                )));
            }
            declared.push(name.clone());
        }
        Ok(Self { declared })
    }

    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.declared.iter().position(|c| c == name)
    }

    /// Every declared column, in declaration order.
    pub fn all(&self) -> Vec<InputColumn> {
        self.declared
            .iter()
            .enumerate()
            .map(|(index, name)| InputColumn {
                name: name.clone(),
                index,
            })
            .collect()
    }

    /// Resolve an input-column property. `None` when the property is unset.
    ///
    /// Fails if the property names a column that was not declared.
    pub fn input_columns(
        &self,
        configuration: &ComponentConfiguration,
        property: &str,
    ) -> Result<Option<Vec<InputColumn>>, ComponentError> {
        let Some(value) = configuration.property(property) else {
            return Ok(None);
        };
        text_values(value)
            .into_iter()
            .map(|name| match self.index_of(&name) {
                Some(index) => Ok(InputColumn { name, index }),
                None => Err(ComponentError::Validation(format!(
                    "property '{property}' references undeclared column '{name}'"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Resolve a property that must name exactly one column.
    pub fn input_column(
        &self,
        configuration: &ComponentConfiguration,
        property: &str,
    ) -> Result<InputColumn, ComponentError> {
        let mut columns = self
            .input_columns(configuration, property)?
            .ok_or_else(|| ComponentError::Validation(format!("property '{property}' is required")))?;
        if columns.len() != 1 {
            return Err(ComponentError::Validation(format!(
                "property '{property}' must name exactly one column, got {}",
                columns.len()
            )));
        }
        Ok(columns.remove(0))
    }

    /// Read a row as text values aligned with the declared columns.
    pub fn row_values(&self, row: &Row) -> Vec<Option<String>> {
        if row.len() > self.declared.len() {
            debug!(
                declared = self.declared.len(),
                received = row.len(),
                "Row has more values than declared columns, extra values ignored"
            );
        }
        (0..self.declared.len())
            .map(|i| row.get(i).and_then(text_value))
            .collect()
    }
}
