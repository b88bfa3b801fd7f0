use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::row::{RowMeta, ValueType};
use crate::sql::sql_common::{split_clause, strip_quotes, strip_table_alias};
use crate::sql::sql_parse_condition::SqlCondition;
use crate::sql::sql_value::{extract_constant, TypedValue};

/// One branch value of an IIF call: a literal or a service field reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IifOperand {
    Constant(TypedValue),
    Field { name: String, value_type: ValueType },
}

impl IifOperand {
    fn resolve(table_alias: &str, token: &str, row: &RowMeta) -> Result<IifOperand> {
        let token = token.trim();
        if token.is_empty() {
            bail!("Empty IIF operand");
        }
        if let Some(value) = extract_constant(token) {
            return Ok(IifOperand::Constant(value));
        }
        let name = strip_quotes(strip_table_alias(token, table_alias), '"');
        match row.search_value_meta(name) {
            Some(meta) => {
                Ok(IifOperand::Field { name: meta.name.clone(), value_type: meta.value_type })
            }
            None => bail!("IIF operand '{}' is neither a literal value nor a known field", token),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            IifOperand::Constant(value) => value.value_type(),
            IifOperand::Field { value_type, .. } => *value_type,
        }
    }
}

/// `IIF(condition, true_value, false_value)` in a select list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IifFunction {
    arguments: String,
    condition: SqlCondition,
    true_value: IifOperand,
    false_value: IifOperand,
}

impl IifFunction {
    /// `arguments` is the text between the parentheses of the call.
    pub fn new(table_alias: &str, arguments: &str, row: &RowMeta) -> Result<IifFunction> {
        let parts = split_clause(arguments, ',', '\'')?;
        if parts.len() != 3 {
            bail!(
                "IIF expects a condition, a true value and a false value, found {} arguments in '{}'",
                parts.len(),
                arguments.trim()
            );
        }
        let condition = SqlCondition::new(table_alias, &parts[0], row)?;
        let true_value = IifOperand::resolve(table_alias, &parts[1], row)?;
        let false_value = IifOperand::resolve(table_alias, &parts[2], row)?;
        Ok(IifFunction {
            arguments: arguments.trim().to_string(),
            condition,
            true_value,
            false_value,
        })
    }

    pub fn condition(&self) -> &SqlCondition {
        &self.condition
    }

    pub fn true_value(&self) -> &IifOperand {
        &self.true_value
    }

    pub fn false_value(&self) -> &IifOperand {
        &self.false_value
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// Result type of the call, taken from the true branch.
    pub fn value_type(&self) -> ValueType {
        self.true_value.value_type()
    }
}
