use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::row::RowMeta;
use crate::sql::sql_common::{
    index_of_top_level, skip_chars, split_clause, split_on_top_level, strip_quotes,
    strip_table_alias,
};
use crate::sql::sql_condition::{encode_in_list, BoolOp, CompareOp, Condition};
use crate::sql::sql_parse_fields::SqlFields;
use crate::sql::sql_value::{extract_constant, TypedValue};

static PARAMETER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*PARAMETER\s*\(\s*'(.*)'\s*\)\s*=\s*'(.*)'\s*$").expect("parameter pattern")
});

/// Ordered operator table. Longer operators come first so `<=` wins over `=`
/// and `IS NOT NULL` over `IS NULL`; the flag marks word operators that only
/// match on identifier boundaries.
const OPERATORS: &[(&str, CompareOp, bool)] = &[
    ("<>", CompareOp::NotEqual, false),
    (">=", CompareOp::LargerEqual, false),
    ("<=", CompareOp::SmallerEqual, false),
    ("IS NOT NULL", CompareOp::IsNotNull, true),
    ("IS NULL", CompareOp::IsNull, true),
    ("REGEX", CompareOp::Regexp, true),
    ("IN", CompareOp::InList, true),
    ("LIKE", CompareOp::Like, true),
    ("CONTAINS", CompareOp::Contains, true),
    ("=", CompareOp::Equal, false),
    ("<", CompareOp::Smaller, false),
    (">", CompareOp::Larger, false),
];

/// A WHERE or HAVING clause parsed into a condition tree, with field
/// references resolved against a row schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCondition {
    table_alias: String,
    clause: String,
    condition: Condition,
}

impl SqlCondition {
    /// Parse a WHERE clause against `row`.
    pub fn new(table_alias: &str, clause: &str, row: &RowMeta) -> Result<SqlCondition> {
        SqlCondition::build(table_alias, clause, row, None)
    }

    /// Parse a HAVING clause: a left operand matching a SELECT expression is
    /// rewritten to that field's alias before resolution.
    pub fn with_select_fields(
        table_alias: &str,
        clause: &str,
        row: &RowMeta,
        select_fields: &SqlFields,
    ) -> Result<SqlCondition> {
        SqlCondition::build(table_alias, clause, row, Some(select_fields))
    }

    fn build(
        table_alias: &str,
        clause: &str,
        row: &RowMeta,
        select_fields: Option<&SqlFields>,
    ) -> Result<SqlCondition> {
        let trimmed = clause.trim();
        if trimmed.is_empty() {
            bail!("Empty condition clause");
        }
        let builder = ConditionBuilder { table_alias, row, select_fields };
        let condition = builder.parse(trimmed)?.simplify();
        debug!(target: "thinsql::sql", "condition for '{}': {}", trimmed, condition);
        Ok(SqlCondition {
            table_alias: table_alias.to_string(),
            clause: trimmed.to_string(),
            condition,
        })
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn table_alias(&self) -> &str {
        &self.table_alias
    }
}

struct ConditionBuilder<'a> {
    table_alias: &'a str,
    row: &'a RowMeta,
    select_fields: Option<&'a SqlFields>,
}

impl<'a> ConditionBuilder<'a> {
    // OR binds loosest: the OR split is attempted before the AND split at
    // every level, so AND groups nest inside OR nodes.
    fn parse(&self, clause: &str) -> Result<Condition> {
        let or_segments = split_on_top_level(clause, " OR ", false);
        if or_segments.len() > 1 {
            let mut children = Vec::with_capacity(or_segments.len());
            for segment in &or_segments {
                children.push(self.parse_and_level(segment)?);
            }
            return Ok(Condition::compound(BoolOp::Or, children));
        }
        self.parse_and_level(clause)
    }

    fn parse_and_level(&self, clause: &str) -> Result<Condition> {
        let and_segments = split_on_top_level(clause, " AND ", false);
        if and_segments.len() > 1 {
            let mut children = Vec::with_capacity(and_segments.len());
            for segment in &and_segments {
                children.push(self.parse(segment)?);
            }
            return Ok(Condition::compound(BoolOp::And, children));
        }
        self.parse_elementary(clause)
    }

    fn parse_elementary(&self, clause: &str) -> Result<Condition> {
        let clause = clause.trim();
        if clause.is_empty() {
            bail!("Incomplete condition: empty sub-clause");
        }

        // PARAMETER('name') = 'value' pseudo-condition
        if let Some(caps) = PARAMETER_PATTERN.captures(clause) {
            let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            if name.is_empty() {
                bail!("Empty parameter name in '{}'", clause);
            }
            if value.is_empty() {
                bail!("Empty parameter value in '{}'", clause);
            }
            return Ok(Condition::parameter(name, value));
        }

        // NOT ( ... )
        if index_of_top_level(clause, "NOT", 0, true) == Some(0) {
            let rest = clause[3..].trim_start();
            if rest.starts_with('(') && skip_chars(rest, 0, &['('])? == rest.len() {
                let mut inner = self.parse(&rest[1..rest.len() - 1])?;
                inner.negate();
                return Ok(inner);
            }
        }

        // ( ... )
        if clause.starts_with('(') && skip_chars(clause, 0, &['('])? == clause.len() {
            return self.parse(&clause[1..clause.len() - 1]);
        }

        self.parse_atomic(clause)
    }

    fn parse_atomic(&self, clause: &str) -> Result<Condition> {
        for &(text, function, word) in OPERATORS {
            if index_of_top_level(clause, text, 0, word).is_none() {
                continue;
            }
            let parts = split_on_top_level(clause, text, word);
            if parts.len() > 2 {
                bail!(
                    "Only a single comparison is supported per elementary condition: '{}'",
                    clause
                );
            }
            let left_raw = parts[0].as_str();
            let right_raw = parts[1].as_str();
            if left_raw.is_empty() {
                bail!("Missing left operand in condition '{}'", clause);
            }
            let left = self.resolve_left(left_raw)?;
            if function.is_unary() {
                if !right_raw.is_empty() {
                    bail!("Unexpected text after {} in condition '{}'", text, clause);
                }
                return Ok(Condition::unary(&left, function));
            }
            if right_raw.is_empty() {
                bail!("Missing right operand in condition '{}'", clause);
            }
            return self.resolve_comparison(&left, function, right_raw, clause);
        }
        bail!("No comparison operator found in condition '{}'", clause)
    }

    fn resolve_left(&self, raw: &str) -> Result<String> {
        let token = raw.trim();
        // HAVING context: a select expression is referenced by its alias
        if let Some(select) = self.select_fields {
            if let Some(field) = select.find_by_expression(token) {
                return Ok(field.effective_alias());
            }
        }
        let name = self.strip_field_token(token);
        if self.row.search_value_meta(&name).is_none() {
            if let Some(select) = self.select_fields {
                if select.find_by_alias(&name).is_some() {
                    return Ok(name);
                }
            }
            bail!("Unknown field '{}' in condition", name);
        }
        Ok(name)
    }

    fn resolve_comparison(
        &self,
        left: &str,
        function: CompareOp,
        right_raw: &str,
        clause: &str,
    ) -> Result<Condition> {
        let right = right_raw.trim();
        if function == CompareOp::InList {
            let items = parse_in_list(right, clause)?;
            let encoded = encode_in_list(&items);
            return Ok(Condition::compare_value(left, CompareOp::InList, TypedValue::Str(encoded)));
        }
        if let Some(folded) = fold_concat(right) {
            return Ok(Condition::compare_value(left, function, TypedValue::Str(folded)));
        }
        if let Some(value) = extract_constant(right) {
            return Ok(Condition::compare_value(left, function, value));
        }
        let name = self.strip_field_token(right);
        if self.row.search_value_meta(&name).is_some() {
            return Ok(Condition::compare_field(left, function, &name));
        }
        bail!(
            "'{}' is neither a literal value nor a known field (in condition '{}')",
            right,
            clause
        )
    }

    fn strip_field_token(&self, token: &str) -> String {
        let unprefixed = strip_table_alias(token, self.table_alias);
        strip_quotes(unprefixed, '"').to_string()
    }
}

fn parse_in_list(right: &str, clause: &str) -> Result<Vec<String>> {
    if !(right.starts_with('(') && right.ends_with(')') && right.len() >= 2) {
        bail!("IN expects a parenthesized value list in condition '{}'", clause);
    }
    let inner = &right[1..right.len() - 1];
    let raw_items = split_clause(inner, ',', '\'')?;
    let mut items = Vec::with_capacity(raw_items.len());
    for item in &raw_items {
        let unquoted = strip_quotes(item.trim(), '\'');
        items.push(unquoted.replace("''", "'"));
    }
    Ok(items)
}

// BI tools express LIKE patterns as '%' || 'text' || '%'; fold the
// concatenation into one literal when every piece is a quoted string.
fn fold_concat(right: &str) -> Option<String> {
    index_of_top_level(right, "||", 0, false)?;
    let parts = split_on_top_level(right, "||", false);
    let mut folded = String::new();
    for part in &parts {
        if part.len() >= 2 && part.starts_with('\'') && part.ends_with('\'') {
            folded.push_str(&strip_quotes(part, '\'').replace("''", "'"));
        } else {
            return None;
        }
    }
    Some(folded)
}
