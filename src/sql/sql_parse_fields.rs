use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::row::{RowMeta, ValueMeta, ValueType};
use crate::sql::sql_common::{
    index_of_top_level, skip_chars, split_clause, split_tokens, strip_quotes, strip_table_alias,
};
use crate::sql::sql_parse_iif::IifFunction;
use crate::sql::sql_value::{extract_constant, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregation {
    pub fn keyword(&self) -> &'static str {
        match self {
            Aggregation::Count => "COUNT",
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
        }
    }
}

const AGGREGATIONS: &[(&str, Aggregation)] = &[
    ("COUNT", Aggregation::Count),
    ("SUM", Aggregation::Sum),
    ("AVG", Aggregation::Avg),
    ("MIN", Aggregation::Min),
    ("MAX", Aggregation::Max),
];

/// One entry of a SELECT, GROUP BY or ORDER BY list.
///
/// For aggregate calls `name` holds the inner argument, not the full call
/// text; `expression_text` reconstructs the call when needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlField {
    pub name: String,
    pub alias: Option<String>,
    pub aggregation: Option<Aggregation>,
    pub count_star: bool,
    pub count_distinct: bool,
    pub value_meta: Option<ValueMeta>,
    pub constant: Option<TypedValue>,
    pub iif: Option<IifFunction>,
    pub field_index: usize,
    pub ascending: bool,
}

impl SqlField {
    pub fn parse(
        table_alias: &str,
        raw: &str,
        row: &RowMeta,
        select_fields: Option<&SqlFields>,
        is_order_by: bool,
        field_index: usize,
    ) -> Result<SqlField> {
        let mut expr = raw.trim();
        if expr.is_empty() {
            bail!("Empty field expression in field list");
        }

        let mut ascending = true;
        if is_order_by {
            let bytes = expr.as_bytes();
            if bytes.len() > 5 && bytes[bytes.len() - 5..].eq_ignore_ascii_case(b" DESC") {
                ascending = false;
                expr = expr[..expr.len() - 5].trim_end();
            } else if bytes.len() > 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b" ASC") {
                expr = expr[..expr.len() - 4].trim_end();
            }
        }

        let mut alias = None;
        if let Some(at) = index_of_top_level(expr, "AS", 0, true) {
            let candidate = expr[at + 2..].trim();
            if candidate.is_empty() {
                bail!("Missing alias after AS in '{}'", raw);
            }
            alias = Some(strip_quotes(candidate, '"').to_string());
            expr = expr[..at].trim_end();
        } else {
            let tokens = split_tokens(expr)?;
            if tokens.len() == 2 && is_identifier(&tokens[1]) {
                alias = Some(strip_quotes(&tokens[1], '"').to_string());
                expr = expr[..expr.len() - tokens[1].len()].trim_end();
            }
        }
        if expr.is_empty() {
            bail!("Missing expression before alias in '{}'", raw);
        }

        let mut field = SqlField {
            name: String::new(),
            alias,
            aggregation: None,
            count_star: false,
            count_distinct: false,
            value_meta: None,
            constant: None,
            iif: None,
            field_index,
            ascending,
        };

        if let Some((aggregation, inner)) = match_aggregate(expr) {
            field.aggregation = Some(aggregation);
            let mut argument = inner.as_str();
            if aggregation == Aggregation::Count {
                if argument == "*" {
                    field.count_star = true;
                    field.name = "*".to_string();
                    field.value_meta =
                        Some(ValueMeta::new(&field.effective_alias(), ValueType::Integer));
                    return Ok(field);
                }
                if index_of_top_level(argument, "DISTINCT", 0, true) == Some(0) {
                    field.count_distinct = true;
                    argument = argument[8..].trim_start();
                }
            }
            let name = clean_field_token(argument, table_alias);
            let Some(meta) = row.search_value_meta(&name) else {
                bail!("Unknown field '{}' in aggregate '{}'", name, raw.trim());
            };
            let value_type = match aggregation {
                Aggregation::Count => ValueType::Integer,
                _ => meta.value_type,
            };
            field.name = name;
            field.value_meta = Some(ValueMeta::new(&field.effective_alias(), value_type));
            return Ok(field);
        }

        if let Some(arguments) = match_iif(expr) {
            let iif = IifFunction::new(table_alias, &arguments, row)?;
            field.name = expr.to_string();
            field.value_meta = Some(ValueMeta::new(&field.effective_alias(), iif.value_type()));
            field.iif = Some(iif);
            return Ok(field);
        }

        if let Some(value) = extract_constant(expr) {
            field.name = expr.to_string();
            field.value_meta = Some(ValueMeta::new(&field.effective_alias(), value.value_type()));
            field.constant = Some(value);
            return Ok(field);
        }

        let name = clean_field_token(expr, table_alias);
        if let Some(meta) = row.search_value_meta(&name) {
            field.name = meta.name.clone();
            field.value_meta = Some(meta.clone());
            return Ok(field);
        }

        // ORDER BY may reference a SELECT alias instead of a service field
        if is_order_by {
            if let Some(select) = select_fields {
                if let Some(matched) = select.find_by_alias(&name) {
                    debug!(target: "thinsql::sql", "order field '{}' adopts select expression '{}'", name, matched.expression_text());
                    let mut adopted = matched.clone();
                    adopted.field_index = field_index;
                    adopted.ascending = ascending;
                    return Ok(adopted);
                }
            }
        }

        bail!("Unknown field '{}' in field list", name)
    }

    /// The name this field is exposed under: the alias when given, the
    /// expression text otherwise.
    pub fn effective_alias(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expression_text(),
        }
    }

    /// Canonical form of the select expression, aggregate call included.
    pub fn expression_text(&self) -> String {
        if self.count_star {
            return "COUNT(*)".to_string();
        }
        if self.count_distinct {
            return format!("COUNT(DISTINCT {})", self.name);
        }
        match self.aggregation {
            Some(aggregation) => format!("{}({})", aggregation.keyword(), self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregation.is_some()
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_meta.as_ref().map(|meta| meta.value_type)
    }
}

/// An ordered field list parsed from a SELECT, GROUP BY or ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlFields {
    table_alias: String,
    fields: Vec<SqlField>,
    distinct: bool,
}

impl SqlFields {
    pub fn parse(
        table_alias: &str,
        clause: &str,
        row: &RowMeta,
        is_order_by: bool,
        select_fields: Option<&SqlFields>,
    ) -> Result<SqlFields> {
        let mut clause = clause.trim();
        let mut distinct = false;
        if index_of_top_level(clause, "DISTINCT", 0, true) == Some(0) {
            distinct = true;
            clause = clause[8..].trim_start();
        }
        if clause.is_empty() {
            bail!("Empty field list");
        }

        let mut fields = Vec::new();
        if clause == "*" {
            for (index, meta) in row.fields().iter().enumerate() {
                fields.push(SqlField {
                    name: meta.name.clone(),
                    alias: None,
                    aggregation: None,
                    count_star: false,
                    count_distinct: false,
                    value_meta: Some(meta.clone()),
                    constant: None,
                    iif: None,
                    field_index: index,
                    ascending: true,
                });
            }
        } else {
            for (index, item) in split_clause(clause, ',', '\'')?.iter().enumerate() {
                if item.trim().is_empty() {
                    bail!("Empty field expression in '{}'", clause);
                }
                fields.push(SqlField::parse(
                    table_alias,
                    item,
                    row,
                    select_fields,
                    is_order_by,
                    index,
                )?);
            }
        }

        Ok(SqlFields { table_alias: table_alias.to_string(), fields, distinct })
    }

    pub fn fields(&self) -> &[SqlField] {
        &self.fields
    }

    pub fn table_alias(&self) -> &str {
        &self.table_alias
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_aggregates(&self) -> bool {
        self.fields.iter().any(SqlField::is_aggregate)
    }

    pub fn aggregate_fields(&self) -> Vec<&SqlField> {
        self.fields.iter().filter(|field| field.is_aggregate()).collect()
    }

    pub fn regular_fields(&self) -> Vec<&SqlField> {
        self.fields.iter().filter(|field| !field.is_aggregate()).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SqlField> {
        self.fields.iter().find(|field| field.name.eq_ignore_ascii_case(name))
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&SqlField> {
        self.fields.iter().find(|field| field.effective_alias().eq_ignore_ascii_case(alias))
    }

    /// Find the entry parsed from `expression`. The probe is normalized the
    /// same way field parsing normalizes its input, so HAVING text like
    /// `SUM("svc"."price")` matches the entry whose canonical form is
    /// `SUM(price)`.
    pub fn find_by_expression(&self, expression: &str) -> Option<&SqlField> {
        let wanted = canonical_expression(expression.trim(), &self.table_alias);
        self.fields.iter().find(|field| field.expression_text().eq_ignore_ascii_case(&wanted))
    }
}

fn canonical_expression(expression: &str, table_alias: &str) -> String {
    if let Some((aggregation, inner)) = match_aggregate(expression) {
        if aggregation == Aggregation::Count {
            if inner == "*" {
                return "COUNT(*)".to_string();
            }
            if index_of_top_level(&inner, "DISTINCT", 0, true) == Some(0) {
                let argument = clean_field_token(inner[8..].trim_start(), table_alias);
                return format!("COUNT(DISTINCT {})", argument);
            }
        }
        return format!("{}({})", aggregation.keyword(), clean_field_token(&inner, table_alias));
    }
    clean_field_token(expression, table_alias)
}

fn clean_field_token(token: &str, table_alias: &str) -> String {
    let unprefixed = strip_table_alias(token.trim(), table_alias);
    strip_quotes(unprefixed, '"').to_string()
}

fn is_identifier(token: &str) -> bool {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        return true;
    }
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Matches `KEYWORD ( ... )` spanning the whole expression and returns the
/// trimmed inner argument.
fn match_call(expr: &str, keyword: &str) -> Option<String> {
    let bytes = expr.as_bytes();
    let len = keyword.len();
    if bytes.len() <= len || !bytes[..len].eq_ignore_ascii_case(keyword.as_bytes()) {
        return None;
    }
    let mut at = len;
    while at < bytes.len() && (bytes[at] == b' ' || bytes[at] == b'\t') {
        at += 1;
    }
    if at >= bytes.len() || bytes[at] != b'(' {
        return None;
    }
    match skip_chars(expr, at, &['(']) {
        Ok(end) if end == expr.len() => Some(expr[at + 1..expr.len() - 1].trim().to_string()),
        _ => None,
    }
}

fn match_aggregate(expr: &str) -> Option<(Aggregation, String)> {
    for &(keyword, aggregation) in AGGREGATIONS {
        if let Some(inner) = match_call(expr, keyword) {
            return Some((aggregation, inner));
        }
    }
    None
}

fn match_iif(expr: &str) -> Option<String> {
    match_call(expr, "IIF")
}
