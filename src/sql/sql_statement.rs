use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::row::RowMeta;
use crate::sql::sql_common::{
    find_clause, flatten_lines, index_of_top_level, split_clause, split_tokens, strip_quotes,
};
use crate::sql::sql_parse_condition::SqlCondition;
use crate::sql::sql_parse_fields::SqlFields;
use crate::sql::sql_parse_limit::SqlLimit;

/// Service name used when a statement has no FROM clause, for constant-only
/// queries like `SELECT 1`.
pub const DUAL_SERVICE: &str = "dual";

/// A single-service SELECT statement, split into clauses at construction
/// and bound to a row schema by [`SqlStatement::parse`].
///
/// Construction never consults a schema: clause splitting and FROM/LIMIT
/// resolution succeed or fail on the statement text alone, so a statement
/// can be routed to its service before the service row layout is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    sql: String,
    namespace: Option<String>,
    service_name: String,
    service_alias: String,
    select_clause: String,
    from_clause: Option<String>,
    where_clause: Option<String>,
    group_clause: Option<String>,
    having_clause: Option<String>,
    order_clause: Option<String>,
    limit_clause: Option<String>,
    limit: Option<SqlLimit>,
    select_fields: Option<SqlFields>,
    where_condition: Option<SqlCondition>,
    group_fields: Option<SqlFields>,
    having_condition: Option<SqlCondition>,
    order_fields: Option<SqlFields>,
}

impl SqlStatement {
    pub fn new(sql: &str) -> Result<SqlStatement> {
        let flat = flatten_lines(sql);
        let trimmed = flat.trim();
        if index_of_top_level(trimmed, "SELECT", 0, true) != Some(0) {
            bail!("Only SELECT statements are supported: '{}'", trimmed);
        }

        let select_clause = match find_clause(&flat, "SELECT", &["FROM"]) {
            Some(clause) if !clause.is_empty() => clause,
            _ => bail!("SELECT needs at least one field: '{}'", trimmed),
        };
        let from_clause = find_clause(
            &flat,
            "FROM",
            &["WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT"],
        );
        let where_clause =
            find_clause(&flat, "WHERE", &["GROUP BY", "HAVING", "ORDER BY", "LIMIT"]);
        let group_clause = find_clause(&flat, "GROUP BY", &["HAVING", "ORDER BY", "LIMIT"]);
        let having_clause = find_clause(&flat, "HAVING", &["ORDER BY", "LIMIT"]);
        let order_clause = find_clause(&flat, "ORDER BY", &["LIMIT"]);
        let limit_clause = find_clause(&flat, "LIMIT", &[]);

        let (namespace, service_name, service_alias) = match &from_clause {
            Some(clause) => resolve_from_clause(clause)?,
            None => (None, DUAL_SERVICE.to_string(), DUAL_SERVICE.to_string()),
        };

        let limit = match &limit_clause {
            Some(clause) => Some(SqlLimit::parse(clause)?),
            None => None,
        };

        debug!(target: "thinsql::sql", "statement for service '{}' (alias '{}'): select='{}' where={:?} group={:?} having={:?} order={:?} limit={:?}",
            service_name, service_alias, select_clause, where_clause, group_clause, having_clause, order_clause, limit);

        Ok(SqlStatement {
            sql: sql.to_string(),
            namespace,
            service_name,
            service_alias,
            select_clause,
            from_clause,
            where_clause,
            group_clause,
            having_clause,
            order_clause,
            limit_clause,
            limit,
            select_fields: None,
            where_condition: None,
            group_fields: None,
            having_condition: None,
            order_fields: None,
        })
    }

    /// Bind the split clauses to a service row layout. Idempotent for the
    /// same `row`; a failed bind leaves previously bound clauses untouched.
    pub fn parse(&mut self, row: &RowMeta) -> Result<()> {
        let select_fields =
            SqlFields::parse(&self.service_alias, &self.select_clause, row, false, None)?;
        let where_condition = match &self.where_clause {
            Some(clause) => Some(SqlCondition::new(&self.service_alias, clause, row)?),
            None => None,
        };
        let group_fields = match &self.group_clause {
            Some(clause) => Some(SqlFields::parse(&self.service_alias, clause, row, false, None)?),
            None => None,
        };
        let having_condition = match &self.having_clause {
            Some(clause) => Some(SqlCondition::with_select_fields(
                &self.service_alias,
                clause,
                row,
                &select_fields,
            )?),
            None => None,
        };
        let order_fields = match &self.order_clause {
            Some(clause) => {
                Some(SqlFields::parse(&self.service_alias, clause, row, true, Some(&select_fields))?)
            }
            None => None,
        };

        self.select_fields = Some(select_fields);
        self.where_condition = where_condition;
        self.group_fields = group_fields;
        self.having_condition = having_condition;
        self.order_fields = order_fields;
        Ok(())
    }

    /// Parameter name/value pairs from PARAMETER() pseudo-conditions in the
    /// WHERE and HAVING clauses, in tree order.
    pub fn parameters(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        if let Some(condition) = &self.where_condition {
            out.extend(condition.condition().parameters());
        }
        if let Some(condition) = &self.having_condition {
            out.extend(condition.condition().parameters());
        }
        out
    }

    pub fn uses_dual(&self) -> bool {
        self.service_name.eq_ignore_ascii_case(DUAL_SERVICE)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_alias(&self) -> &str {
        &self.service_alias
    }

    pub fn select_clause(&self) -> &str {
        &self.select_clause
    }

    pub fn from_clause(&self) -> Option<&str> {
        self.from_clause.as_deref()
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn group_clause(&self) -> Option<&str> {
        self.group_clause.as_deref()
    }

    pub fn having_clause(&self) -> Option<&str> {
        self.having_clause.as_deref()
    }

    pub fn order_clause(&self) -> Option<&str> {
        self.order_clause.as_deref()
    }

    pub fn limit_clause(&self) -> Option<&str> {
        self.limit_clause.as_deref()
    }

    pub fn limit(&self) -> Option<SqlLimit> {
        self.limit
    }

    pub fn select_fields(&self) -> Option<&SqlFields> {
        self.select_fields.as_ref()
    }

    pub fn where_condition(&self) -> Option<&SqlCondition> {
        self.where_condition.as_ref()
    }

    pub fn group_fields(&self) -> Option<&SqlFields> {
        self.group_fields.as_ref()
    }

    pub fn having_condition(&self) -> Option<&SqlCondition> {
        self.having_condition.as_ref()
    }

    pub fn order_fields(&self) -> Option<&SqlFields> {
        self.order_fields.as_ref()
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// FROM accepts `service`, `namespace.service` and an optional alias, bare
/// or introduced by AS. Name parts may be double-quoted.
fn resolve_from_clause(from: &str) -> Result<(Option<String>, String, String)> {
    let tokens = split_tokens(from)?;
    let (table_part, alias_part) = match tokens.as_slice() {
        [] => bail!("Empty FROM clause"),
        [table] => (table.clone(), None),
        [_, keyword] if keyword.eq_ignore_ascii_case("AS") => {
            bail!("Missing alias after AS in FROM clause '{}'", from.trim())
        }
        [table, alias] => (table.clone(), Some(alias.clone())),
        [table, keyword, alias] if keyword.eq_ignore_ascii_case("AS") => {
            (table.clone(), Some(alias.clone()))
        }
        [_, _, _] => bail!("Expected AS before the alias in FROM clause '{}'", from.trim()),
        _ => bail!("Unable to parse FROM clause '{}': too many tokens", from.trim()),
    };

    let parts = split_clause(&table_part, '.', '"')?;
    let (namespace, service_token) = match parts.as_slice() {
        [service] => (None, service.as_str()),
        [namespace, service] => (Some(strip_quotes(namespace, '"').to_string()), service.as_str()),
        _ => bail!(
            "Unable to parse FROM clause '{}': at most one namespace qualifier is supported",
            from.trim()
        ),
    };

    let service_name = strip_quotes(service_token, '"').to_string();
    if service_name.is_empty() {
        bail!("Empty service name in FROM clause '{}'", from.trim());
    }
    let service_alias = match alias_part {
        Some(alias) => strip_quotes(&alias, '"').to_string(),
        None => service_name.clone(),
    };
    Ok((namespace, service_name, service_alias))
}
