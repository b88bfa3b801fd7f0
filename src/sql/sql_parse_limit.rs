use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// Row cap with optional offset. An absent LIMIT clause is represented by
/// the statement holding no `SqlLimit` at all, so `limit: 0` always means
/// "return zero rows".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlLimit {
    pub limit: u64,
    pub offset: u64,
}

impl SqlLimit {
    pub fn new(limit: u64, offset: u64) -> SqlLimit {
        SqlLimit { limit, offset }
    }

    /// Accepts `count`, `offset, count` and `count OFFSET skip`.
    pub fn parse(clause: &str) -> Result<SqlLimit> {
        let trimmed = clause.trim();
        if trimmed.is_empty() {
            bail!("LIMIT clause has no row count");
        }
        if let Some((first, second)) = trimmed.split_once(',') {
            let offset = parse_count(first)?;
            let limit = parse_count(second)?;
            return Ok(SqlLimit { limit, offset });
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        match tokens.as_slice() {
            [count] => Ok(SqlLimit { limit: parse_count(count)?, offset: 0 }),
            [count, keyword, skip] if keyword.eq_ignore_ascii_case("OFFSET") => {
                Ok(SqlLimit { limit: parse_count(count)?, offset: parse_count(skip)? })
            }
            _ => bail!("Unable to parse LIMIT clause '{}'", trimmed),
        }
    }
}

fn parse_count(token: &str) -> Result<u64> {
    let token = token.trim();
    token
        .parse::<u64>()
        .map_err(|_| anyhow!("'{}' is not a valid row count in a LIMIT clause", token))
}
