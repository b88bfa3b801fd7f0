use anyhow::{bail, Result};

/// Replace line breaks with spaces so clause scanning sees a single line.
/// Length is preserved, keeping byte indices aligned with the input.
pub fn flatten_lines(sql: &str) -> String {
    sql.chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect()
}

fn on_word_boundary(bytes: &[u8], start: usize, len: usize) -> bool {
    let prev_ok = if start == 0 {
        true
    } else {
        let pc = bytes[start - 1] as char;
        !(pc.is_alphanumeric() || pc == '_')
    };
    let next_ok = if start + len >= bytes.len() {
        true
    } else {
        let nc = bytes[start + len] as char;
        !(nc.is_alphanumeric() || nc == '_')
    };
    prev_ok && next_ok
}

/// First occurrence of `needle` at parenthesis depth 0 and outside quoted
/// regions, case-insensitive, scanning from byte offset `from`. With
/// `whole_word` the match must additionally sit on identifier boundaries so
/// a keyword never matches inside a longer name.
pub fn index_of_top_level(s: &str, needle: &str, from: usize, whole_word: bool) -> Option<usize> {
    let sb = s.as_bytes();
    let nb = needle.as_bytes();
    if nb.is_empty() {
        return None;
    }
    let mut i = from;
    let mut depth: i32 = 0;
    let mut in_squote = false;
    let mut in_dquote = false;
    while i < sb.len() {
        let ch = sb[i] as char;
        if ch == '\'' && !in_dquote {
            in_squote = !in_squote;
            i += 1;
            continue;
        }
        if ch == '"' && !in_squote {
            in_dquote = !in_dquote;
            i += 1;
            continue;
        }
        if !in_squote && !in_dquote {
            if ch == '(' {
                depth += 1;
                i += 1;
                continue;
            }
            if ch == ')' {
                depth -= 1;
                i += 1;
                continue;
            }
            if depth == 0
                && i + nb.len() <= sb.len()
                && sb[i..i + nb.len()].eq_ignore_ascii_case(nb)
                && (!whole_word || on_word_boundary(sb, i, nb.len()))
            {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Extract the text between the clause keyword `start` and the nearest of
/// the `terminators` that follows it. Keywords match case-insensitively as
/// whole words, at depth 0 and outside quotes, so a WHERE clause containing
/// the literal 'FROM the start' is never cut short. Returns None when
/// `start` does not occur; the clause runs to the end of the statement when
/// no terminator follows.
pub fn find_clause(sql: &str, start: &str, terminators: &[&str]) -> Option<String> {
    let begin = index_of_top_level(sql, start, 0, true)?;
    let after = begin + start.len();
    let mut end = sql.len();
    for term in terminators {
        if let Some(i) = index_of_top_level(sql, term, after, true) {
            end = end.min(i);
        }
    }
    Some(sql[after..end].trim().to_string())
}

/// Split on every top-level occurrence of `sep`, case-insensitive. Segments
/// are trimmed. `whole_word` guards alphabetic separators against matching
/// inside identifiers; separators already padded with spaces don't need it.
pub fn split_on_top_level(clause: &str, sep: &str, whole_word: bool) -> Vec<String> {
    let mut out = Vec::new();
    let mut from = 0usize;
    while let Some(i) = index_of_top_level(clause, sep, from, whole_word) {
        out.push(clause[from..i].trim().to_string());
        from = i + sep.len();
    }
    out.push(clause[from..].trim().to_string());
    out
}

/// Advance past a quoted or parenthesized region starting at `index`.
/// Returns the index just after the region, or `index` unchanged when the
/// character there opens none of `skip`. An unterminated region is an error.
pub fn skip_chars(clause: &str, index: usize, skip: &[char]) -> Result<usize> {
    let bytes = clause.as_bytes();
    if index >= bytes.len() {
        return Ok(index);
    }
    let open = bytes[index] as char;
    if !skip.contains(&open) {
        return Ok(index);
    }
    if open == '(' {
        let mut depth: i32 = 0;
        let mut in_squote = false;
        let mut in_dquote = false;
        let mut i = index;
        while i < bytes.len() {
            let ch = bytes[i] as char;
            if ch == '\'' && !in_dquote {
                in_squote = !in_squote;
            } else if ch == '"' && !in_squote {
                in_dquote = !in_dquote;
            } else if !in_squote && !in_dquote {
                if ch == '(' {
                    depth += 1;
                } else if ch == ')' {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
            }
            i += 1;
        }
        bail!("No closing parenthesis found in '{}'", clause);
    }
    let mut i = index + 1;
    while i < bytes.len() {
        if bytes[i] as char == open {
            return Ok(i + 1);
        }
        i += 1;
    }
    bail!("No closing quote ({}) found in '{}'", open, clause)
}

fn split_skipping(clause: &str, delimiter: char, skip: &[char]) -> Result<Vec<String>> {
    debug_assert!(delimiter.is_ascii());
    let bytes = clause.as_bytes();
    let mut out = Vec::new();
    let mut seg_start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let skipped = skip_chars(clause, i, skip)?;
        if skipped != i {
            i = skipped;
            continue;
        }
        if bytes[i] as char == delimiter {
            out.push(clause[seg_start..i].trim().to_string());
            seg_start = i + 1;
        }
        i += 1;
    }
    out.push(clause[seg_start..].trim().to_string());
    Ok(out)
}

/// Split on a single-character delimiter, ignoring delimiters inside
/// parentheses or inside `quote`-delimited regions. Tokens are trimmed.
pub fn split_clause(clause: &str, delimiter: char, quote: char) -> Result<Vec<String>> {
    split_skipping(clause, delimiter, &[quote, '('])
}

/// Whitespace tokenization honoring both quote kinds and parentheses.
/// Consecutive spaces yield no empty tokens.
pub fn split_tokens(clause: &str) -> Result<Vec<String>> {
    let parts = split_skipping(clause, ' ', &['\'', '"', '('])?;
    Ok(parts.into_iter().filter(|p| !p.is_empty()).collect())
}

/// Remove exactly one matching pair of leading and trailing quotes.
pub fn strip_quotes(token: &str, quote: char) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 && bytes[0] as char == quote && bytes[bytes.len() - 1] as char == quote {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Remove a leading `alias.` or `"alias".` qualifier, case-insensitive.
pub fn strip_table_alias<'a>(token: &'a str, alias: &str) -> &'a str {
    if alias.is_empty() {
        return token;
    }
    let tb = token.as_bytes();
    let ab = alias.as_bytes();
    if tb.len() > ab.len() + 1 && tb[..ab.len()].eq_ignore_ascii_case(ab) && tb[ab.len()] == b'.' {
        return &token[ab.len() + 1..];
    }
    if tb.len() > ab.len() + 3
        && tb[0] == b'"'
        && tb[1..=ab.len()].eq_ignore_ascii_case(ab)
        && tb[ab.len() + 1] == b'"'
        && tb[ab.len() + 2] == b'.'
    {
        return &token[ab.len() + 3..];
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_of_top_level_skips_quotes_and_parens() {
        let s = "a = 'x OR y' OR (b OR c) OR d";
        let first = index_of_top_level(s, "OR", 0, true).expect("top-level OR");
        assert_eq!(&s[first..first + 2], "OR");
        assert_eq!(first, 13, "first OR outside quotes and parens");
        let next = index_of_top_level(s, "OR", first + 2, true).expect("second top-level OR");
        assert_eq!(next, 25);
    }

    #[test]
    fn test_index_of_top_level_whole_word() {
        assert_eq!(index_of_top_level("CUSTFROM x", "FROM", 0, true), None);
        assert_eq!(index_of_top_level("FROMAGE x", "FROM", 0, true), None);
        assert_eq!(index_of_top_level("x FROM y", "FROM", 0, true), Some(2));
        // without the word guard the embedded match is found
        assert_eq!(index_of_top_level("CUSTFROM x", "FROM", 0, false), Some(4));
    }

    #[test]
    fn test_find_clause_extracts_between_keywords() {
        let sql = "SELECT a, b FROM svc WHERE a > 1 ORDER BY b";
        assert_eq!(find_clause(sql, "SELECT", &["FROM"]), Some("a, b".to_string()));
        assert_eq!(
            find_clause(sql, "FROM", &["WHERE", "ORDER BY"]),
            Some("svc".to_string())
        );
        assert_eq!(find_clause(sql, "WHERE", &["ORDER BY"]), Some("a > 1".to_string()));
        assert_eq!(find_clause(sql, "ORDER BY", &[]), Some("b".to_string()));
        assert_eq!(find_clause(sql, "GROUP BY", &["ORDER BY"]), None);
    }

    #[test]
    fn test_find_clause_ignores_keyword_in_literal() {
        let sql = "SELECT a FROM svc WHERE name = 'FROM the start'";
        assert_eq!(find_clause(sql, "FROM", &["WHERE"]), Some("svc".to_string()));
        assert_eq!(
            find_clause(sql, "WHERE", &[]),
            Some("name = 'FROM the start'".to_string())
        );
    }

    #[test]
    fn test_split_on_top_level_returns_all_segments() {
        let segments = split_on_top_level("a = 1 AND (b = 2 AND c = 3) AND d = 4", " AND ", false);
        assert_eq!(segments, vec!["a = 1", "(b = 2 AND c = 3)", "d = 4"]);
        let single = split_on_top_level("a = 1", " AND ", false);
        assert_eq!(single, vec!["a = 1"]);
    }

    #[test]
    fn test_split_clause_honors_quotes_and_parens() {
        let parts = split_clause("a, fn(b, c), 'x,y'", ',', '\'').expect("split");
        assert_eq!(parts, vec!["a", "fn(b, c)", "'x,y'"]);
    }

    #[test]
    fn test_split_tokens_keeps_regions_together() {
        let tokens = split_tokens("COUNT( * )  AS  \"row count\"").expect("tokens");
        assert_eq!(tokens, vec!["COUNT( * )", "AS", "\"row count\""]);
    }

    #[test]
    fn test_skip_chars_nested_and_unterminated() {
        assert_eq!(skip_chars("(a(b)c) rest", 0, &['(']).expect("nested parens"), 7);
        assert_eq!(skip_chars("'ab' rest", 0, &['\'']).expect("quote region"), 4);
        assert_eq!(skip_chars("plain", 0, &['(', '\'']).expect("no region"), 0);
        assert!(skip_chars("(never closed", 0, &['(']).is_err());
        assert!(skip_chars("'never closed", 0, &['\'']).is_err());
    }

    #[test]
    fn test_skip_chars_ignores_parens_inside_quotes() {
        // the closing paren inside the string literal must not count
        assert_eq!(skip_chars("(a = '(' ) rest", 0, &['(']).expect("skip"), 10);
    }

    #[test]
    fn test_strip_quotes_exactly_one_pair() {
        assert_eq!(strip_quotes("'abc'", '\''), "abc");
        assert_eq!(strip_quotes("''", '\''), "");
        assert_eq!(strip_quotes("'abc", '\''), "'abc");
        assert_eq!(strip_quotes("abc", '\''), "abc");
        assert_eq!(strip_quotes("''abc''", '\''), "'abc'");
        assert_eq!(strip_quotes("\"name\"", '"'), "name");
    }

    #[test]
    fn test_strip_table_alias_variants() {
        assert_eq!(strip_table_alias("svc.field", "svc"), "field");
        assert_eq!(strip_table_alias("SVC.field", "svc"), "field");
        assert_eq!(strip_table_alias("\"svc\".field", "svc"), "field");
        assert_eq!(strip_table_alias("other.field", "svc"), "other.field");
        assert_eq!(strip_table_alias("field", "svc"), "field");
    }

    #[test]
    fn test_flatten_lines_preserves_length() {
        let sql = "SELECT a\nFROM svc\r\nWHERE a > 1";
        let flat = flatten_lines(sql);
        assert_eq!(flat.len(), sql.len());
        assert!(!flat.contains('\n') && !flat.contains('\r'));
    }
}
