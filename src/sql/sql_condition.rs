use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::sql_value::TypedValue;

/// Comparison operator of an atomic condition. `True` tags the synthetic
/// always-true node a PARAMETER pseudo-condition produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Larger,
    LargerEqual,
    Smaller,
    SmallerEqual,
    Like,
    Regexp,
    Contains,
    InList,
    IsNull,
    IsNotNull,
    True,
}

impl CompareOp {
    pub fn is_unary(self) -> bool {
        matches!(self, CompareOp::IsNull | CompareOp::IsNotNull | CompareOp::True)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "<>",
            CompareOp::Larger => ">",
            CompareOp::LargerEqual => ">=",
            CompareOp::Smaller => "<",
            CompareOp::SmallerEqual => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::Regexp => "REGEX",
            CompareOp::Contains => "CONTAINS",
            CompareOp::InList => "IN",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
            CompareOp::True => "TRUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }
}

/// A single comparison. Exactly one of `right_field`/`right_value` is set
/// for binary operators; neither for the unary ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicCondition {
    pub negated: bool,
    pub left_field: String,
    pub function: CompareOp,
    pub right_field: Option<String>,
    pub right_value: Option<TypedValue>,
}

/// One or more child conditions joined by the same boolean operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundCondition {
    pub negated: bool,
    pub operator: BoolOp,
    pub children: Vec<Condition>,
}

/// A node in a boolean expression tree: either a single comparison or a
/// compound of children joined by AND/OR, each side optionally negated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Atomic(AtomicCondition),
    Compound(CompoundCondition),
}

impl Condition {
    pub fn compare_value(left_field: &str, function: CompareOp, value: TypedValue) -> Condition {
        Condition::Atomic(AtomicCondition {
            negated: false,
            left_field: left_field.to_string(),
            function,
            right_field: None,
            right_value: Some(value),
        })
    }

    pub fn compare_field(left_field: &str, function: CompareOp, right_field: &str) -> Condition {
        Condition::Atomic(AtomicCondition {
            negated: false,
            left_field: left_field.to_string(),
            function,
            right_field: Some(right_field.to_string()),
            right_value: None,
        })
    }

    pub fn unary(left_field: &str, function: CompareOp) -> Condition {
        Condition::Atomic(AtomicCondition {
            negated: false,
            left_field: left_field.to_string(),
            function,
            right_field: None,
            right_value: None,
        })
    }

    /// The synthetic always-true node carrying a PARAMETER name/value pair.
    pub fn parameter(name: &str, value: &str) -> Condition {
        Condition::Atomic(AtomicCondition {
            negated: false,
            left_field: name.to_string(),
            function: CompareOp::True,
            right_field: None,
            right_value: Some(TypedValue::Str(value.to_string())),
        })
    }

    pub fn compound(operator: BoolOp, children: Vec<Condition>) -> Condition {
        Condition::Compound(CompoundCondition { negated: false, operator, children })
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Condition::Atomic(_))
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Condition::Atomic(a) => a.negated,
            Condition::Compound(c) => c.negated,
        }
    }

    pub fn negate(&mut self) {
        match self {
            Condition::Atomic(a) => a.negated = !a.negated,
            Condition::Compound(c) => c.negated = !c.negated,
        }
    }

    pub fn as_atomic(&self) -> Option<&AtomicCondition> {
        match self {
            Condition::Atomic(a) => Some(a),
            Condition::Compound(_) => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundCondition> {
        match self {
            Condition::Atomic(_) => None,
            Condition::Compound(c) => Some(c),
        }
    }

    pub fn children(&self) -> &[Condition] {
        match self {
            Condition::Atomic(_) => &[],
            Condition::Compound(c) => &c.children,
        }
    }

    /// Collapse compound nodes with a single child into that child, folding
    /// negation, until a fixed point is reached. Simplification strictly
    /// shrinks the tree, so the loop always terminates; simplifying an
    /// already simplified tree is a no-op.
    pub fn simplify(self) -> Condition {
        let mut node = self;
        loop {
            let (next, changed) = simplify_pass(node);
            node = next;
            if !changed {
                return node;
            }
        }
    }

    /// Name/value pairs of all PARAMETER pseudo-conditions in the tree.
    pub fn parameters(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Condition::Atomic(a) => {
                if a.function == CompareOp::True {
                    let value = a.right_value.as_ref().and_then(|v| v.as_str()).unwrap_or("");
                    out.push((a.left_field.as_str(), value));
                }
            }
            Condition::Compound(c) => {
                for child in &c.children {
                    child.collect_parameters(out);
                }
            }
        }
    }
}

fn simplify_pass(node: Condition) -> (Condition, bool) {
    match node {
        Condition::Atomic(_) => (node, false),
        Condition::Compound(mut compound) => {
            let mut changed = false;
            let mut children = Vec::with_capacity(compound.children.len());
            for child in compound.children {
                let (child, child_changed) = simplify_pass(child);
                changed |= child_changed;
                children.push(child);
            }
            compound.children = children;
            if compound.children.len() == 1 {
                if let Some(mut only) = compound.children.pop() {
                    if compound.negated {
                        only.negate();
                    }
                    return (only, true);
                }
            }
            (Condition::Compound(compound), changed)
        }
    }
}

/// Encode IN-list items into the single semicolon-delimited value stored on
/// an IN_LIST condition. A literal semicolon inside an item becomes `\;`.
pub fn encode_in_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.replace(';', "\\;"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Split an encoded IN_LIST value back into items on unescaped semicolons.
/// Escapes are kept in place; the segments mirror the encoded form.
pub fn split_in_list(encoded: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in encoded.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            ';' => out.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    out.push(current);
    out
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Atomic(a) => {
                if a.negated {
                    write!(f, "NOT ")?;
                }
                match a.function {
                    CompareOp::IsNull | CompareOp::IsNotNull => {
                        write!(f, "{} {}", a.left_field, a.function.symbol())
                    }
                    CompareOp::True => write!(f, "TRUE[{}]", a.left_field),
                    _ => {
                        write!(f, "{} {} ", a.left_field, a.function.symbol())?;
                        if let Some(field) = &a.right_field {
                            write!(f, "{}", field)
                        } else if let Some(value) = &a.right_value {
                            write!(f, "{}", value)
                        } else {
                            Ok(())
                        }
                    }
                }
            }
            Condition::Compound(c) => {
                if c.negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "(")?;
                for (i, child) in c.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", c.operator.keyword())?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}
