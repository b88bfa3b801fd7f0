use serde::{Deserialize, Serialize};

/// Value classes the parser distinguishes when classifying literals and
/// describing row fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Date,
    Boolean,
    Integer,
    Number,
    BigNumber,
}

/// One named, typed field of a service row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMeta {
    pub name: String,
    pub value_type: ValueType,
}

impl ValueMeta {
    pub fn new(name: &str, value_type: ValueType) -> ValueMeta {
        ValueMeta { name: name.to_string(), value_type }
    }
}

/// Ordered row layout of a service. Field lookups are case-insensitive, as
/// SQL identifiers are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMeta {
    fields: Vec<ValueMeta>,
}

impl RowMeta {
    pub fn new() -> RowMeta {
        RowMeta { fields: Vec::new() }
    }

    pub fn add(&mut self, meta: ValueMeta) {
        self.fields.push(meta);
    }

    /// First field whose name matches case-insensitively, or None.
    pub fn search_value_meta(&self, name: &str) -> Option<&ValueMeta> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn fields(&self) -> &[ValueMeta] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_case_insensitive() {
        let mut row = RowMeta::new();
        row.add(ValueMeta::new("CustomerName", ValueType::String));
        row.add(ValueMeta::new("total", ValueType::Number));
        let meta = row.search_value_meta("customername").expect("find field");
        assert_eq!(meta.name, "CustomerName");
        assert_eq!(meta.value_type, ValueType::String);
        assert!(row.search_value_meta("missing").is_none());
    }

    #[test]
    fn fields_keep_declaration_order() {
        let mut row = RowMeta::new();
        row.add(ValueMeta::new("b", ValueType::Integer));
        row.add(ValueMeta::new("a", ValueType::Integer));
        assert_eq!(row.field_names(), vec!["b", "a"]);
        assert_eq!(row.len(), 2);
    }
}
