use thinsql::row::{RowMeta, ValueMeta, ValueType};
use thinsql::sql::{BoolOp, CompareOp, SqlStatement, TypedValue};

// Initialize tracing subscriber (honor RUST_LOG if set)
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn orders_row() -> RowMeta {
    let mut row = RowMeta::new();
    row.add(ValueMeta::new("ordertype", ValueType::String));
    row.add(ValueMeta::new("customer", ValueType::String));
    row.add(ValueMeta::new("country", ValueType::String));
    row.add(ValueMeta::new("product", ValueType::String));
    row.add(ValueMeta::new("quantity", ValueType::Integer));
    row.add(ValueMeta::new("price", ValueType::Number));
    row.add(ValueMeta::new("orderdate", ValueType::Date));
    row.add(ValueMeta::new("shipped", ValueType::Boolean));
    row
}

#[test]
fn bi_tool_shaped_statement_end_to_end() {
    init_logs();
    // the kind of SQL a report designer generates against one service
    let sql = "SELECT \"orders\".\"country\" AS \"c\", SUM(\"orders\".\"price\") AS \"revenue\" \
               FROM \"orders\" \
               WHERE \"orders\".\"shipped\" = TRUE AND (\"orders\".\"quantity\" > 10 OR \"orders\".\"price\" >= 250.0) \
               GROUP BY \"orders\".\"country\" \
               HAVING SUM(\"orders\".\"price\") > 1000 \
               ORDER BY \"revenue\" DESC \
               LIMIT 100";
    let mut stmt = SqlStatement::new(sql).expect("construct statement");
    assert_eq!(stmt.service_name(), "orders");
    assert_eq!(stmt.service_alias(), "orders");

    stmt.parse(&orders_row()).expect("bind to row");

    let select = stmt.select_fields().expect("select fields");
    assert_eq!(select.len(), 2);
    assert_eq!(select.fields()[0].alias.as_deref(), Some("c"));
    assert_eq!(select.fields()[0].name, "country");
    assert_eq!(select.fields()[1].name, "price");
    assert!(select.fields()[1].is_aggregate());

    let where_root = stmt.where_condition().expect("where").condition().clone();
    let root = where_root.as_compound().expect("AND root");
    assert_eq!(root.operator, BoolOp::And);
    assert_eq!(root.children.len(), 2);
    let shipped = root.children[0].as_atomic().expect("shipped atom");
    assert_eq!(shipped.left_field, "shipped");
    assert_eq!(shipped.right_value, Some(TypedValue::Bool(true)));
    let nested = root.children[1].as_compound().expect("nested OR");
    assert_eq!(nested.operator, BoolOp::Or);

    let having = stmt.having_condition().expect("having").condition().clone();
    let h = having.as_atomic().expect("having atom");
    assert_eq!(h.left_field, "revenue", "HAVING aggregate resolves to the select alias");
    assert_eq!(h.function, CompareOp::Larger);

    let order = stmt.order_fields().expect("order fields");
    assert_eq!(order.fields()[0].name, "price", "ORDER BY alias adopts the select expression");
    assert!(!order.fields()[0].ascending);

    let limit = stmt.limit().expect("limit");
    assert_eq!((limit.limit, limit.offset), (100, 0));
}

#[test]
fn multiline_statement_parses_like_single_line() {
    let sql = "SELECT customer, quantity\nFROM orders\nWHERE country = 'France'\r\nORDER BY customer";
    let mut stmt = SqlStatement::new(sql).expect("multiline statement");
    stmt.parse(&orders_row()).expect("bind");
    assert_eq!(stmt.where_clause(), Some("country = 'France'"));
    assert_eq!(stmt.order_clause(), Some("customer"));
    assert_eq!(stmt.select_fields().expect("fields").len(), 2);
}

#[test]
fn parameters_surface_through_the_statement() {
    let sql = "SELECT customer FROM orders WHERE PARAMETER('region') = 'EMEA' AND country = 'France'";
    let mut stmt = SqlStatement::new(sql).expect("statement");
    stmt.parse(&orders_row()).expect("bind");
    assert_eq!(stmt.parameters(), vec![("region", "EMEA")]);
}

#[test]
fn in_list_with_escapes_survives_binding() {
    let sql = "SELECT customer FROM orders WHERE country IN ('France', 'U;K', 'It''aly')";
    let mut stmt = SqlStatement::new(sql).expect("statement");
    stmt.parse(&orders_row()).expect("bind");
    let atom = stmt
        .where_condition()
        .expect("where")
        .condition()
        .as_atomic()
        .expect("IN atom")
        .clone();
    assert_eq!(atom.function, CompareOp::InList);
    assert_eq!(
        atom.right_value.as_ref().and_then(|v| v.as_str()),
        Some("France;U\\;K;It'aly")
    );
}

#[test]
fn statement_serializes_and_round_trips() {
    let mut stmt = SqlStatement::new(
        "SELECT country, COUNT(*) AS n FROM orders GROUP BY country ORDER BY n DESC LIMIT 5",
    )
    .expect("statement");
    stmt.parse(&orders_row()).expect("bind");

    let encoded = serde_json::to_string(&stmt).expect("serialize statement");
    let decoded: SqlStatement = serde_json::from_str(&encoded).expect("deserialize statement");
    assert_eq!(decoded, stmt, "serde round trip must preserve the parsed statement");
}

#[test]
fn dual_statement_needs_no_service_fields() {
    let mut stmt = SqlStatement::new("SELECT 1").expect("constant select");
    assert_eq!(stmt.service_name(), "dual");
    stmt.parse(&RowMeta::new()).expect("bind to empty row");
    let fields = stmt.select_fields().expect("fields");
    assert_eq!(fields.fields()[0].constant, Some(TypedValue::Int(1)));
}

#[test]
fn error_scenarios_fail_cleanly() {
    // construction-time failures
    assert!(SqlStatement::new("SELECT id FROM a.b.c").is_err(), "three dotted FROM parts");
    assert!(SqlStatement::new("SELECT id FROM orders LIMIT abc").is_err(), "non-numeric LIMIT");
    assert!(SqlStatement::new("DELETE FROM orders").is_err(), "non-SELECT statement");

    // bind-time failures
    let row = orders_row();
    for sql in [
        "SELECT nope FROM orders",
        "SELECT customer FROM orders WHERE PARAMETER('') = 'x'",
        "SELECT customer FROM orders WHERE quantity = 1 = 2",
        "SELECT customer FROM orders WHERE quantity = nope",
        "SELECT customer FROM orders HAVING SUM(nope) > 1",
    ] {
        let mut stmt = SqlStatement::new(sql).expect("clause splitting is schema-free");
        assert!(stmt.parse(&row).is_err(), "bind should fail for: {}", sql);
    }
}

#[test]
fn construction_never_consults_the_schema() {
    // fields that do not exist anywhere still split fine
    let stmt = SqlStatement::new(
        "SELECT ghost FROM phantoms WHERE ghoul = 1 ORDER BY specter",
    )
    .expect("construction is schema-free");
    assert_eq!(stmt.select_clause(), "ghost");
    assert_eq!(stmt.where_clause(), Some("ghoul = 1"));
    assert_eq!(stmt.order_clause(), Some("specter"));
}
