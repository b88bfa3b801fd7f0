use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use thinsql::row::{RowMeta, ValueMeta, ValueType};
use thinsql::sql::{SqlCondition, SqlStatement};

fn bench_row(columns: usize) -> RowMeta {
    let mut row = RowMeta::new();
    for i in 0..columns {
        let value_type = match i % 4 {
            0 => ValueType::Integer,
            1 => ValueType::Number,
            2 => ValueType::String,
            _ => ValueType::Date,
        };
        row.add(ValueMeta::new(&format!("col{}", i), value_type));
    }
    row
}

// Deterministic WHERE clause with a mix of comparisons, groups and boolean
// operators, shaped like what a report designer generates.
fn where_clause(terms: usize, columns: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sql = String::with_capacity(terms * 32);
    for t in 0..terms {
        if t > 0 {
            sql.push_str(if rng.gen::<u32>() % 4 == 0 { " OR " } else { " AND " });
        }
        let col = (rng.gen::<u32>() as usize) % columns;
        match col % 4 {
            0 => sql.push_str(&format!("col{} > {}", col, rng.gen::<u32>() % 1000)),
            1 => sql.push_str(&format!("col{} <= {:.3}", col, rng.gen::<f64>() * 100.0)),
            2 => sql.push_str(&format!("col{} LIKE '%v{}%'", col, rng.gen::<u32>() % 50)),
            _ => sql.push_str(&format!("(col{} IS NOT NULL OR col{} = col{})", col, col, col)),
        }
    }
    sql
}

fn bench_parse(c: &mut Criterion) {
    let term_counts = [8usize, 64, 256];
    let columns = 16usize;
    let row = bench_row(columns);

    let mut group = c.benchmark_group("sql_parse");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(30);

    for &terms in &term_counts {
        let clause = where_clause(terms, columns, 0x51AB_0001);
        let sql = format!(
            "SELECT col0, col1, SUM(col1) AS s FROM svc WHERE {} GROUP BY col0, col1 ORDER BY s DESC LIMIT 100",
            clause
        );

        group.throughput(Throughput::Elements(terms as u64));
        group.bench_with_input(BenchmarkId::new("split_clauses", terms), &sql, |b, sql| {
            b.iter(|| SqlStatement::new(sql).expect("split"));
        });
        group.bench_with_input(BenchmarkId::new("split_and_bind", terms), &sql, |b, sql| {
            b.iter(|| {
                let mut stmt = SqlStatement::new(sql).expect("split");
                stmt.parse(&row).expect("bind");
                stmt
            });
        });
        group.bench_with_input(
            BenchmarkId::new("condition_tree", terms),
            &clause,
            |b, clause| {
                b.iter(|| SqlCondition::new("svc", clause, &row).expect("condition"));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
