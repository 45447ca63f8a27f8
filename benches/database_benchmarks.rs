//! Benchmarks for the SQL generation paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use recdb::{
    build_where, column_definition, escape_sql, prepare_placeholders, Condition, FieldDescriptor,
    SqlType,
};

fn bench_build_where(c: &mut Criterion) {
    let conditions = vec![
        Condition::eq("name", "user_123"),
        Condition::like("email", "%@example.com"),
        Condition::gt("age", 18),
        Condition::le("age", 65),
        Condition::is_not_null("verified_at"),
        Condition::eq("active", true).or(),
    ];

    c.bench_function("build_where_six_conditions", |b| {
        b.iter(|| build_where(black_box(&conditions)))
    });
}

fn bench_escape_sql(c: &mut Criterion) {
    let text = "O'Brien said \"100% done\"\nnext line\tend";

    c.bench_function("escape_sql_mixed_text", |b| {
        b.iter(|| escape_sql(black_box(text)))
    });
}

fn bench_prepare_placeholders(c: &mut Criterion) {
    let sql = "SELECT * FROM t WHERE a = ?c0 AND b = ?c1 AND c IN (?c2, ?c3) OR d = ?c0";

    c.bench_function("prepare_placeholders_five_refs", |b| {
        b.iter(|| prepare_placeholders(black_box(sql), 4))
    });
}

fn bench_column_definition(c: &mut Criterion) {
    let fields = [
        FieldDescriptor::new("id", SqlType::Custom("VARCHAR(36)")).primary_key(),
        FieldDescriptor::new("name", SqlType::Text).with_size(64),
        FieldDescriptor::new("payload", SqlType::Bytes).with_size(256),
        FieldDescriptor::new("created", SqlType::DateTime),
        FieldDescriptor::new("count", SqlType::BigInt).nullable(),
    ];

    c.bench_function("column_definition_five_fields", |b| {
        b.iter(|| {
            for field in black_box(&fields) {
                let _ = column_definition(field, Some("BINARY"));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_build_where,
    bench_escape_sql,
    bench_prepare_placeholders,
    bench_column_definition
);
criterion_main!(benches);
