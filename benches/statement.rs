use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rhizome::database::statement::{self, StatementKind};
use rhizome::database::{DatabaseType, GuardMode, Identifier, StatementGuard};

fn statement_guard_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement_guard");

    // Setup
    let db = Identifier::database("shop").unwrap();
    let table = Identifier::table("items").unwrap();
    let guard = StatementGuard::new(GuardMode::On, DatabaseType::SQLite);

    group.bench_function("render_insert", |b| {
        b.iter(|| statement::insert(black_box(&db), black_box(&table), black_box("1,'a'")));
    });

    group.bench_function("check_small_insert", |b| {
        let sql = statement::insert(&db, &table, "1,'a'");
        b.iter(|| guard.check(black_box(&sql), StatementKind::Insert).unwrap());
    });

    // Wide rows: 200 columns
    group.bench_function("check_wide_insert", |b| {
        let values = (0..200).map(|i| format!("'value-{}'", i)).collect::<Vec<_>>().join(",");
        let sql = statement::insert(&db, &table, &values);
        b.iter(|| guard.check(black_box(&sql), StatementKind::Insert).unwrap());
    });

    group.bench_function("check_update", |b| {
        let sql = statement::update(&db, &table, "name = 'b', score = score + 1", "id = 1 AND name <> 'c'");
        b.iter(|| guard.check(black_box(&sql), StatementKind::Update).unwrap());
    });

    group.bench_function("reject_smuggled", |b| {
        let sql = statement::delete(&db, &table, "1 = 1; DROP TABLE shop.items");
        b.iter(|| guard.check(black_box(&sql), StatementKind::Delete).unwrap_err());
    });

    group.finish();
}

criterion_group!(benches, statement_guard_benchmark);
criterion_main!(benches);
