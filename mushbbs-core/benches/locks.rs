use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mushbbs_core::lock::{LockExpr, LockFacts};
use mushbbs_core::testing::acting;
use mushbbs_core::PermissionContext;
use std::collections::BTreeSet;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", "all()"),
    ("identity", "admin(3) | name(Herald) | user(alice)"),
    (
        "faction",
        "(faction(K) & !rank(K, 6)) | fperm(K, bbadmin) | (faction(S) & fperm(S, post))",
    ),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("LockExpr::parse");
    for (name, expr) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::from_parameter(name), expr, |b, expr| {
            b.iter(|| LockExpr::parse(black_box(expr)).unwrap());
        });
    }
    group.finish();
}

fn bench_eval(c: &mut Criterion) {
    let actor = acting("alice", "Alys", 1);
    let standing = PermissionContext {
        rank: 4,
        permissions: BTreeSet::from(["post".to_string()]),
    };
    let facts = LockFacts::new(&actor)
        .with_faction("k", Some(standing.clone()))
        .with_faction("s", Some(standing));

    let mut group = c.benchmark_group("LockFacts::eval");
    for (name, expr) in EXPRESSIONS {
        let compiled = LockExpr::parse(expr).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &compiled, |b, compiled| {
            b.iter(|| black_box(facts.eval(compiled)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_eval);
criterion_main!(benches);
