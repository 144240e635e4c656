use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glipso::{Environment, load_prelude, parse_str, run, tokenize};

const BENCH_PROGRAM: &str = r#"
; Sums of filtered and mapped sequences
(do
  (defn even [x] (= 0 (% x 2)))
  (defn square [x] (* x x))
  (def evens (filter even (cons 1 (cons 2 (cons 3 (cons 4 (cons 5 (cons 6))))))))
  (def from (fn [n] (lazypair n (from (+ n 1)))))
  (+ (apply + (map square evens))
     (apply + (take 50 (from 1)))
     (apply + (range 1 200))))
"#;

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");

    group.bench_with_input(
        BenchmarkId::new("tokenize", "program"),
        &BENCH_PROGRAM,
        |b, input| b.iter(|| tokenize(black_box(input))),
    );

    group.bench_with_input(
        BenchmarkId::new("parse", "program"),
        &BENCH_PROGRAM,
        |b, input| b.iter(|| parse_str(black_box(input))),
    );

    group.bench_with_input(
        BenchmarkId::new("evaluate", "program"),
        &BENCH_PROGRAM,
        |b, input| {
            b.iter(|| {
                let env = Environment::new();
                // The prelude is tiny and always parses
                let _ = load_prelude(&env);
                run(black_box(input), &env)
            })
        },
    );

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
