// Benchmarks for the pattern engine and a whole-program rewrite.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tame_core::{new_strict, parse_program, MessageQueue, QuasiBuilder};

const PROGRAM: &str = r#"
var total = 0;
function add(a, b) { return a + b; }
function Counter(start) { this.count = start; }
Counter.prototype.step = function () { this.count = add(this.count, 1); };
var c = new Counter(0);
for (var i = 0; i < 100; i++) { c.step(); }
total = c.count;
"#;

fn bench_pattern_match(c: &mut Criterion) {
    let program = parse_program("a.b(1, 2);").unwrap();
    let specimen = &program.children[0].children[0];
    let pattern = QuasiBuilder::compile("@o.@m(@args*)").unwrap();
    c.bench_function("quasi_match_call", |b| {
        b.iter(|| black_box(pattern.match_here(black_box(specimen))))
    });
}

fn bench_pattern_search(c: &mut Criterion) {
    let program = parse_program(PROGRAM).unwrap();
    let pattern = QuasiBuilder::compile("@x + @y").unwrap();
    c.bench_function("quasi_search_program", |b| {
        b.iter(|| black_box(pattern.search(black_box(&program))))
    });
}

fn bench_strict_rewrite(c: &mut Criterion) {
    let program = parse_program(PROGRAM).unwrap();
    let chain = new_strict();
    c.bench_function("strict_rewrite_program", |b| {
        b.iter(|| {
            let mut messages = MessageQueue::new();
            black_box(chain.rewrite(black_box(&program), &mut messages))
        })
    });
}

criterion_group!(
    benches,
    bench_pattern_match,
    bench_pattern_search,
    bench_strict_rewrite
);
criterion_main!(benches);
