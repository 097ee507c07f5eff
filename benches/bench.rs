use criterion::{criterion_group, criterion_main, Criterion};
use safeyaml::{yaml_emitter_dump, yaml_emitter_new, yaml_emitter_set_output, Document, Parser};

static VERY_LARGE_YAML: &[u8] = include_bytes!("very_large.yml");

pub fn parser(c: &mut Criterion) {
    c.bench_function("safeyaml parse large", |b| {
        b.iter(|| {
            let mut input = VERY_LARGE_YAML;
            let mut parser = Parser::new();
            parser.set_input_string(&mut input);
            Document::load(&mut parser)
        })
    });

    c.bench_function("safeyaml emit large", |b| {
        let mut input = VERY_LARGE_YAML;
        let mut parser = Parser::new();
        parser.set_input_string(&mut input);
        let doc = Document::load(&mut parser).unwrap();

        b.iter_custom(|iters| {
            let mut measurement = std::time::Duration::ZERO;
            for _ in 0..iters {
                let mut doc = doc.clone();
                let mut buffer = Vec::with_capacity(VERY_LARGE_YAML.len());
                let start_time = std::time::Instant::now();
                let mut emitter = yaml_emitter_new();
                yaml_emitter_set_output(&mut emitter, &mut buffer);
                yaml_emitter_dump(&mut emitter, &mut doc).unwrap();
                measurement += start_time.elapsed();
            }
            measurement
        });
    });
}

criterion_group!(benches, parser);
criterion_main!(benches);
