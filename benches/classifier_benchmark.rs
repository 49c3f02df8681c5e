use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sentiflow::features::{TfidfOptions, TfidfTransform};
use sentiflow::{Algorithm, Classifier, NormalizeOptions, Record};

const POSITIVE_WORDS: [&str; 8] = [
    "great", "excellent", "wonderful", "brilliant", "loved", "superb", "charming", "moving",
];
const NEGATIVE_WORDS: [&str; 8] = [
    "awful", "terrible", "boring", "dull", "hated", "tedious", "bland", "painful",
];
const FILLER: [&str; 8] = ["the", "film", "plot", "cast", "was", "really", "story", "acting"];

/// Deterministic synthetic corpus alternating positive and negative reviews.
fn synthetic_corpus(size: usize) -> Vec<Record> {
    (0..size)
        .map(|i| {
            let (words, label) = if i % 2 == 0 {
                (&POSITIVE_WORDS, "positive")
            } else {
                (&NEGATIVE_WORDS, "negative")
            };
            let text = format!(
                "{} {} {} {} {}",
                FILLER[i % FILLER.len()],
                words[i % words.len()],
                FILLER[(i / 3) % FILLER.len()],
                words[(i / 5) % words.len()],
                FILLER[(i / 7) % FILLER.len()],
            );
            Record::new(text, label)
        })
        .collect()
}

fn train(records: &[Record], algorithm: Algorithm) -> Classifier {
    Classifier::builder()
        .with_algorithm(algorithm)
        .add_records(records.to_vec())
        .unwrap()
        .build()
        .unwrap()
}

const SHORT: &str = "What a GREAT film!";
const LONG: &str = "This is a much longer review that rambles on about the plot, the cast \
    and the soundtrack. The acting was brilliant in places, dull in others, and the \
    story never quite decided whether it wanted to be moving or merely charming. \
    Still, I loved the ending; 8/10 would watch again!";

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Normalization");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let options = NormalizeOptions::standard().with_remove_numbers(true);
    group.bench_function("short_text", |b| b.iter(|| options.normalize(black_box(SHORT))));
    group.bench_function("long_text", |b| b.iter(|| options.normalize(black_box(LONG))));

    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("Features");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let texts: Vec<String> = synthetic_corpus(1_000).into_iter().map(|r| r.text).collect();
    for ngram_max in [1, 2] {
        let options = TfidfOptions {
            ngram_max,
            ..TfidfOptions::default()
        };
        group.bench_function(BenchmarkId::new("fit", ngram_max), |b| {
            b.iter(|| TfidfTransform::fit(black_box(&texts), &options).unwrap())
        });

        let transform = TfidfTransform::fit(&texts, &options).unwrap();
        let long = NormalizeOptions::standard().normalize(LONG);
        group.bench_function(BenchmarkId::new("transform", ngram_max), |b| {
            b.iter(|| transform.transform(black_box(&long)))
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prediction");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let corpus = synthetic_corpus(500);
    let text = NormalizeOptions::standard().normalize(LONG);
    for algorithm in Algorithm::ALL {
        let classifier = train(&corpus, algorithm);
        group.bench_function(format!("predict_{}", algorithm), |b| {
            b.iter(|| classifier.predict(black_box(&text)).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(10);
    group.warm_up_time(std::time::Duration::from_secs(1));

    // Scaling with corpus size
    for size in [100, 1_000] {
        let corpus = synthetic_corpus(size);
        for algorithm in Algorithm::ALL {
            group.bench_with_input(
                BenchmarkId::new(algorithm.as_str(), size),
                &corpus,
                |b, corpus| b.iter(|| train(black_box(corpus), algorithm)),
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_normalization,
    bench_features,
    bench_prediction,
    bench_training
);
criterion_main!(benches);
