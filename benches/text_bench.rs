//! Text generator, SSE decoding and percentile benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gatewayprobe::services::sse::SseDecoder;
use gatewayprobe::services::stress::{percentile, LatencySummary};
use gatewayprobe::utils::logging::create_request_log_summary;
use gatewayprobe::utils::text::{estimate_tokens, long_context, stress_prompt};
use serde_json::json;

/// Benchmark: prompt generators at increasing sizes
fn bench_text_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_generators");

    for tokens in [1_000usize, 8_000, 140_000] {
        group.bench_with_input(BenchmarkId::new("long_context", tokens), &tokens, |b, &tokens| {
            b.iter(|| black_box(long_context(black_box(tokens))))
        });
        group.bench_with_input(BenchmarkId::new("stress_prompt", tokens), &tokens, |b, &tokens| {
            b.iter(|| black_box(stress_prompt(black_box(tokens))))
        });
    }

    let text = long_context(140_000);
    group.bench_function("estimate_tokens_140k", |b| b.iter(|| black_box(estimate_tokens(black_box(&text)))));

    group.finish();
}

/// Benchmark: SSE decoding with events split across chunks
fn bench_sse_decoding(c: &mut Criterion) {
    let event = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hello\"}}]}\n\n";
    let body = event.repeat(500) + "data: [DONE]\n\n";
    let chunks: Vec<&[u8]> = body.as_bytes().chunks(37).collect();

    c.bench_function("sse_decode_500_events", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::new();
            let mut count = 0;
            for chunk in &chunks {
                count += decoder.push(black_box(chunk)).len();
            }
            black_box(count)
        })
    });
}

/// Benchmark: latency summaries over stress-sized sample sets
fn bench_percentiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentiles");

    for size in [100usize, 10_000, 100_000] {
        let samples: Vec<f64> = (0..size).map(|i| ((i * 7919) % size) as f64 / 1000.0).collect();
        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        group.bench_with_input(BenchmarkId::new("summary", size), &samples, |b, samples| {
            b.iter(|| black_box(LatencySummary::from_samples(black_box(samples))))
        });
        group.bench_with_input(BenchmarkId::new("p99_sorted", size), &sorted, |b, sorted| {
            b.iter(|| black_box(percentile(black_box(sorted), 0.99)))
        });
    }

    group.finish();
}

/// Benchmark: debug log summaries of long requests
fn bench_log_summary(c: &mut Criterion) {
    let body = json!({
        "model": "seed-1-8-251228",
        "messages": [
            {"role": "system", "content": long_context(140_000)},
            {"role": "user", "content": "Summarize the sections above."}
        ]
    });

    c.bench_function("request_log_summary_140k", |b| {
        b.iter(|| black_box(create_request_log_summary(black_box(&body))))
    });
}

criterion_group!(
    benches,
    bench_text_generators,
    bench_sse_decoding,
    bench_percentiles,
    bench_log_summary
);

criterion_main!(benches);
