//! Benchmark suite for Overseer subsystems.
//!
//! This module provides performance benchmarks for:
//! - Line classification (pattern catalog)
//! - Stream monitor ingestion (splitting, buffering, classification)
//! - Decision making (policy lookup and confidence adjustment)
//! - Context loading (requirements parsing and directory scan)
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use tempfile::TempDir;

use overseer::context::ContextProvider;
use overseer::decision::{DecisionEngine, SupervisionMode};
use overseer::monitor::{OutputChannel, StreamMonitor};
use overseer::patterns::PatternClassifier;

const SAMPLE_LINES: &[&str] = &[
    "Reading src/main.rs",
    "Creating src/components/TodoList.jsx",
    "Could you please clarify what requirements you mean?",
    "Should I proceed with the implementation?",
    "May I create the following files: a, b, c?",
    "npm error: command not found",
    "warning: unused variable `x`",
    "Running tests for the parser",
    "Implementation completed successfully!",
    "Compiling overseer v0.1.0",
];

const PRD: &str = "# Todo App\n\nA React todo app with an api backend.\n\n\
                   1. Users can add todos\n\
                   2. Users can delete todos\n\
                   - Todos must persist between reloads\n";

/// Output with `lines` lines drawn from [`SAMPLE_LINES`].
fn sample_output(lines: usize) -> String {
    let mut text = String::new();
    for i in 0..lines {
        text.push_str(SAMPLE_LINES[i % SAMPLE_LINES.len()]);
        text.push('\n');
    }
    text
}

// ============================================================================
// Classification Benchmarks
// ============================================================================

/// Benchmark classifying single lines of each kind.
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_line");

    for line in SAMPLE_LINES.iter().take(6) {
        group.bench_with_input(BenchmarkId::from_parameter(line), line, |b, line| {
            let mut classifier = PatternClassifier::new();
            b.iter(|| classifier.analyze(black_box(line)));
        });
    }

    group.finish();
}

// ============================================================================
// Monitor Benchmarks
// ============================================================================

/// Benchmark monitor ingestion throughput on raw output chunks.
fn bench_monitor_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_ingest");

    for lines in [100usize, 1_000, 5_000] {
        let output = sample_output(lines);
        group.throughput(Throughput::Bytes(output.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &output, |b, output| {
            b.iter(|| {
                let mut monitor = StreamMonitor::new(1000);
                for chunk in output.as_bytes().chunks(4096) {
                    black_box(monitor.ingest(OutputChannel::Stdout, chunk));
                }
                monitor.lines_processed()
            });
        });
    }

    group.finish();
}

// ============================================================================
// Decision Benchmarks
// ============================================================================

/// Benchmark deciding on classified lines, dedup window disabled.
fn bench_decide(c: &mut Criterion) {
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("PRD.md"), PRD).expect("write PRD");
    let context = ContextProvider::new(temp.path()).read_only().initialize(None);

    let mut classifier = PatternClassifier::new();
    let classified: Vec<_> = SAMPLE_LINES
        .iter()
        .map(|line| (*line, classifier.analyze(line)))
        .collect();

    c.bench_function("decide_sample_lines", |b| {
        let mut engine = DecisionEngine::new(SupervisionMode::Balanced)
            .with_dedup_window(std::time::Duration::ZERO);
        b.iter(|| {
            for (line, issues) in &classified {
                black_box(engine.decide(issues, line, &context));
            }
        });
    });
}

// ============================================================================
// Context Benchmarks
// ============================================================================

/// Benchmark loading project context from disk.
fn bench_context_load(c: &mut Criterion) {
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("PRD.md"), PRD).expect("write PRD");
    fs::create_dir_all(temp.path().join("tests")).expect("tests dir");
    fs::create_dir_all(temp.path().join("src/components")).expect("components dir");
    fs::write(temp.path().join(".eslintrc.json"), "{}").expect("lint config");
    for i in 0..50 {
        fs::write(temp.path().join(format!("file{i}.txt")), "x").expect("file");
    }

    c.bench_function("context_initialize", |b| {
        b.iter(|| {
            let mut provider = ContextProvider::new(temp.path()).read_only();
            black_box(provider.initialize(None))
        });
    });
}

criterion_group!(classify_benches, bench_classify, bench_monitor_ingest);

criterion_group!(engine_benches, bench_decide, bench_context_load);

criterion_main!(classify_benches, engine_benches);
