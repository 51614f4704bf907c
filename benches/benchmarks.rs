//! Performance benchmarks for the design companion.
//!
//! This module contains benchmarks for:
//! - Document equality and candidate deduplication
//! - Filesystem snapshot save/load
//! - Prompt rendering with large solution spaces
//! - A full problem workflow run against a scripted reasoner
//!
//! Run with: `cargo bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use design_companion::ai::{summarize_candidates, PromptKind, ScriptedReasoner};
use design_companion::document::{dedup_by_id, equal};
use design_companion::{
    Companion, FileStore, MemoryStore, ProblemSpace, SnapshotStore, SolutionCandidate,
    SolutionSpace, Workspace,
};
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    pub fn problem_space(variants: usize) -> ProblemSpace {
        ProblemSpace {
            context: "A payment processing system".to_string(),
            invariants: vec![
                "Must be on-premise because of residency laws".to_string(),
                "Budget is fixed for this fiscal year".to_string(),
            ],
            goal: "Scale the payment system to 50k TPS".to_string(),
            problem: "The SQL monolith locks up around 5k TPS".to_string(),
            variants: (0..variants)
                .map(|i| format!("Variant {i} (currently: option {i})"))
                .collect(),
        }
    }

    pub fn candidates(count: usize) -> Vec<SolutionCandidate> {
        (1..=count as u32)
            .map(|id| SolutionCandidate {
                id,
                hypothesis: format!("Change variant {id}"),
                model: "Shard the ledger by merchant behind a write-ahead queue. ".repeat(8),
                reasoning: "Keeps data on-premise".to_string(),
            })
            .collect()
    }

    pub fn workspace(candidates: usize) -> Workspace {
        Workspace {
            id: "bench".to_string(),
            version: "v1".to_string(),
            problem_space: problem_space(8),
            solution_space: Some(SolutionSpace {
                candidates: self::candidates(candidates),
                ..Default::default()
            }),
        }
    }
}

// ============================================================================
// Document Benchmarks
// ============================================================================

fn bench_document_equality(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_equality");

    for variants in &[4, 64, 512] {
        let a = fixtures::problem_space(*variants);
        let mut b = a.clone();
        b.variants.last_mut().unwrap().push('!');

        group.throughput(Throughput::Elements(*variants as u64));
        group.bench_with_input(BenchmarkId::new("last_differs", variants), variants, |bench, _| {
            bench.iter(|| equal(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_by_id");

    for count in &[10, 100, 1000] {
        let mut candidates = fixtures::candidates(*count);
        candidates.extend(fixtures::candidates(*count / 2));

        group.bench_with_input(BenchmarkId::from_parameter(count), &candidates, |b, candidates| {
            b.iter_batched(|| candidates.clone(), dedup_by_id, criterion::BatchSize::SmallInput);
        });
    }

    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let candidates = fixtures::candidates(10);

    c.bench_function("summarize_10_candidates", |b| {
        b.iter(|| summarize_candidates(black_box(&candidates), 200));
    });
}

// ============================================================================
// Store Benchmarks
// ============================================================================

fn bench_file_store(c: &mut Criterion) {
    let temp = tempfile::tempdir().unwrap();
    let store = FileStore::new(temp.path());
    let mut group = c.benchmark_group("file_store");

    for candidates in &[0, 10] {
        let workspace = fixtures::workspace(*candidates);
        store.save(&workspace).unwrap();

        group.bench_with_input(BenchmarkId::new("save", candidates), &workspace, |b, ws| {
            b.iter(|| store.save(black_box(ws)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("load", candidates), &workspace, |b, ws| {
            b.iter(|| store.load(black_box(&ws.id), black_box(&ws.version)).unwrap());
        });
    }

    group.finish();
}

// ============================================================================
// Workflow Benchmarks
// ============================================================================

fn bench_problem_workflow(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new());
    let companion = Companion::new(store, reasoner.clone()).unwrap();

    let extracted = serde_json::to_value(fixtures::problem_space(8)).unwrap();

    c.bench_function("problem_workflow_no_refine", |b| {
        b.to_async(&rt).iter(|| {
            reasoner.push(PromptKind::ExtractProblem, extracted.clone());
            reasoner.push(PromptKind::CheckConsistency, json!({ "items": ["Consistent"] }));
            companion.run_problem_workflow("bench", "v0", "Scale payments", false)
        });
    });
}

criterion_group!(
    benches,
    bench_document_equality,
    bench_dedup,
    bench_summarize,
    bench_file_store,
    bench_problem_workflow,
);
criterion_main!(benches);
