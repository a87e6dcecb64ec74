//! Backend-level sort tests: spill chains, disk-backed runs, drain
//! lifecycle.

use std::sync::Arc;

use proptest::prelude::*;

use cascadedb_core::Value;
use cascadedb_exec::block::{InputRange, ItemBatch, OutputRow, RegisterSet};
use cascadedb_exec::call::Call;
use cascadedb_exec::context::ExecutionContext;
use cascadedb_exec::executor::{
    BatchSource, BlockSource, ExecutionBlock, ExecutorState, RegisterPlan, SortExecutor,
    SourceState,
};
use cascadedb_exec::resource::ResourceMonitor;
use cascadedb_exec::sort::{
    ExternalSortConfig, ExternalSortedRowsBackend, MemorySortedRowsBackend, SortComparator,
    SortRegister, SortSpec, SortedRowsBackend, StagedSortedRowsBackend,
};
use cascadedb_storage::backends::RedbEngine;

fn ints_range(values: &[i64]) -> InputRange {
    let rows = values.iter().map(|v| vec![Value::Int(*v)]).collect();
    InputRange::with_batch(Arc::new(ItemBatch::from_rows(1, rows)), ExecutorState::Done)
}

fn drain_ints(backend: &mut dyn SortedRowsBackend, capacity: usize) -> Vec<i64> {
    let mut out = OutputRow::new(
        ItemBatch::allocate(capacity, 1),
        RegisterSet::empty(),
        RegisterSet::all(1),
    );
    while backend.has_more() {
        backend.produce_output_row(&mut out).unwrap();
    }
    let batch = out.finalize().expect("rows were drained");
    (0..batch.num_rows()).filter_map(|row| batch.value(row, 0).as_int()).collect()
}

fn comparator() -> Arc<SortComparator> {
    Arc::new(SortComparator::new(vec![SortRegister::asc(0)]))
}

fn memory_backend(max_rows: usize) -> MemorySortedRowsBackend {
    MemorySortedRowsBackend::new(comparator(), false, Arc::new(ResourceMonitor::unlimited()))
        .with_capacity_limits(max_rows, 0)
}

#[test]
fn staged_spill_is_transparent() {
    let values: Vec<i64> = (0..200).map(|n| (n * 37) % 200).collect();

    // Unbounded memory reference.
    let mut reference = memory_backend(0);
    let mut input = ints_range(&values);
    reference.consume_input_range(&mut input).unwrap();
    reference.seal().unwrap();
    let expected = drain_ints(&mut reference, 256);

    // Tiny memory stage spilling into redb.
    let engine = RedbEngine::in_memory().unwrap();
    let external = ExternalSortedRowsBackend::new(
        engine,
        vec![SortRegister::asc(0)],
        ExternalSortConfig::default(),
    );
    let mut staged = StagedSortedRowsBackend::new(vec![
        Box::new(memory_backend(8)),
        Box::new(external),
    ]);
    let mut input = ints_range(&values);
    staged.consume_input_range(&mut input).unwrap();
    staged.seal().unwrap();

    assert_eq!(drain_ints(&mut staged, 256), expected);
}

#[test]
fn spill_to_disk_survives_a_real_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let engine = RedbEngine::open(dir.path().join("spill.redb")).unwrap();

    let ctx = Arc::new(ExecutionContext::new());
    let sort = SortExecutor::with_spill(
        SortSpec::new(vec![SortRegister::desc(0)]),
        Arc::clone(&ctx),
        engine,
        4,
        0,
        ExternalSortConfig::default(),
    );
    let values: Vec<i64> = (0..50).collect();
    let batch = Arc::new(ItemBatch::from_rows(
        1,
        values.iter().map(|v| vec![Value::Int(*v)]).collect(),
    ));
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(1),
        Box::new(sort),
        Box::new(BatchSource::from_batches(vec![batch])),
        ctx,
    );

    let mut produced = Vec::new();
    loop {
        let (state, _, out) = block.execute(Call::unbounded()).unwrap();
        if let Some(out) = out {
            for row in 0..out.num_rows() {
                produced.extend(out.value(row, 0).as_int());
            }
        }
        if state == SourceState::Done {
            break;
        }
    }
    let expected: Vec<i64> = (0..50).rev().collect();
    assert_eq!(produced, expected);
}

#[test]
fn non_finite_floats_spill_transparently() {
    let mut values = vec![
        Value::Float(f64::NAN),
        Value::Float(1.5),
        Value::Float(f64::NEG_INFINITY),
        Value::Float(f64::INFINITY),
        Value::Float(-2.25),
        Value::Int(3),
    ];
    let engine = RedbEngine::in_memory().unwrap();
    let external = ExternalSortedRowsBackend::new(
        engine,
        vec![SortRegister::asc(0)],
        ExternalSortConfig::default(),
    );
    let mut staged = StagedSortedRowsBackend::new(vec![
        Box::new(memory_backend(2)),
        Box::new(external),
    ]);
    let rows = values.iter().map(|v| vec![v.clone()]).collect();
    let mut input =
        InputRange::with_batch(Arc::new(ItemBatch::from_rows(1, rows)), ExecutorState::Done);
    staged.consume_input_range(&mut input).unwrap();
    staged.seal().unwrap();

    let mut out = OutputRow::new(
        ItemBatch::allocate(8, 1),
        RegisterSet::all(1),
        RegisterSet::empty(),
    );
    while staged.has_more() {
        staged.produce_output_row(&mut out).unwrap();
    }
    let batch = out.finalize().unwrap();
    assert_eq!(batch.num_rows(), values.len());

    values.sort_by(|a, b| a.compare(b));
    for (row, expected) in values.iter().enumerate() {
        match (batch.value(row, 0), expected) {
            // NaN is unequal to itself under PartialEq but a valid key.
            (Value::Float(got), Value::Float(want)) if want.is_nan() => assert!(got.is_nan()),
            (got, want) => assert_eq!(got, want),
        }
    }
}

#[test]
fn stable_spill_preserves_numeric_tie_order() {
    let comparator = Arc::new(SortComparator::new(vec![SortRegister::asc(0)]));
    let memory =
        MemorySortedRowsBackend::new(comparator, true, Arc::new(ResourceMonitor::unlimited()))
            .with_capacity_limits(1, 0);
    let engine = RedbEngine::in_memory().unwrap();
    let external = ExternalSortedRowsBackend::new(
        engine,
        vec![SortRegister::asc(0)],
        ExternalSortConfig::default(),
    );
    let mut staged = StagedSortedRowsBackend::new(vec![Box::new(memory), Box::new(external)]);

    // Int(2) and Float(2.0) are equal sort keys; stability demands the
    // spilled drain keep their arrival order, same as the memory path.
    let rows = vec![
        vec![Value::Float(2.0), Value::from("float-first")],
        vec![Value::Int(2), Value::from("int-second")],
        vec![Value::Int(1), Value::from("low")],
    ];
    let mut input =
        InputRange::with_batch(Arc::new(ItemBatch::from_rows(2, rows)), ExecutorState::Done);
    staged.consume_input_range(&mut input).unwrap();
    staged.seal().unwrap();

    let mut out = OutputRow::new(
        ItemBatch::allocate(4, 2),
        RegisterSet::all(2),
        RegisterSet::empty(),
    );
    while staged.has_more() {
        staged.produce_output_row(&mut out).unwrap();
    }
    let batch = out.finalize().unwrap();
    let tags: Vec<Value> = (0..batch.num_rows()).map(|row| batch.value(row, 1).clone()).collect();
    assert_eq!(
        tags,
        vec![Value::from("low"), Value::from("float-first"), Value::from("int-second")]
    );
}

#[test]
fn drained_backend_stays_exhausted() {
    let mut backend = memory_backend(0);
    let mut input = ints_range(&[2, 1]);
    backend.consume_input_range(&mut input).unwrap();
    backend.seal().unwrap();

    assert_eq!(drain_ints(&mut backend, 4), vec![1, 2]);
    assert!(!backend.has_more());
    assert_eq!(backend.skip_output_row().unwrap(), 0);
    assert!(!backend.has_more());
}

#[test]
fn external_backend_orders_mixed_types_like_the_comparator() {
    let engine = RedbEngine::in_memory().unwrap();
    let mut backend = ExternalSortedRowsBackend::new(
        engine,
        vec![SortRegister::asc(0)],
        ExternalSortConfig::default(),
    );
    let mut values = vec![
        Value::from("b"),
        Value::Int(10),
        Value::Null,
        Value::Float(-3.5),
        Value::Bool(true),
        Value::from("a"),
    ];
    let rows = values.iter().map(|v| vec![v.clone()]).collect();
    let mut input =
        InputRange::with_batch(Arc::new(ItemBatch::from_rows(1, rows)), ExecutorState::Done);
    backend.consume_input_range(&mut input).unwrap();
    backend.seal().unwrap();

    let mut out = OutputRow::new(
        ItemBatch::allocate(8, 1),
        RegisterSet::all(1),
        RegisterSet::empty(),
    );
    while backend.has_more() {
        backend.produce_output_row(&mut out).unwrap();
    }
    let batch = out.finalize().unwrap();
    let drained: Vec<Value> = (0..batch.num_rows()).map(|row| batch.value(row, 0).clone()).collect();

    values.sort_by(|a, b| a.compare(b));
    assert_eq!(drained, values);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Draining the memory backend equals sorting with the comparator
    /// directly, for arbitrary inputs.
    #[test]
    fn memory_backend_matches_direct_sort(values in prop::collection::vec(-1000i64..1000, 0..64)) {
        let mut backend = memory_backend(0);
        if values.is_empty() {
            backend.seal().unwrap();
            prop_assert!(!backend.has_more());
            return Ok(());
        }
        let mut input = ints_range(&values);
        backend.consume_input_range(&mut input).unwrap();
        backend.seal().unwrap();

        let drained = drain_ints(&mut backend, values.len().max(1));
        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(drained, expected);
    }
}
