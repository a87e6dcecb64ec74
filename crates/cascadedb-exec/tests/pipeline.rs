//! End-to-end pipeline tests: executors driven through execution blocks.

use std::sync::Arc;

use cascadedb_core::Value;
use cascadedb_exec::block::{InputRow, ItemBatch, SharedItemBatch};
use cascadedb_exec::call::{Call, Limit};
use cascadedb_exec::context::ExecutionContext;
use cascadedb_exec::executor::{
    BatchSource, BlockSource, Calculation, CalculationExecutor, ConstrainedSortExecutor,
    EnumerateListExecutor, ExecutionBlock, FilterExecutor, GroupedSortExecutor, RegisterPlan,
    SortExecutor, SourceState,
};
use cascadedb_exec::resource::ResourceMonitor;
use cascadedb_exec::sort::{SortComparator, SortRegister, SortSpec};
use cascadedb_exec::ExecError;

fn pairs_batch(rows: &[(i64, i64)]) -> SharedItemBatch {
    Arc::new(ItemBatch::from_rows(
        2,
        rows.iter().map(|(a, b)| vec![Value::Int(*a), Value::Int(*b)]).collect(),
    ))
}

fn ints_batch(values: &[i64]) -> SharedItemBatch {
    Arc::new(ItemBatch::from_rows(1, values.iter().map(|v| vec![Value::Int(*v)]).collect()))
}

/// Acts as the pipeline's consumer: re-issues the demand, reduced by what
/// each call delivered, until the block reports `Done`. Returns the data
/// rows and the total skip count.
fn drain(block: &mut ExecutionBlock, initial: Call) -> (Vec<Vec<Value>>, usize) {
    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut total_skipped = 0;
    let mut offset = initial.offset();
    let mut limit = initial.limit();
    let fullcount = initial.needs_fullcount();
    loop {
        let (state, skip, batch) =
            block.execute(Call::new(offset, limit, fullcount)).expect("pipeline should not fail");
        let mut produced = 0;
        if let Some(batch) = batch {
            for row in 0..batch.num_rows() {
                if batch.is_shadow_row(row) {
                    continue;
                }
                produced += 1;
                rows.push(
                    (0..batch.num_registers()).map(|reg| batch.value(row, reg).clone()).collect(),
                );
            }
        }
        offset = offset.saturating_sub(skip);
        total_skipped += skip;
        limit = match limit {
            Limit::Unbounded => Limit::Unbounded,
            Limit::Soft(n) => Limit::Soft(n.saturating_sub(produced)),
            Limit::Hard(n) => Limit::Hard(n.saturating_sub(produced)),
        };
        if state == SourceState::Done {
            return (rows, total_skipped);
        }
    }
}

fn sort_block(batches: Vec<SharedItemBatch>, spec: SortSpec, num_registers: usize) -> ExecutionBlock {
    let ctx = Arc::new(ExecutionContext::new());
    let sort = SortExecutor::in_memory(spec, Arc::clone(&ctx));
    ExecutionBlock::new(
        RegisterPlan::passthrough(num_registers),
        Box::new(sort),
        Box::new(BatchSource::from_batches(batches)),
        ctx,
    )
}

#[test]
fn sort_orders_rows_across_batches() {
    let mut block = sort_block(
        vec![ints_batch(&[5, 3]), ints_batch(&[4, 1]), ints_batch(&[2])],
        SortSpec::new(vec![SortRegister::asc(0)]),
        1,
    );
    let (rows, _) = drain(&mut block, Call::unbounded());
    let keys: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();
    assert_eq!(keys, vec![1, 2, 3, 4, 5]);
}

#[test]
fn descending_sort_reverses_order() {
    let mut block = sort_block(
        vec![ints_batch(&[2, 9, 4])],
        SortSpec::new(vec![SortRegister::desc(0)]),
        1,
    );
    let (rows, _) = drain(&mut block, Call::unbounded());
    let keys: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();
    assert_eq!(keys, vec![9, 4, 2]);
}

#[test]
fn stable_sort_keeps_ties_in_input_order() {
    let mut block = sort_block(
        vec![pairs_batch(&[(1, 100), (0, 200), (1, 300), (0, 400)])],
        SortSpec::stable(vec![SortRegister::asc(0)]),
        2,
    );
    let (rows, _) = drain(&mut block, Call::unbounded());
    let payloads: Vec<i64> = rows.iter().filter_map(|r| r[1].as_int()).collect();
    assert_eq!(payloads, vec![200, 400, 100, 300]);
}

#[test]
fn grouped_sort_orders_within_contiguous_groups() {
    let input = [
        (2, 3),
        (2, 1),
        (199, 8),
        (199, 2),
        (199, 3),
        (1, 1009),
        (0, 832),
        (0, 1),
        (0, 10001),
    ];
    let ctx = Arc::new(ExecutionContext::new());
    let exec = GroupedSortExecutor::new(
        vec![0],
        SortSpec::new(vec![SortRegister::asc(1)]),
        Arc::clone(&ctx),
    );
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(2),
        Box::new(exec),
        Box::new(BatchSource::from_batches(vec![pairs_batch(&input)])),
        ctx,
    );

    let (rows, _) = drain(&mut block, Call::unbounded());
    let produced: Vec<(i64, i64)> = rows
        .iter()
        .map(|r| (r[0].as_int().unwrap(), r[1].as_int().unwrap()))
        .collect();
    assert_eq!(
        produced,
        vec![
            (2, 1),
            (2, 3),
            (199, 2),
            (199, 3),
            (199, 8),
            (1, 1009),
            (0, 1),
            (0, 832),
            (0, 10001),
        ]
    );
}

#[test]
fn offset_skips_sorted_prefix() {
    let n = 10;
    let values: Vec<i64> = (0..n).rev().collect();
    let mut block = sort_block(
        vec![ints_batch(&values)],
        SortSpec::new(vec![SortRegister::asc(0)]),
        1,
    );
    let (rows, skipped) = drain(&mut block, Call::new(4, Limit::Unbounded, false));
    assert_eq!(skipped, 4);
    let keys: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();
    assert_eq!(keys, (4..n).collect::<Vec<_>>());
}

#[test]
fn fullcount_accounts_for_every_input_row() {
    // With fullcount, skipped plus produced covers the whole input no
    // matter the limit.
    let n = 25_i64;
    let values: Vec<i64> = (0..n).collect();
    for limit in [0usize, 1, 10, 25, 40] {
        let mut block = sort_block(
            vec![ints_batch(&values)],
            SortSpec::new(vec![SortRegister::asc(0)]),
            1,
        );
        let (rows, skipped) = drain(&mut block, Call::new(0, Limit::Hard(limit), true));
        assert_eq!(rows.len(), limit.min(n as usize));
        assert_eq!(rows.len() + skipped, n as usize, "limit {limit}");
    }
}

#[test]
fn top_k_matches_full_sort_membership() {
    let values = [42_i64, 7, 19, 3, 88, 7, 55, 1, 64, 23];
    let k = 4;

    let ctx = Arc::new(ExecutionContext::new());
    let exec = ConstrainedSortExecutor::new(
        Arc::new(SortComparator::new(vec![SortRegister::asc(0)])),
        k,
        Arc::clone(&ctx),
    );
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(1),
        Box::new(exec),
        Box::new(BatchSource::from_batches(vec![ints_batch(&values)])),
        ctx,
    );
    let (rows, _) = drain(&mut block, Call::new(0, Limit::Hard(k), false));
    let top_k: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();

    let mut expected = values.to_vec();
    expected.sort_unstable();
    expected.truncate(k);
    assert_eq!(top_k, expected);
}

#[test]
fn calculation_then_sort_composes() {
    // Stage 1 doubles register 0 into register 1; stage 2 sorts by it
    // descending.
    let ctx = Arc::new(ExecutionContext::new());
    let calc = CalculationExecutor::new(
        Calculation::Expression(Box::new(|row: &InputRow<'_>| {
            let n = row.value(0).as_int().unwrap_or(0);
            Ok(Value::Int(n * 2))
        })),
        1,
    );
    let calc_block = ExecutionBlock::new(
        RegisterPlan::extending(1, 2),
        Box::new(calc),
        Box::new(BatchSource::from_batches(vec![ints_batch(&[3, 1, 2])])),
        Arc::clone(&ctx),
    );
    let sort = SortExecutor::in_memory(
        SortSpec::new(vec![SortRegister::desc(1)]),
        Arc::clone(&ctx),
    );
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(2),
        Box::new(sort),
        Box::new(calc_block),
        ctx,
    );

    let (rows, _) = drain(&mut block, Call::unbounded());
    let doubled: Vec<i64> = rows.iter().filter_map(|r| r[1].as_int()).collect();
    assert_eq!(doubled, vec![6, 4, 2]);
}

#[test]
fn enumerate_filter_pipeline() {
    let lists = Arc::new(ItemBatch::from_rows(
        2,
        vec![
            vec![
                Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]),
                Value::Null,
            ],
            vec![Value::Array(vec![Value::Int(5), Value::Int(6)]), Value::Null],
        ],
    ));
    let ctx = Arc::new(ExecutionContext::new());
    let enumerate_block = ExecutionBlock::new(
        RegisterPlan::extending(1, 2),
        Box::new(EnumerateListExecutor::new(0, 1)),
        Box::new(BatchSource::from_batches(vec![lists])),
        Arc::clone(&ctx),
    );
    let filter = FilterExecutor::new(Box::new(|row: &InputRow<'_>| {
        Ok(Value::Bool(row.value(1).as_int().is_some_and(|n| n % 2 == 0)))
    }));
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(2),
        Box::new(filter),
        Box::new(enumerate_block),
        ctx,
    );

    let (rows, _) = drain(&mut block, Call::unbounded());
    let evens: Vec<i64> = rows.iter().filter_map(|r| r[1].as_int()).collect();
    assert_eq!(evens, vec![2, 4, 6]);
    assert!(block.stats().rows_filtered >= 3);
}

#[test]
fn waiting_source_resumes_a_sort_without_losing_rows() {
    let mut source = BatchSource::new();
    source.push_batch(ints_batch(&[3, 1]));
    source.push_waiting();
    source.push_batch(ints_batch(&[2]));

    let ctx = Arc::new(ExecutionContext::new());
    let sort = SortExecutor::in_memory(SortSpec::new(vec![SortRegister::asc(0)]), Arc::clone(&ctx));
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(1),
        Box::new(sort),
        Box::new(source),
        ctx,
    );

    let (state, _, batch) = block.execute(Call::unbounded()).unwrap();
    assert_eq!(state, SourceState::Waiting);
    assert!(batch.is_none());

    let (rows, _) = drain(&mut block, Call::unbounded());
    let keys: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();
    assert_eq!(keys, vec![1, 2, 3]);
}

#[test]
fn memory_ceiling_fails_the_query() {
    let monitor = Arc::new(ResourceMonitor::with_limit(64));
    let ctx = Arc::new(ExecutionContext::with_monitor(monitor));
    let sort = SortExecutor::in_memory(SortSpec::new(vec![SortRegister::asc(0)]), Arc::clone(&ctx));
    let values: Vec<i64> = (0..100).collect();
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(1),
        Box::new(sort),
        Box::new(BatchSource::from_batches(vec![ints_batch(&values)])),
        ctx,
    );

    assert!(matches!(
        block.execute(Call::unbounded()),
        Err(ExecError::ResourceLimitExceeded { .. })
    ));
}

#[test]
fn cancellation_mid_pipeline_is_fatal() {
    let ctx = Arc::new(ExecutionContext::new());
    let sort = SortExecutor::in_memory(SortSpec::new(vec![SortRegister::asc(0)]), Arc::clone(&ctx));
    let mut block = ExecutionBlock::new(
        RegisterPlan::passthrough(1),
        Box::new(sort),
        Box::new(BatchSource::from_batches(vec![ints_batch(&[1, 2, 3])])),
        Arc::clone(&ctx),
    );
    ctx.cancel();
    assert!(matches!(block.execute(Call::unbounded()), Err(ExecError::Cancelled)));
}

#[test]
fn mixed_type_sort_follows_the_type_order() {
    let batch = Arc::new(ItemBatch::from_rows(
        1,
        vec![
            vec![Value::from("text")],
            vec![Value::Null],
            vec![Value::Int(3)],
            vec![Value::Bool(false)],
            vec![Value::Float(2.5)],
        ],
    ));
    let mut block = sort_block(vec![batch], SortSpec::new(vec![SortRegister::asc(0)]), 1);
    let (rows, _) = drain(&mut block, Call::unbounded());
    let names: Vec<&str> = rows.iter().map(|r| r[0].type_name()).collect();
    // Null before booleans before numbers before strings; numbers merge
    // ints and floats by value.
    assert_eq!(names, vec!["null", "bool", "float", "int", "string"]);
}
