//! Single-flight aggregation through the explorer

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use memscope::aggregation::{aggregate_records, CancelToken, ScanOutcome};
use memscope::source::{LiveObjectRecord, TraceError, TraceEvent};
use memscope::*;
use test_case::test_case;

use test_helpers::*;

const WAIT: Duration = Duration::from_secs(30);

#[test]
fn superseded_request_is_never_published() {
    let trace = synthetic_trace(200_000, 100);
    let mut explorer = offline_explorer(trace, ExplorerConfig::default());
    let events = explorer.subscribe();

    let first = explorer.aggregate(FrameRange::new(0, 99)).unwrap();
    let second = explorer.aggregate(FrameRange::new(0, 9)).unwrap();
    assert!(second > first);

    let result = explorer.wait_for_aggregation(WAIT).expect("second aggregation completes");
    assert_eq!(result.generation, second);
    assert_eq!(result.range, FrameRange::new(0, 9));
    assert_eq!(explorer.current_result().map(|r| r.generation), Some(second));

    for event in events.try_iter() {
        match event {
            ExplorerEvent::AggregationStarted { generation, .. }
            | ExplorerEvent::AggregationProgress { generation, .. }
            | ExplorerEvent::AggregationWarning { generation, .. } => {
                assert_eq!(generation, second)
            }
            ExplorerEvent::AggregationPublished(published) => {
                assert_eq!(published.generation, second)
            }
            _ => {}
        }
    }
}

#[test]
fn progress_starts_with_total_and_is_throttled() {
    let trace = synthetic_trace(5_000, 50);
    let mut explorer = offline_explorer(trace, ExplorerConfig::default().with_progress_steps(10));
    let events = explorer.subscribe();

    explorer.aggregate(FrameRange::new(0, 49)).unwrap();
    explorer.wait_for_aggregation(WAIT).expect("aggregation completes");

    let progress: Vec<_> = events
        .try_iter()
        .filter(|e| {
            matches!(
                e,
                ExplorerEvent::AggregationStarted { .. } | ExplorerEvent::AggregationProgress { .. }
            )
        })
        .collect();
    assert!(matches!(
        progress.first(),
        Some(ExplorerEvent::AggregationStarted { total: 5_000, .. })
    ));
    assert!(progress.len() <= 11, "{} progress reports", progress.len());
    assert_eq!(explorer.progress(), None);
    assert_eq!(explorer.aggregation_state(), WorkerState::Idle);
}

#[test]
fn failed_aggregation_keeps_previous_result() {
    let trace = synthetic_trace(100, 10);
    let mut explorer = offline_explorer(Arc::clone(&trace), ExplorerConfig::default());

    explorer.aggregate(FrameRange::new(0, 9)).unwrap();
    let good = explorer.wait_for_aggregation(WAIT).expect("clean scan completes");

    trace.push(TraceEvent::Malformed {
        frame: 5,
        reason: "truncated callstack".into(),
    });
    explorer.aggregate(FrameRange::new(0, 9)).unwrap();
    assert!(explorer.wait_for_aggregation(WAIT).is_none());

    assert!(matches!(
        explorer.last_warning(),
        Some(AggregationError::Trace(TraceError::MalformedRecord { frame: 5, .. }))
    ));
    assert_eq!(explorer.current_result().map(|r| r.generation), Some(good.generation));

    // Scanning a clean range again clears the warning.
    explorer.aggregate(FrameRange::new(6, 9)).unwrap();
    explorer.wait_for_aggregation(WAIT).expect("clean scan completes");
    assert!(explorer.last_warning().is_none());
}

#[test]
fn explicit_cancel_leaves_result_untouched() {
    let trace = synthetic_trace(100_000, 10);
    let mut explorer = offline_explorer(trace, ExplorerConfig::default());
    let generation = explorer.aggregate(FrameRange::new(0, 9)).unwrap();
    assert_eq!(explorer.cancel_aggregation(), Some(generation));
    assert_eq!(explorer.aggregation_state(), WorkerState::Idle);
    assert_eq!(explorer.pump(), 0);
    assert!(explorer.current_result().is_none());
}

#[test_case(1_000, 16; "small range")]
#[test_case(100_000, 16; "medium range")]
#[test_case(2_000_000, 256; "large range")]
fn cancellation_latency_is_bounded(records: usize, interval: usize) {
    let token = CancelToken::new();
    let pulled = Cell::new(0usize);
    let cancel_at = 500;
    let stream = (0..records)
        .map(|i| {
            Ok::<_, TraceError>(LiveObjectRecord {
                address: i as u64,
                type_id: 1,
                callstack_id: 1,
                size: 8,
            })
        })
        .inspect(|_| {
            pulled.set(pulled.get() + 1);
            if pulled.get() == cancel_at {
                token.cancel();
            }
        });

    let outcome = aggregate_records(
        1,
        FrameRange::new(0, 0),
        records,
        stream,
        &token,
        interval,
        10,
        &mut |_| {},
    )
    .unwrap();

    assert!(matches!(outcome, ScanOutcome::Cancelled { .. }));
    assert!(pulled.get() <= cancel_at + interval);
}
