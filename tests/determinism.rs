use std::collections::HashSet;
use std::time::Duration;

use blake3::hash;
use memscope::aggregation::render_type_report;
use memscope::{ExplorerConfig, FrameRange, TraceSource};

use test_helpers::{offline_explorer, synthetic_trace};

#[test]
fn aggregation_report_is_deterministic() {
    let trace = synthetic_trace(20_000, 200);

    let mut fingerprints = HashSet::new();
    for (interval, steps) in [(1, 1), (16, 10), (256, 10), (4096, 100), (1 << 20, 3)] {
        let config = ExplorerConfig::default()
            .with_cancel_check_interval(interval)
            .with_progress_steps(steps);
        let mut explorer = offline_explorer(trace.clone(), config);

        explorer.aggregate(FrameRange::new(25, 174)).unwrap();
        let result = explorer
            .wait_for_aggregation(Duration::from_secs(30))
            .expect("aggregation completes");

        let mut rendered = render_type_report(&result, |id| trace.type_name(id));
        for type_id in 0..4 {
            for (callstack_id, group) in result.callstacks_for_type(type_id) {
                rendered.push_str(&format!(
                    "{type_id} {callstack_id} {} {} {:?}\n",
                    group.totals.count, group.totals.total_size, group.addresses
                ));
            }
        }
        fingerprints.insert(hash(rendered.as_bytes()));
    }

    assert_eq!(fingerprints.len(), 1, "reports diverged across configurations");
}
