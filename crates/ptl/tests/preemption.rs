//! A high-priority task must be able to run while a low-priority task is
//! mid-job. The periods are chosen so the high task's releases land well
//! inside the low task's execution windows.

mod common;

use ptl::{GlobalConfig, OverrunPolicy, TaskConfig};
use ptl_trace::TraceEvent;

#[test]
fn high_priority_task_runs_during_low_priority_job() {
    let tasks = vec![
        TaskConfig::new("Low", 100, common::burn_job(50)).with_priority(1),
        TaskConfig::new("High", 70, common::burn_job(20)).with_priority(3),
    ];
    ptl::init(GlobalConfig::new(OverrunPolicy::Skip), &tasks).expect("init failed");

    common::launch();
    common::run_for(600);

    let records = common::records();
    let low_starts = common::indices_for(&records, "Low", TraceEvent::Start);
    let low_completes = common::indices_for(&records, "Low", TraceEvent::Complete);
    let high_starts = common::indices_for(&records, "High", TraceEvent::Start);

    assert!(!high_starts.is_empty(), "high task never ran");

    // At least one High start must fall strictly inside a Low job's
    // start..complete span, in trace order.
    let mut observed = false;
    for &start in &low_starts {
        let Some(&complete) = low_completes.iter().find(|&&c| c > start) else {
            continue;
        };
        if high_starts.iter().any(|&h| h > start && h < complete) {
            observed = true;
            break;
        }
    }
    assert!(observed, "no High start observed inside a Low job");
}
