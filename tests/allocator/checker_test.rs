/*!
 * Checker Integration Tests
 * Checker behavior over real allocator workloads
 */

use pretty_assertions::assert_eq;
use tagheap::{
    CheckReport, ExplicitAllocator, Finding, HeapCheck, HeapConfig, HeapInspect,
    SegregatedAllocator,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared consistency assertion, driven through the trait seams
fn assert_consistent<A: HeapCheck + HeapInspect>(alloc: &A) -> CheckReport {
    let report = alloc.check_heap(0);
    assert!(report.is_clean(), "findings: {:?}", report.findings);
    assert_eq!(report.free_by_scan, report.free_by_list);
    assert_eq!(report.free_by_scan, alloc.stats().free_blocks);
    report
}

#[test]
fn test_scan_and_lists_agree_mid_workload() {
    let mut alloc = ExplicitAllocator::new().unwrap();
    let a = alloc.alloc(48).unwrap();
    let b = alloc.alloc(96).unwrap();
    let _c = alloc.alloc(200).unwrap();
    alloc.release(Some(a));
    alloc.release(Some(b));

    // a and b merged into one block, plus the tail of the initial region
    let report = assert_consistent(&alloc);
    assert_eq!(report.free_by_scan, 2);
}

#[test]
fn test_segregated_lists_agree_after_growth() {
    let mut alloc =
        SegregatedAllocator::with_config(HeapConfig::small(256, 1 << 20)).unwrap();
    let mut held = Vec::new();
    for _ in 0..40 {
        held.push(alloc.alloc(64).unwrap());
    }
    for ptr in held.drain(..).step_by(2) {
        alloc.release(Some(ptr));
    }

    assert_consistent(&alloc);
    assert!(alloc.stats().growth_count >= 1);
}

#[test]
fn test_verbose_check_logs_and_stays_clean() {
    init_logs();
    let mut alloc = SegregatedAllocator::new().unwrap();
    let p = alloc.alloc(128).unwrap();
    let report = alloc.check_heap(2);
    assert!(report.is_clean());
    alloc.release(Some(p));
}

#[test]
fn test_report_serializes() {
    let alloc = ExplicitAllocator::new().unwrap();
    let report = alloc.check_heap(0);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"findings\":[]"));

    let stats = alloc.stats();
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["free_blocks"], 1);
    assert_eq!(json["growth_count"], 0);
}

#[test]
fn test_finding_display_is_readable() {
    let finding = Finding::CountMismatch {
        by_scan: 3,
        by_list: 2,
    };
    assert_eq!(
        finding.to_string(),
        "free blocks lost: scan found 3, lists hold 2"
    );
}
