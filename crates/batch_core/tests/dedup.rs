use batch_core::{JobId, KeyPolicy, ResultDeduplicator, ResultKey, ResultRecord};
use pretty_assertions::assert_eq;
use serde_json::json;

fn records(keys: &[&str]) -> Vec<ResultRecord> {
    let policy = KeyPolicy::default();
    keys.iter()
        .enumerate()
        .map(|(position, key)| {
            ResultRecord::from_document(json!({ "po_number": key }), position, &policy)
        })
        .collect()
}

fn keys(records: &[ResultRecord]) -> Vec<String> {
    records.iter().map(|record| record.key.to_string()).collect()
}

#[test]
fn growing_lists_surface_each_key_once() {
    let dedup = ResultDeduplicator::new();
    let job = JobId(1);

    let first = dedup.filter_new(job, &records(&["PO-1"]));
    let second = dedup.filter_new(job, &records(&["PO-1", "PO-2"]));
    let third = dedup.filter_new(job, &records(&["PO-1", "PO-2"]));

    assert_eq!(keys(&first), vec!["PO-1"]);
    assert_eq!(keys(&second), vec!["PO-2"]);
    assert!(third.is_empty());
    assert_eq!(dedup.seen_count(job), 2);
}

#[test]
fn unsorted_accumulation_is_handled() {
    let dedup = ResultDeduplicator::new();
    let job = JobId(1);

    dedup.filter_new(job, &records(&["PO-9", "PO-3"]));
    let next = dedup.filter_new(job, &records(&["PO-1", "PO-9", "PO-3", "PO-4"]));

    assert_eq!(keys(&next), vec!["PO-1", "PO-4"]);
}

#[test]
fn repeated_key_inside_one_poll_surfaces_first_occurrence() {
    let dedup = ResultDeduplicator::new();
    let fresh = dedup.filter_new(JobId(1), &records(&["PO-5", "PO-5"]));
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].position, 0);
}

#[test]
fn jobs_do_not_share_seen_keys() {
    let dedup = ResultDeduplicator::new();
    dedup.filter_new(JobId(1), &records(&["PO-1"]));
    let other = dedup.filter_new(JobId(2), &records(&["PO-1"]));
    assert_eq!(keys(&other), vec!["PO-1"]);
}

#[test]
fn records_without_keys_stay_distinct() {
    let dedup = ResultDeduplicator::new();
    let policy = KeyPolicy::default();
    let batch = vec![
        ResultRecord::from_document(json!({ "po_number": "" }), 0, &policy),
        ResultRecord::from_document(json!({ "retailer_name": "AEON" }), 1, &policy),
    ];

    let fresh = dedup.filter_new(JobId(3), &batch);

    assert_eq!(
        fresh.iter().map(|r| r.key.clone()).collect::<Vec<_>>(),
        vec![ResultKey::Positional(0), ResultKey::Positional(1)]
    );
    assert!(dedup.filter_new(JobId(3), &batch).is_empty());
}

#[test]
fn keyless_records_keep_their_position_as_the_list_grows() {
    let dedup = ResultDeduplicator::new();
    let policy = KeyPolicy::default();
    let keyless = json!({ "retailer_name": "AEON" });
    let first = vec![ResultRecord::from_document(keyless.clone(), 0, &policy)];
    let grown = vec![
        ResultRecord::from_document(keyless.clone(), 0, &policy),
        ResultRecord::from_document(json!({ "po_number": "PO-1" }), 1, &policy),
    ];
    assert_eq!(dedup.filter_new(JobId(5), &first).len(), 1);
    let fresh = dedup.filter_new(JobId(5), &grown);
    assert_eq!(
        fresh.iter().map(|r| r.key.clone()).collect::<Vec<_>>(),
        vec![ResultKey::Natural("PO-1".to_string())]
    );

    // Keys follow positions, so a keyless record moved elsewhere is new.
    let moved = vec![ResultRecord::from_document(keyless, 2, &policy)];
    assert_eq!(dedup.filter_new(JobId(5), &moved).len(), 1);
}

#[test]
fn storage_notice_fires_once_per_job() {
    let dedup = ResultDeduplicator::new();
    assert!(dedup.notice_once(JobId(1)));
    assert!(!dedup.notice_once(JobId(1)));
    assert!(dedup.notice_once(JobId(2)));
}

#[test]
fn notice_sentinel_does_not_collide_with_document_keys() {
    let dedup = ResultDeduplicator::new();
    let job = JobId(1);
    assert!(dedup.notice_once(job));
    let fresh = dedup.filter_new(job, &records(&["<storage-notice>"]));
    assert_eq!(fresh.len(), 1);
}

#[test]
fn release_discards_the_key_set() {
    let dedup = ResultDeduplicator::new();
    dedup.filter_new(JobId(1), &records(&["PO-1"]));
    assert_eq!(dedup.tracked_jobs(), 1);

    dedup.release(JobId(1));

    assert_eq!(dedup.tracked_jobs(), 0);
    assert_eq!(dedup.seen_count(JobId(1)), 0);
}

#[test]
fn concurrent_callers_never_double_surface() {
    use std::sync::Arc;
    use std::thread;

    let dedup = Arc::new(ResultDeduplicator::new());
    let batch = Arc::new(records(&["PO-1", "PO-2", "PO-3", "PO-4"]));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dedup = dedup.clone();
            let batch = batch.clone();
            thread::spawn(move || dedup.filter_new(JobId(1), &batch).len())
        })
        .collect();

    let surfaced: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(surfaced, 4);
}
