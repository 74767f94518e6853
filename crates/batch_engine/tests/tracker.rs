use std::time::{Duration, Instant};

use batch_core::{JobId, JobState, KeyPolicy, MediaKind, TerminalKind, TrackerEvent};
use batch_engine::{Artifact, ClientSettings, PollSettings, TrackerHandle, TrackerSettings};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> TrackerSettings {
    TrackerSettings {
        client: ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        },
        poll: PollSettings {
            interval: Duration::from_millis(20),
        },
        key_policy: KeyPolicy::default(),
    }
}

fn artifact(name: &str) -> Artifact {
    Artifact::new(name, MediaKind::Pdf, b"%PDF-1.4".to_vec())
}

/// Drain events until `job_id` reaches a terminal event or the deadline passes.
fn collect_until_terminal(tracker: &TrackerHandle, job_id: JobId) -> Vec<TrackerEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        if let Some(event) = tracker.recv_timeout(Duration::from_millis(50)) {
            let done = event.job_id() == job_id && matches!(event, TrackerEvent::Terminal { .. });
            events.push(event);
            if done {
                break;
            }
        }
    }
    events
}

async fn mount_status_sequence(server: &MockServer, batch: &str, bodies: Vec<serde_json::Value>) {
    let count = bodies.len();
    for (index, body) in bodies.into_iter().enumerate() {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/api/batch/status/{batch}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .with_priority(u8::try_from(index + 1).unwrap());
        let mock = if index + 1 < count {
            mock.up_to_n_times(1)
        } else {
            mock
        };
        mock.mount(server).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tracker_surfaces_partial_results_then_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "J" })))
        .mount(&server)
        .await;
    mount_status_sequence(
        &server,
        "J",
        vec![
            json!({ "status": "processing", "results": [{ "po_number": "PO-1" }] }),
            json!({ "status": "processing",
                    "results": [{ "po_number": "PO-1" }, { "po_number": "PO-2" }] }),
            json!({ "status": "completed",
                    "results": [{ "po_number": "PO-1" }, { "po_number": "PO-2" }] }),
        ],
    )
    .await;

    let tracker = TrackerHandle::new(settings_for(&server)).expect("tracker");
    let job_id = tracker.submit(artifact("batch.pdf"));
    let events = collect_until_terminal(&tracker, job_id);

    let keys: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            TrackerEvent::NewResult { record, .. } => Some(record.key.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec!["PO-1", "PO-2"]);
    assert!(matches!(
        events.last(),
        Some(TrackerEvent::Terminal {
            kind: TerminalKind::Complete,
            ..
        })
    ));

    let view = tracker.view();
    assert_eq!(view.completed, 1);
    assert_eq!(view.total_results, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tracker_records_rejected_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch/upload"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Unsupported file format" })),
        )
        .mount(&server)
        .await;

    let tracker = TrackerHandle::new(settings_for(&server)).expect("tracker");
    let job_id = tracker.submit(artifact("notes.pdf"));
    let events = collect_until_terminal(&tracker, job_id);

    assert!(matches!(
        events.last(),
        Some(TrackerEvent::Terminal {
            kind: TerminalKind::Error,
            message: Some(message),
            ..
        }) if message == "Unsupported file format"
    ));
    let jobs = tracker.jobs();
    assert_eq!(jobs[0].state, JobState::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn removed_job_stops_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "slow" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/batch/status/slow"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })),
        )
        .mount(&server)
        .await;

    let tracker = TrackerHandle::new(settings_for(&server)).expect("tracker");
    let job_id = tracker.submit(artifact("long.pdf"));

    // Wait for the poll loop to start before removing.
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some(TrackerEvent::PollingStarted { .. }) =
            tracker.recv_timeout(Duration::from_millis(50))
        {
            break;
        }
    }
    assert!(tracker.remove_job(job_id));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let polls_after_removal = status_requests(&server).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(status_requests(&server).await, polls_after_removal);
    assert!(tracker.jobs().is_empty());
    while let Some(event) = tracker.try_recv() {
        assert!(!matches!(
            event,
            TrackerEvent::NewResult { .. } | TrackerEvent::Terminal { .. }
        ));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_status_with_null_fields_finishes_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "N" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/batch/status/N"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "results": [{ "po_number": "PO-1" }],
            "page_errors": null,
            "error": null
        })))
        .mount(&server)
        .await;

    let tracker = TrackerHandle::new(settings_for(&server)).expect("tracker");
    let job_id = tracker.submit(artifact("nulls.pdf"));
    let events = collect_until_terminal(&tracker, job_id);

    assert!(matches!(
        events.last(),
        Some(TrackerEvent::Terminal {
            kind: TerminalKind::Complete,
            ..
        })
    ));
    let job = tracker.registry().job(job_id).expect("job kept");
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.results.len(), 1);
}

async fn status_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path().starts_with("/api/batch/status/"))
        .count()
}
