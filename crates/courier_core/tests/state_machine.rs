use std::sync::Once;

use courier_core::{
    Effect, ErrorKind, IngestStage, QueueConfig, QueueState, SubmissionError, SubmissionOrigin,
    SubmissionStatus, TransitionError,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(courier_logging::initialize_for_tests);
}

fn queue_with_urls(config: QueueConfig, count: usize) -> QueueState {
    let mut state = QueueState::new(config);
    for n in 1..=count {
        state.add_url(format!("https://docs.example.com/{n}"));
    }
    state
}

fn status_of(state: &QueueState, id: u64) -> SubmissionStatus {
    state.store().get(id).map(|item| item.status).unwrap()
}

fn uploading_count(state: &QueueState) -> usize {
    state.store().count_with(SubmissionStatus::Uploading)
}

#[test]
fn scheduling_promotes_oldest_pending_up_to_the_bound() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 5);

    let effects = state.schedule();

    assert_eq!(
        effects,
        vec![
            Effect::StartUpload {
                id: 1,
                origin: SubmissionOrigin::Url("https://docs.example.com/1".to_string()),
            },
            Effect::StartUpload {
                id: 2,
                origin: SubmissionOrigin::Url("https://docs.example.com/2".to_string()),
            },
            Effect::StartUpload {
                id: 3,
                origin: SubmissionOrigin::Url("https://docs.example.com/3".to_string()),
            },
        ]
    );
    let counts = state.snapshot().counts;
    assert_eq!(counts.uploading, 3);
    assert_eq!(counts.pending, 2);

    // A second pass with a saturated queue admits nothing.
    assert!(state.schedule().is_empty());
}

#[test]
fn upload_success_moves_to_processing_and_frees_a_slot() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 5);
    state.schedule();

    let effects = state.apply_upload_outcome(2, Ok("doc-42".to_string()));

    assert_eq!(
        effects,
        vec![Effect::StartPoll {
            id: 2,
            remote_id: "doc-42".to_string(),
        }]
    );
    let item = state.store().get(2).unwrap();
    assert_eq!(item.status, SubmissionStatus::Processing);
    assert_eq!(item.progress, 100);
    assert_eq!(item.remote_id.as_deref(), Some("doc-42"));

    // Processing holds no upload slot, so the next pending one gets in.
    let effects = state.schedule();
    assert!(matches!(effects[0], Effect::StartUpload { id: 4, .. }));
    assert_eq!(uploading_count(&state), 3);
}

#[test]
fn upload_failure_marks_the_submission_failed() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 1);
    state.schedule();

    let effects = state.apply_upload_outcome(
        1,
        Err(SubmissionError::new(ErrorKind::Transfer, "connection reset")),
    );

    assert!(effects.is_empty());
    let item = state.store().get(1).unwrap();
    assert_eq!(item.status, SubmissionStatus::Failed);
    let error = item.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Transfer);
    assert_eq!(error.message, "connection reset");
}

#[test]
fn poll_outcome_settles_processing_submissions() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 2);
    state.schedule();
    state.apply_upload_outcome(1, Ok("doc-1".to_string()));
    state.apply_upload_outcome(2, Ok("doc-2".to_string()));

    state.apply_poll_outcome(1, Ok(()));
    state.apply_poll_outcome(
        2,
        Err(SubmissionError::new(ErrorKind::Backend, "text extraction failed")),
    );

    assert_eq!(status_of(&state, 1), SubmissionStatus::Completed);
    assert_eq!(status_of(&state, 2), SubmissionStatus::Failed);
    assert_eq!(
        state.store().get(2).unwrap().error.as_ref().unwrap().kind,
        ErrorKind::Backend
    );
}

#[test]
fn cancel_pending_fails_it_without_runtime_work() {
    init_logging();
    let config = QueueConfig {
        max_concurrent: 1,
        ..QueueConfig::default()
    };
    let mut state = queue_with_urls(config, 2);
    state.schedule();
    assert_eq!(status_of(&state, 2), SubmissionStatus::Pending);

    let effects = state.cancel(2).unwrap();

    assert!(effects.is_empty());
    let item = state.store().get(2).unwrap();
    assert_eq!(item.status, SubmissionStatus::Failed);
    assert_eq!(item.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
}

#[test]
fn cancel_active_submission_stops_its_task() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 2);
    state.schedule();
    state.apply_upload_outcome(2, Ok("doc-2".to_string()));

    // One cancel while uploading, one while processing.
    assert_eq!(
        state.cancel(1).unwrap(),
        vec![Effect::CancelInFlight { id: 1 }]
    );
    assert_eq!(
        state.cancel(2).unwrap(),
        vec![Effect::CancelInFlight { id: 2 }]
    );

    for id in [1, 2] {
        let item = state.store().get(id).unwrap();
        assert_eq!(item.status, SubmissionStatus::Failed);
        assert_eq!(item.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
        assert_eq!(item.stage, None);
    }
}

#[test]
fn cancel_frees_the_slot_for_the_next_pending() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 4);
    state.schedule();
    assert_eq!(uploading_count(&state), 3);

    state.cancel(2).unwrap();
    let effects = state.schedule();

    assert!(matches!(effects[0], Effect::StartUpload { id: 4, .. }));
    assert_eq!(uploading_count(&state), 3);
}

#[test]
fn finished_submissions_cannot_be_cancelled() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 2);
    state.schedule();
    state.apply_upload_outcome(1, Ok("doc-1".to_string()));
    state.apply_poll_outcome(1, Ok(()));
    state.apply_upload_outcome(2, Err(SubmissionError::new(ErrorKind::Transfer, "boom")));

    assert_eq!(
        state.cancel(1),
        Err(TransitionError::NotCancellable {
            id: 1,
            status: SubmissionStatus::Completed,
        })
    );
    assert_eq!(
        state.cancel(2),
        Err(TransitionError::NotCancellable {
            id: 2,
            status: SubmissionStatus::Failed,
        })
    );
    assert_eq!(
        state.cancel(99),
        Err(TransitionError::UnknownSubmission(99))
    );
}

#[test]
fn retry_requeues_a_failed_submission_from_scratch() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 1);
    state.schedule();
    state.apply_upload_progress(1, 80);
    state.apply_upload_outcome(1, Err(SubmissionError::new(ErrorKind::Transfer, "boom")));

    state.retry(1).unwrap();

    let item = state.store().get(1).unwrap();
    assert_eq!(item.status, SubmissionStatus::Pending);
    assert_eq!(item.progress, 0);
    assert_eq!(item.error, None);
    assert_eq!(item.remote_id, None);

    // The next pass sends it uploading again.
    let effects = state.schedule();
    assert!(matches!(effects[0], Effect::StartUpload { id: 1, .. }));
}

#[test]
fn retry_is_rejected_unless_failed() {
    init_logging();
    let config = QueueConfig {
        max_concurrent: 1,
        ..QueueConfig::default()
    };
    let mut state = queue_with_urls(config, 2);
    state.schedule();
    state.apply_upload_outcome(1, Ok("doc-1".to_string()));

    assert_eq!(
        state.retry(1),
        Err(TransitionError::NotRetryable {
            id: 1,
            status: SubmissionStatus::Processing,
        })
    );
    assert_eq!(
        state.retry(2),
        Err(TransitionError::NotRetryable {
            id: 2,
            status: SubmissionStatus::Pending,
        })
    );
    assert_eq!(state.retry(99), Err(TransitionError::UnknownSubmission(99)));

    // A failed retry request never rewinds anyone.
    assert_eq!(status_of(&state, 1), SubmissionStatus::Processing);
    assert_eq!(status_of(&state, 2), SubmissionStatus::Pending);
}

#[test]
fn reports_arriving_after_cancellation_are_dropped() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 1);
    state.schedule();
    state.cancel(1).unwrap();

    // The worker finished before it saw the token fire; its report loses.
    let effects = state.apply_upload_outcome(1, Ok("doc-1".to_string()));
    state.apply_upload_progress(1, 90);

    assert!(effects.is_empty());
    let item = state.store().get(1).unwrap();
    assert_eq!(item.status, SubmissionStatus::Failed);
    assert_eq!(item.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(item.remote_id, None);
    assert_ne!(item.progress, 90);
}

#[test]
fn late_poll_outcome_cannot_unsettle_a_cancelled_submission() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 1);
    state.schedule();
    state.apply_upload_outcome(1, Ok("doc-1".to_string()));
    state.cancel(1).unwrap();

    state.apply_poll_outcome(1, Ok(()));

    assert_eq!(status_of(&state, 1), SubmissionStatus::Failed);
}

#[test]
fn progress_only_climbs() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 2);
    state.schedule();

    state.apply_upload_progress(1, 10);
    state.apply_upload_progress(1, 50);
    state.apply_upload_progress(1, 30);
    assert_eq!(state.store().get(1).unwrap().progress, 50);

    // Progress against a pending submission is meaningless and ignored.
    let mut bounded = QueueState::new(QueueConfig {
        max_concurrent: 1,
        ..QueueConfig::default()
    });
    bounded.add_url("https://a.example.com");
    bounded.add_url("https://b.example.com");
    bounded.schedule();
    bounded.apply_upload_progress(2, 40);
    assert_eq!(bounded.store().get(2).unwrap().progress, 0);
}

#[test]
fn stage_is_tracked_only_while_processing() {
    init_logging();
    let mut state = queue_with_urls(QueueConfig::default(), 2);
    state.schedule();

    state.apply_stage(1, IngestStage::Extracting);
    assert_eq!(state.store().get(1).unwrap().stage, None);

    state.apply_upload_outcome(1, Ok("doc-1".to_string()));
    state.apply_stage(1, IngestStage::Extracting);
    assert_eq!(
        state.store().get(1).unwrap().stage,
        Some(IngestStage::Extracting)
    );

    state.apply_poll_outcome(1, Ok(()));
    assert_eq!(state.store().get(1).unwrap().stage, None);
}

#[test]
fn upload_bound_holds_through_interleaved_operations() {
    init_logging();
    let max = 2;
    let mut state = queue_with_urls(
        QueueConfig {
            max_concurrent: max,
            ..QueueConfig::default()
        },
        6,
    );

    state.schedule();
    assert!(uploading_count(&state) <= max);

    state.apply_upload_outcome(1, Ok("doc-1".to_string()));
    state.schedule();
    assert!(uploading_count(&state) <= max);

    state.cancel(2).unwrap();
    state.schedule();
    assert!(uploading_count(&state) <= max);

    state.retry(2).unwrap();
    state.schedule();
    assert!(uploading_count(&state) <= max);

    state.apply_upload_outcome(3, Err(SubmissionError::new(ErrorKind::Transfer, "boom")));
    state.apply_poll_outcome(1, Ok(()));
    state.clear_completed();
    state.schedule();
    assert!(uploading_count(&state) <= max);

    let counts = state.snapshot().counts;
    assert_eq!(counts.uploading, max);
    assert_eq!(counts.total(), 5);
}
