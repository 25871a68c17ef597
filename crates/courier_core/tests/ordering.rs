use courier_core::{QueueConfig, QueueState, SubmissionId, SubmissionStatus};

fn ids(state: &QueueState) -> Vec<SubmissionId> {
    state.store().iter().map(|item| item.id).collect()
}

/// Drives one submission from pending all the way to completed.
fn complete(state: &mut QueueState, id: SubmissionId) {
    state.apply_upload_outcome(id, Ok(format!("doc-{id}")));
    state.apply_poll_outcome(id, Ok(()));
}

#[test]
fn insertion_order_survives_out_of_order_completion() {
    let mut state = QueueState::new(QueueConfig::default());
    state.add_url("https://a.example.com");
    state.add_url("https://b.example.com");
    state.add_url("https://c.example.com");
    state.schedule();

    // Finish the middle one first, then the last, then the first.
    complete(&mut state, 2);
    complete(&mut state, 3);
    complete(&mut state, 1);

    assert_eq!(ids(&state), vec![1, 2, 3]);
    let snapshot = state.snapshot();
    assert_eq!(snapshot.counts.completed, 3);
    assert_eq!(
        snapshot.items.iter().map(|item| item.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn clear_completed_keeps_the_rest_in_order() {
    let mut state = QueueState::new(QueueConfig {
        max_concurrent: 2,
        ..QueueConfig::default()
    });
    for n in 1..=4 {
        state.add_url(format!("https://{n}.example.com"));
    }
    state.schedule();

    // 1 completes and 2 fails, freeing both slots for 3 and 4.
    complete(&mut state, 1);
    state.apply_upload_outcome(
        2,
        Err(courier_core::SubmissionError::new(
            courier_core::ErrorKind::Transfer,
            "connection reset",
        )),
    );
    state.schedule();

    let removed = state.clear_completed();

    assert_eq!(removed, 1);
    assert_eq!(ids(&state), vec![2, 3, 4]);
    let statuses: Vec<SubmissionStatus> =
        state.store().iter().map(|item| item.status).collect();
    assert_eq!(
        statuses,
        vec![
            SubmissionStatus::Failed,
            SubmissionStatus::Uploading,
            SubmissionStatus::Uploading,
        ]
    );
}

#[test]
fn clear_completed_on_empty_queue_is_a_no_op() {
    let mut state = QueueState::new(QueueConfig::default());
    assert_eq!(state.clear_completed(), 0);
}

#[test]
fn ids_are_never_reused_after_clearing() {
    let mut state = QueueState::new(QueueConfig::default());
    let first = state.add_url("https://a.example.com");
    state.schedule();
    complete(&mut state, first);
    state.clear_completed();

    let second = state.add_url("https://b.example.com");

    assert!(second > first);
    assert_eq!(ids(&state), vec![second]);
}
