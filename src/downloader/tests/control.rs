use super::*;

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let h = create_test_manager(MockProvider::new()).await;
    let id = h.manager.add_song(UserId(1), "mock", "s1", None).await.unwrap();

    // Another user's id is not visible
    for result in [
        h.manager.retry(UserId(2), id).await,
        h.manager.cancel(UserId(2), id).await,
        h.manager.remove(UserId(2), id).await,
        h.manager.retry(UserId(1), TaskId(99)).await,
    ] {
        assert!(matches!(
            result,
            Err(Error::Download(DownloadError::NotFound { .. }))
        ));
    }
    assert!(h.manager.get(UserId(2), id).await.is_err());
}

#[tokio::test]
async fn test_retry_running_task_is_rejected() {
    let provider = MockProvider::new();
    provider.script("s1", Script::Hang);
    let h = create_test_manager(provider).await;

    let id = h.manager.add_song(UserId(1), "mock", "s1", None).await.unwrap();
    wait_for_status(&h.manager, UserId(1), id, Status::Running).await;

    let err = h.manager.retry(UserId(1), id).await.unwrap_err();
    match err {
        Error::Download(DownloadError::InvalidState {
            operation,
            current_state,
            ..
        }) => {
            assert_eq!(operation, "retry");
            assert_eq!(current_state, "running");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.provider.live_downloads(), 1);
}

#[tokio::test]
async fn test_retry_done_task_is_rejected() {
    let h = create_test_manager(MockProvider::new()).await;

    let id = h.manager.add_song(UserId(1), "mock", "s1", None).await.unwrap();
    wait_for_status(&h.manager, UserId(1), id, Status::Done).await;

    let err = h.manager.retry(UserId(1), id).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Download(DownloadError::InvalidState { .. })
    ));
    assert_eq!(h.manager.get(UserId(1), id).await.unwrap().status, Status::Done);
}

#[tokio::test]
async fn test_cancel_finished_task_is_noop() {
    let provider = MockProvider::new();
    provider.script("bad", Script::Fail("boom"));
    let h = create_test_manager(provider).await;

    let done = h.manager.add_song(UserId(1), "mock", "s1", None).await.unwrap();
    let failed = h.manager.add_song(UserId(1), "mock", "bad", None).await.unwrap();
    wait_for_status(&h.manager, UserId(1), done, Status::Done).await;
    wait_for_status(&h.manager, UserId(1), failed, Status::Failed).await;

    h.manager.cancel(UserId(1), done).await.unwrap();
    h.manager.cancel(UserId(1), failed).await.unwrap();

    assert_eq!(h.manager.get(UserId(1), done).await.unwrap().status, Status::Done);
    assert_eq!(
        h.manager.get(UserId(1), failed).await.unwrap().status,
        Status::Failed
    );
}

#[tokio::test]
async fn test_remove_mid_attempt_stops_supervisor() {
    let provider = MockProvider::new();
    provider.script("s1", Script::Hang);
    let h = create_test_manager(provider).await;
    let mut events = h.manager.subscribe();

    let id = h.manager.add_song(UserId(1), "mock", "s1", None).await.unwrap();
    wait_for_status(&h.manager, UserId(1), id, Status::Running).await;
    wait_until(|| h.provider.live_downloads() == 1).await;
    assert_eq!(h.manager.active_supervisors(), 2);

    h.manager.remove(UserId(1), id).await.unwrap();
    assert!(h.manager.list(UserId(1)).await.is_empty());

    wait_until(|| h.manager.active_supervisors() == 0).await;
    assert_eq!(h.provider.live_downloads(), 0);

    let mut removed = false;
    while let Ok(event) = events.try_recv() {
        removed |= matches!(event, Event::TaskRemoved { id: TaskId(1), .. });
    }
    assert!(removed);

    assert!(matches!(
        h.manager.remove(UserId(1), id).await,
        Err(Error::Download(DownloadError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_retry_all_only_touches_failed_and_cancelled() {
    let provider = MockProvider::new();
    provider.script("bad", Script::Fail("boom"));
    provider.script("slow", Script::Hang);
    provider.script("stuck", Script::Hang);
    let h = create_test_manager(provider).await;
    let user = UserId(1);

    let bad = h.manager.add_song(user, "mock", "bad", None).await.unwrap();
    let good = h.manager.add_song(user, "mock", "good", None).await.unwrap();
    let slow = h.manager.add_song(user, "mock", "slow", None).await.unwrap();
    let stuck = h.manager.add_song(user, "mock", "stuck", None).await.unwrap();

    wait_for_status(&h.manager, user, bad, Status::Failed).await;
    wait_for_status(&h.manager, user, good, Status::Done).await;
    wait_for_status(&h.manager, user, slow, Status::Running).await;
    wait_for_status(&h.manager, user, stuck, Status::Running).await;
    h.manager.cancel(user, slow).await.unwrap();
    wait_for_status(&h.manager, user, slow, Status::Cancelled).await;

    h.provider.script("bad", Script::Bytes(b"audio"));
    h.provider.script("slow", Script::Bytes(b"audio"));

    let retried = h.manager.retry_all(user).await;
    assert_eq!(retried, vec![bad, slow]);

    wait_for_status(&h.manager, user, bad, Status::Done).await;
    wait_for_status(&h.manager, user, slow, Status::Done).await;
    assert_eq!(
        h.manager.get(user, stuck).await.unwrap().status,
        Status::Running
    );
}

#[tokio::test]
async fn test_done_prunes_done_and_cancelled() {
    let provider = MockProvider::new();
    provider.script("bad", Script::Fail("boom"));
    provider.script("slow", Script::Hang);
    let h = create_test_manager(provider).await;
    let user = UserId(1);

    let good = h.manager.add_song(user, "mock", "good", None).await.unwrap();
    let slow = h.manager.add_song(user, "mock", "slow", None).await.unwrap();
    let bad = h.manager.add_song(user, "mock", "bad", None).await.unwrap();

    wait_for_status(&h.manager, user, good, Status::Done).await;
    wait_for_status(&h.manager, user, slow, Status::Running).await;
    h.manager.cancel(user, slow).await.unwrap();
    wait_for_status(&h.manager, user, slow, Status::Cancelled).await;
    wait_for_status(&h.manager, user, bad, Status::Failed).await;

    let pruned = h.manager.done(user).await;
    assert_eq!(pruned, vec![good, slow]);

    let left: Vec<_> = h.manager.list(user).await.into_iter().map(|t| t.id).collect();
    assert_eq!(left, vec![bad]);
}

#[tokio::test]
async fn test_list_is_a_sorted_per_user_snapshot() {
    let h = create_test_manager(MockProvider::new()).await;

    for song in ["a", "b", "c"] {
        h.manager.add_song(UserId(1), "mock", song, None).await.unwrap();
    }
    h.manager.add_song(UserId(2), "mock", "z", None).await.unwrap();

    let ids: Vec<_> = h.manager.list(UserId(1)).await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TaskId(1), TaskId(2), TaskId(3)]);
    assert_eq!(h.manager.list(UserId(2)).await.len(), 1);
    assert!(h.manager.list(UserId(3)).await.is_empty());
}

#[tokio::test]
async fn test_remove_mid_save_leaves_no_partial_file() {
    let provider = MockProvider::new();
    provider.script("s1", Script::Stall(b"fLaC partial frames"));
    let h = create_fs_test_manager(provider).await;

    let id = h.manager.add_song(UserId(1), "mock", "s1", None).await.unwrap();
    wait_until(|| {
        crate::test_tools::files_under(&h.root)
            .iter()
            .any(|p| p.extension().is_some_and(|e| e == "part"))
    })
    .await;

    h.manager.remove(UserId(1), id).await.unwrap();
    wait_until(|| h.manager.active_supervisors() == 0).await;

    assert!(crate::test_tools::files_under(&h.root).is_empty());
}
