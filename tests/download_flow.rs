//! End-to-end download flow against mock hifi-api instances
//!
//! Covers instance registration through the database, album expansion from a
//! catalogue link, instance racing with broken and slow mirrors, and files
//! landing in the library.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{AUDIO, start_broken_instance, start_cdn, start_instance, wait_for_status};
use music_dl::config::Config;
use music_dl::{
    Database, DownloadManager, Error, FsLibrary, ProviderRegistry, Status, TaskId, UserId,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const USER: UserId = UserId(1);

struct Stack {
    manager: DownloadManager,
    db: Arc<Database>,
    providers: ProviderRegistry,
    library: FsLibrary,
    _temp_dir: TempDir,
}

async fn build_stack() -> Stack {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.download.library_dir = temp_dir.path().join("library");
    config.download.shutdown_timeout = Duration::from_secs(5);
    config.persistence.database_path = temp_dir.path().join("music-dl.db");
    config.resolver.instance_timeout = Duration::from_secs(2);
    config.tools.ffmpeg_path = None;
    config.tools.search_path = false;

    let db = Arc::new(Database::new(&config.persistence.database_path).await.unwrap());
    let providers = ProviderRegistry::with_defaults(&config, db.clone()).unwrap();
    let library = FsLibrary::new(&config.download.library_dir);

    let manager = DownloadManager::new(config, providers.clone(), Arc::new(library.clone()))
        .await
        .unwrap();

    Stack {
        manager,
        db,
        providers,
        library,
        _temp_dir: temp_dir,
    }
}

#[tokio::test]
async fn album_link_downloads_every_track_into_the_library() {
    let cdn = start_cdn().await;
    let instance = start_instance(&cdn, Duration::ZERO).await;
    let stack = build_stack().await;

    let registered = stack
        .db
        .add_detected_instance(&stack.providers, &CancellationToken::new(), USER, &instance.uri())
        .await
        .unwrap();
    assert_eq!(registered.api, "hifi");
    assert_eq!(registered.provider, "tidal");

    let ids = stack
        .manager
        .add_url(USER, "hifi", "https://tidal.com/browse/album/55", None)
        .await
        .unwrap();
    assert_eq!(ids, vec![TaskId(1), TaskId(2)]);

    for id in &ids {
        let task = wait_for_status(&stack.manager, USER, *id, Status::Done, Duration::from_secs(10)).await;
        assert_eq!(task.data.unwrap().album.title, "The Album");
    }

    let root = stack.library.root().join("1").join("The Band").join("The Album");
    assert_eq!(tokio::fs::read(root.join("04 - Fourth Song.flac")).await.unwrap(), AUDIO);
    assert_eq!(tokio::fs::read(root.join("05 - Fifth Song.flac")).await.unwrap(), AUDIO);

    stack.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn broken_and_slow_mirrors_do_not_block_the_download() {
    let cdn = start_cdn().await;
    let broken = start_broken_instance().await;
    let slow = start_instance(&cdn, Duration::from_secs(5)).await;
    let healthy = start_instance(&cdn, Duration::from_millis(100)).await;
    let stack = build_stack().await;

    for server in [&broken, &slow, &healthy] {
        stack
            .db
            .add_instance(&music_dl::db::NewInstance {
                user_id: USER.0,
                api: "hifi",
                provider: "tidal",
                url: &server.uri(),
            })
            .await
            .unwrap();
    }

    let started = Instant::now();
    let id = stack.manager.add_song(USER, "hifi", "4", None).await.unwrap();
    wait_for_status(&stack.manager, USER, id, Status::Done, Duration::from_secs(10)).await;

    // The slow mirror is abandoned instead of waited for
    assert!(started.elapsed() < Duration::from_secs(4));

    tokio::time::timeout(Duration::from_secs(5), async {
        while stack.manager.active_supervisors() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    stack.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn task_fails_without_instances_and_recovers_on_retry() {
    let cdn = start_cdn().await;
    let instance = start_instance(&cdn, Duration::ZERO).await;
    let stack = build_stack().await;

    let id = stack.manager.add_song(USER, "hifi", "4", None).await.unwrap();
    let task = wait_for_status(&stack.manager, USER, id, Status::Failed, Duration::from_secs(10)).await;
    assert!(task.error.unwrap().contains("no hifi instance succeeded"));

    stack
        .db
        .add_detected_instance(&stack.providers, &CancellationToken::new(), USER, &instance.uri())
        .await
        .unwrap();
    stack.manager.retry(USER, id).await.unwrap();

    let task = wait_for_status(&stack.manager, USER, id, Status::Done, Duration::from_secs(10)).await;
    assert_eq!(task.data.unwrap().title, "Fourth Song");

    stack.manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn unrecognised_instance_is_not_registered() {
    let broken = start_broken_instance().await;
    let stack = build_stack().await;

    let err = stack
        .db
        .add_detected_instance(&stack.providers, &CancellationToken::new(), USER, &broken.uri())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(stack.db.list_user_instances(USER).await.unwrap().is_empty());
}
