use crate::db::*;
use crate::error::DatabaseError;
use crate::provider::InstanceDirectory;
use crate::types::UserId;
use crate::Error;
use tempfile::NamedTempFile;

/// Helper: create a fresh database with migrations applied
async fn setup_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn hifi(user_id: u64, url: &str) -> NewInstance<'_> {
    NewInstance {
        user_id,
        api: "hifi",
        provider: "tidal",
        url,
    }
}

#[tokio::test]
async fn test_add_and_list_instances() {
    let (db, _temp) = setup_db().await;

    let first = db
        .add_instance(&hifi(1, "https://a.example.org/"))
        .await
        .unwrap();
    db.add_instance(&hifi(1, "https://b.example.org"))
        .await
        .unwrap();

    assert_eq!(first.url, "https://a.example.org");
    assert_eq!(first.api, "hifi");
    assert_eq!(first.provider, "tidal");

    let listed = db.list_instances(UserId(1), "hifi").await.unwrap();
    let urls: Vec<_> = listed.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://a.example.org", "https://b.example.org"]);
    assert_eq!(listed[0], first);
}

#[tokio::test]
async fn test_duplicate_instance_is_constraint_violation() {
    let (db, _temp) = setup_db().await;

    db.add_instance(&hifi(1, "https://a.example.org"))
        .await
        .unwrap();
    let err = db
        .add_instance(&hifi(1, "https://a.example.org/"))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Error::Database(DatabaseError::ConstraintViolation(_))
        ),
        "unexpected error: {:?}",
        err
    );

    // Another user may register the same url
    db.add_instance(&hifi(2, "https://a.example.org"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_instances_are_scoped_by_user_and_api() {
    let (db, _temp) = setup_db().await;

    db.add_instance(&hifi(1, "https://a.example.org"))
        .await
        .unwrap();
    db.add_instance(&hifi(2, "https://b.example.org"))
        .await
        .unwrap();
    db.add_instance(&NewInstance {
        user_id: 1,
        api: "other",
        provider: "elsewhere",
        url: "https://c.example.org",
    })
    .await
    .unwrap();

    let user_one = db.list_instances(UserId(1), "hifi").await.unwrap();
    assert_eq!(user_one.len(), 1);
    assert_eq!(user_one[0].url, "https://a.example.org");

    let all = db.list_user_instances(UserId(1)).await.unwrap();
    let apis: Vec<_> = all.iter().map(|i| i.api.as_str()).collect();
    assert_eq!(apis, vec!["hifi", "other"]);

    assert!(db.list_instances(UserId(3), "hifi").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_urls_are_rejected() {
    let (db, _temp) = setup_db().await;

    for url in ["not a url", "ftp://files.example.org", ""] {
        let err = db.add_instance(&hifi(1, url)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{}: {:?}", url, err);
    }
    assert!(db.list_user_instances(UserId(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_instance() {
    let (db, _temp) = setup_db().await;

    let instance = db
        .add_instance(&hifi(1, "https://a.example.org"))
        .await
        .unwrap();

    // Other users cannot remove it
    let err = db.remove_instance(UserId(2), instance.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    db.remove_instance(UserId(1), instance.id).await.unwrap();
    assert!(db.list_instances(UserId(1), "hifi").await.unwrap().is_empty());

    let err = db.remove_instance(UserId(1), instance.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_database_is_an_instance_directory() {
    let (db, _temp) = setup_db().await;

    db.add_instance(&hifi(7, "https://a.example.org/"))
        .await
        .unwrap();

    let directory: &dyn InstanceDirectory = &db;
    let urls = directory.list_instances(UserId(7), "hifi").await.unwrap();
    assert_eq!(urls, vec!["https://a.example.org".to_string()]);
}
