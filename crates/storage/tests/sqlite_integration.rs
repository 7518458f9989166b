use learn_core::model::{CourseId, Word};
use serde_json::{Value, json};
use storage::repository::{DocPath, DocumentStore, collections};
use storage::seed::seed_demo_course;
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn path(raw: &str) -> DocPath {
    raw.parse().expect("path")
}

#[tokio::test]
async fn sqlite_roundtrips_documents_and_field_writes() {
    let repo = connect("memdb_docs_roundtrip").await;

    repo.set_value(
        &path("progress/p1"),
        json!({ "userId": "u1", "courseId": "c1", "learnProgress": 0 }),
    )
    .await
    .unwrap();
    repo.set_value(&path("progress/p1/learnProgress"), json!(40))
        .await
        .unwrap();

    let doc = repo.get_by_id("progress", "p1").await.unwrap().unwrap();
    assert_eq!(doc.value["learnProgress"], json!(40));
    assert_eq!(doc.value["userId"], json!("u1"));

    // field write on a missing document creates it
    repo.set_value(&path("progress/p2/learnProgress"), json!(5))
        .await
        .unwrap();
    assert_eq!(
        repo.raw_body("progress", "p2").await.unwrap(),
        Some(json!({ "learnProgress": 5 }))
    );

    repo.set_value(&path("progress/p2"), Value::Null).await.unwrap();
    assert!(repo.get_by_id("progress", "p2").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_query_equal_matches_only_requested_course() {
    let repo = connect("memdb_docs_query").await;
    let course = CourseId::new("spanish").unwrap();
    seed_demo_course(&repo, &course).await.unwrap();
    seed_demo_course(&repo, &CourseId::new("other").unwrap())
        .await
        .unwrap();

    let links = repo
        .query_equal(collections::COURSE_WORDS, "courseId", &json!("spanish"))
        .await
        .unwrap();
    assert_eq!(links.len(), 6);
    assert!(links.iter().all(|l| l.value["courseId"] == json!("spanish")));

    let none = repo
        .query_equal(collections::COURSE_WORDS, "courseId", &json!("missing"))
        .await
        .unwrap();
    assert!(none.is_empty());

    let word: Word = repo
        .get_by_id(collections::WORDS, "w-hola")
        .await
        .unwrap()
        .unwrap()
        .decode_keyed()
        .unwrap()
        .unwrap();
    assert_eq!(word.meaning, "hello");
}

#[tokio::test]
async fn sqlite_conditional_writes() {
    let repo = connect("memdb_docs_conditional").await;

    assert!(repo
        .create_if_absent("progress", "u1_c1", json!({ "learnProgress": 0 }))
        .await
        .unwrap());
    assert!(!repo
        .create_if_absent("progress", "u1_c1", json!({ "learnProgress": 99 }))
        .await
        .unwrap());

    let field = path("progress/u1_c1/learnProgress");
    assert!(!repo
        .compare_and_set(&field, Some(&json!(10)), json!(20))
        .await
        .unwrap());
    assert!(repo
        .compare_and_set(&field, Some(&json!(0)), json!(20))
        .await
        .unwrap());
    assert_eq!(
        repo.raw_body("progress", "u1_c1").await.unwrap(),
        Some(json!({ "learnProgress": 20 }))
    );

    // missing document never matches a field CAS
    assert!(!repo
        .compare_and_set(&path("progress/none/learnProgress"), None, json!(1))
        .await
        .unwrap());
}

#[tokio::test]
async fn sqlite_push_new_reserves_without_writing() {
    let repo = connect("memdb_docs_push").await;
    let a = repo.push_new("progress").await.unwrap();
    let b = repo.push_new("progress").await.unwrap();
    assert_ne!(a, b);
    assert!(repo.list("progress").await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_compare_and_set_treats_null_field_as_absent() {
    let repo = connect("memdb_docs_null_cas").await;
    repo.set_value(&path("progress/p1"), json!({ "learnProgress": null }))
        .await
        .unwrap();

    let field = path("progress/p1/learnProgress");
    assert!(!repo
        .compare_and_set(&field, Some(&json!(0)), json!(5))
        .await
        .unwrap());
    assert!(repo.compare_and_set(&field, None, json!(5)).await.unwrap());
    assert_eq!(
        repo.raw_body("progress", "p1").await.unwrap(),
        Some(json!({ "learnProgress": 5 }))
    );
}
