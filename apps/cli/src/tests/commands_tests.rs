use super::*;
use std::sync::Arc;

use client_core::{ImageStore, MemoryRecordStore, RecordStore};
use serde_json::json;
use tempfile::TempDir;

fn setup() -> (ViewStateCoordinator, Arc<MemoryRecordStore>, TempDir) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryRecordStore::new());
    let coordinator = ViewStateCoordinator::new(
        store.clone(),
        ImageStore::new(temp.path().join("userImages")),
    );
    (coordinator, store, temp)
}

async fn exec(coordinator: &ViewStateCoordinator, command: Command) -> String {
    let mut out = Vec::new();
    run(coordinator, command, &mut out).await.expect("command");
    String::from_utf8(out).expect("utf8")
}

#[tokio::test]
async fn add_then_list_with_search() {
    let (coordinator, _store, _temp) = setup();

    for (name, age) in [("bob", "40"), ("Anna", "22"), ("Alina", "35")] {
        let output = exec(
            &coordinator,
            Command::Add {
                name: name.into(),
                age: age.into(),
                image: None,
            },
        )
        .await;
        assert!(output.starts_with("saved "), "unexpected output: {output}");
    }

    let listing = exec(&coordinator, Command::List { search: "".into() }).await;
    let names: Vec<&str> = listing
        .lines()
        .map(|line| line.split('\t').nth(2).expect("name column"))
        .collect();
    assert_eq!(names, ["Alina", "Anna", "bob"]);

    let listing = exec(&coordinator, Command::List { search: "AN".into() }).await;
    assert_eq!(listing.lines().count(), 1);
    assert!(listing.contains("\tAnna\t22\t-"));
}

#[tokio::test]
async fn add_with_invalid_age_saves_nothing() {
    let (coordinator, store, _temp) = setup();
    let output = exec(
        &coordinator,
        Command::Add {
            name: "Alice".into(),
            age: "old".into(),
            image: None,
        },
    )
    .await;
    assert!(output.starts_with("nothing saved"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn add_with_image_then_export_it() {
    let (coordinator, _store, temp) = setup();
    let photo = temp.path().join("photo.jpg");
    std::fs::write(&photo, b"jpeg-bytes").expect("photo");

    let output = exec(
        &coordinator,
        Command::Add {
            name: "Alice".into(),
            age: "30".into(),
            image: Some(photo),
        },
    )
    .await;
    let id = output.trim().strip_prefix("saved ").expect("id").to_string();

    let exported = temp.path().join("exported.jpg");
    exec(
        &coordinator,
        Command::ExportImage {
            id,
            out: exported.clone(),
        },
    )
    .await;
    assert_eq!(std::fs::read(exported).expect("exported"), b"jpeg-bytes");
}

#[tokio::test]
async fn edit_updates_in_place() {
    let (coordinator, store, _temp) = setup();
    store
        .insert_raw("a1", json!({ "id": "a1", "name": "Alice", "age": 30 }))
        .await;

    let output = exec(
        &coordinator,
        Command::Edit {
            id: "a1".into(),
            name: None,
            age: Some("31".into()),
            image: None,
        },
    )
    .await;
    assert_eq!(output.trim(), "updated a1");

    let records = store.fetch_all().await.expect("fetch");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Alice");
    assert_eq!(records[0].age, 31);
}

#[tokio::test]
async fn edit_of_unknown_id_fails() {
    let (coordinator, _store, _temp) = setup();
    let mut out = Vec::new();
    let result = run(
        &coordinator,
        Command::Edit {
            id: "missing".into(),
            name: None,
            age: None,
            image: None,
        },
        &mut out,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn delete_by_id_and_by_filtered_position() {
    let (coordinator, store, _temp) = setup();
    for (id, name) in [("1", "Alice"), ("2", "Bob"), ("3", "Carla")] {
        store
            .insert_raw(id, json!({ "id": id, "name": name, "age": 20 }))
            .await;
    }

    let output = exec(&coordinator, Command::Delete { ids: vec!["2".into()] }).await;
    assert_eq!(output.trim(), "2 record(s) remain");

    let output = exec(
        &coordinator,
        Command::DeleteAt {
            search: "carla".into(),
            positions: vec![0],
        },
    )
    .await;
    assert_eq!(output.trim(), "1 record(s) remain");

    let remaining = store.fetch_all().await.expect("fetch");
    assert_eq!(remaining[0].name, "Alice");
}

#[tokio::test]
async fn export_without_image_fails() {
    let (coordinator, store, temp) = setup();
    store
        .insert_raw("a1", json!({ "id": "a1", "name": "Alice", "age": 30 }))
        .await;

    let mut out = Vec::new();
    let result = run(
        &coordinator,
        Command::ExportImage {
            id: "a1".into(),
            out: temp.path().join("none.jpg"),
        },
        &mut out,
    )
    .await;
    assert!(result.is_err());
}
