mod common;

use common::{StubTransport, client, requests};
use futures::TryStreamExt;
use object_transfer::StorageError;
use reqwest::{Method, StatusCode};

#[tokio::test]
async fn walks_pages_until_no_content() {
    let stub = StubTransport::new()
        .then_json(r#"[{"name":"a","bytes":1,"hash":"h1"},{"name":"b","bytes":2}]"#)
        .then_json(r#"[{"name":"c","bytes":3,"last_modified":"2011-03-04T15:13:31.123450"}]"#)
        .then_status(StatusCode::NO_CONTENT);
    let (client, log) = client(stub, 10);

    let mut cursor = client.list_container_objects("docs").unwrap();
    let mut names = Vec::new();
    while let Some(obj) = cursor.next().await.unwrap() {
        assert_eq!(obj.container, "docs");
        names.push(obj.name);
    }
    assert_eq!(names, ["a", "b", "c"]);
    assert!(cursor.is_exhausted());
    assert_eq!(cursor.requests_issued(), 3);

    // Exhausted cursors don't go back to the server.
    assert!(cursor.next().await.unwrap().is_none());
    assert!(cursor.next_page().await.unwrap().is_none());

    let seen = requests(&log);
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|r| r.method == Method::GET && r.path == "/docs"));
    assert_eq!(seen[0].query_value("marker"), None);
    assert_eq!(seen[1].query_value("marker"), Some("b"));
    assert_eq!(seen[2].query_value("marker"), Some("c"));
}

#[tokio::test]
async fn entries_carry_listing_fields() {
    let stub = StubTransport::new().then_json(
        r#"[{"name":"x.txt","bytes":12,"hash":"abc","content_type":"text/plain",
             "last_modified":"2011-03-04T15:13:31.123450"}]"#,
    );
    let (client, _) = client(stub, 10);

    let mut cursor = client.list_container_objects("docs").unwrap();
    let page = cursor.next_page().await.unwrap().unwrap();
    assert_eq!(page.marker.as_deref(), Some("x.txt"));
    assert!(!page.exhausted);

    let obj = &page.entries[0];
    assert_eq!(obj.size, 12);
    assert_eq!(obj.hash.as_deref(), Some("abc"));
    assert_eq!(obj.content_type.as_deref(), Some("text/plain"));
    assert!(obj.last_modified.is_some());
    assert_eq!(cursor.marker(), Some("x.txt"));
}

#[tokio::test]
async fn empty_page_ends_the_listing() {
    let stub = StubTransport::new()
        .then_json(r#"[{"name":"only"}]"#)
        .then_json("[]");
    let (client, log) = client(stub, 10);

    let all = client
        .list_container_objects("docs")
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(requests(&log).len(), 2);
}

#[tokio::test]
async fn empty_container_yields_nothing() {
    let (client, log) = client(StubTransport::new().then_status(StatusCode::NO_CONTENT), 10);
    let mut cursor = client.list_container_objects("empty").unwrap();
    assert!(cursor.next().await.unwrap().is_none());
    assert_eq!(requests(&log).len(), 1);
}

#[tokio::test]
async fn restart_begins_again_without_marker() {
    let stub = StubTransport::new()
        .then_json(r#"[{"name":"a"}]"#)
        .then_json(r#"[{"name":"a"}]"#);
    let (client, log) = client(stub, 10);

    let mut cursor = client.list_container_objects("docs").unwrap();
    cursor.next_page().await.unwrap();
    assert_eq!(cursor.marker(), Some("a"));

    cursor.restart();
    assert_eq!(cursor.marker(), None);
    cursor.next_page().await.unwrap();

    let seen = requests(&log);
    assert_eq!(seen[1].query_value("marker"), None);
}

#[tokio::test]
async fn unexpected_status_is_reported() {
    let (client, _) = client(StubTransport::new().then_status(StatusCode::NOT_FOUND), 10);
    let mut cursor = client.list_container_objects("gone").unwrap();
    let err = cursor.next().await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::UnexpectedStatus { status } if status == StatusCode::NOT_FOUND
    ));
}

#[tokio::test]
async fn non_json_listing_is_malformed() {
    let (client, _) = client(
        StubTransport::new().then(|_| {
            object_transfer::TransportResponse::from_bytes(
                StatusCode::OK,
                Default::default(),
                "a\nb\n",
            )
        }),
        10,
    );
    let mut cursor = client.list_container_objects("docs").unwrap();
    let err = cursor.next().await.unwrap_err();
    assert!(matches!(err, StorageError::MalformedResponse { .. }));
}

#[tokio::test]
async fn account_listing_streams_containers() {
    let stub = StubTransport::new()
        .then_json(r#"[{"name":"backups","count":3,"bytes":300},{"name":"docs","count":1,"bytes":5}]"#)
        .then_status(StatusCode::NO_CONTENT);
    let (client, log) = client(stub, 10);

    let containers: Vec<_> = client.list_containers().into_stream().try_collect().await.unwrap();
    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0].name, "backups");
    assert_eq!(containers[0].object_count, 3);
    assert_eq!(containers[0].size, 300);

    let seen = requests(&log);
    assert_eq!(seen[0].path, "");
    assert_eq!(seen[1].query_value("marker"), Some("docs"));
}

#[test]
fn invalid_container_name_fails_before_listing() {
    let (client, log) = client(StubTransport::new(), 10);
    let err = client.list_container_objects("a/b").err().unwrap();
    assert!(matches!(err, StorageError::InvalidContainerName { .. }));
    assert!(requests(&log).is_empty());
}
