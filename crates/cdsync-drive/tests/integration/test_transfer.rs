//! Integration tests for folder creation, uploads and trash

use std::io::Write;

use wiremock::matchers::{
    bearer_token, body_json, body_string_contains, header_regex, method, path,
};
use wiremock::{Mock, ResponseTemplate};

use cdsync_core::domain::{RemoteId, RemoteKind};
use cdsync_core::ports::{IRemoteStore, NewFile, NewFolder};
use cdsync_drive::DriveError;

use crate::common::{self, ACCESS_TOKEN, LABEL};

fn rid(id: &str) -> RemoteId {
    RemoteId::new(id.to_string()).unwrap()
}

#[tokio::test]
async fn test_create_folder_posts_labelled_metadata() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v1/nodes"))
        .and(bearer_token(ACCESS_TOKEN))
        .and(body_json(serde_json::json!({
            "name": "2021",
            "kind": "FOLDER",
            "labels": [LABEL],
            "parents": ["root"]
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(common::folder_json("f2021", "2021", "root")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let node = store
        .create_folder(&NewFolder {
            name: "2021".to_string(),
            parents: vec![rid("root")],
        })
        .await
        .expect("Folder creation failed");

    assert_eq!(node.id.as_str(), "f2021");
    assert_eq!(node.kind, RemoteKind::Folder);
    assert!(node.has_parent(&rid("root")));
}

#[tokio::test]
async fn test_create_folder_name_collision() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v1/nodes"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "code": "NAME_ALREADY_EXISTS",
            "message": "Node with the name 2021 already exists under parentId root"
        })))
        .mount(&server)
        .await;

    let err = store
        .create_folder(&NewFolder {
            name: "2021".to_string(),
            parents: vec![rid("root")],
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to create folder 2021"));
    match err.downcast_ref::<DriveError>() {
        Some(DriveError::Conflict(body)) => assert!(body.contains("NAME_ALREADY_EXISTS")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_folder_expects_created_status() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v1/nodes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::folder_json("f2021", "2021", "root")),
        )
        .mount(&server)
        .await;

    let err = store
        .create_folder(&NewFolder {
            name: "2021".to_string(),
            parents: vec![rid("root")],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::UnexpectedStatus { status: 200, .. })
    ));
}

#[tokio::test]
async fn test_upload_streams_multipart_content() {
    let (server, store) = common::setup_drive_mock().await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"one").unwrap();

    Mock::given(method("POST"))
        .and(path("/cdproxy/nodes"))
        .and(bearer_token(ACCESS_TOKEN))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains(r#"name="metadata""#))
        .and(body_string_contains(
            r#"{"name":"IMG002.jpg","kind":"FILE","labels":["image-sync"],"parents":["f2021"]}"#,
        ))
        .and(body_string_contains(r#"name="content"; filename="IMG002.jpg""#))
        .and(body_string_contains("one"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json(
            "img2",
            "IMG002.jpg",
            "f2021",
            "f97c5d29941bfb1b2fdab0874906ab82",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let node = store
        .upload_file(&NewFile {
            name: "IMG002.jpg".to_string(),
            path: file.path().to_path_buf(),
            parents: vec![rid("f2021")],
        })
        .await
        .expect("Upload failed");

    assert_eq!(node.id.as_str(), "img2");
    assert_eq!(
        node.checksum.unwrap().as_str(),
        "f97c5d29941bfb1b2fdab0874906ab82"
    );
}

#[tokio::test]
async fn test_upload_of_missing_file_fails_before_request() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/cdproxy/nodes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = store
        .upload_file(&NewFile {
            name: "gone.jpg".to_string(),
            path: "/nonexistent/gone.jpg".into(),
            parents: vec![rid("root")],
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to open /nonexistent/gone.jpg"));
}

#[tokio::test]
async fn test_upload_server_error() {
    let (server, store) = common::setup_drive_mock().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"two").unwrap();

    Mock::given(method("POST"))
        .and(path("/cdproxy/nodes"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let err = store
        .upload_file(&NewFile {
            name: "IMG003.jpg".to_string(),
            path: file.path().to_path_buf(),
            parents: vec![rid("root")],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::UnexpectedStatus { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_delete_moves_node_to_trash() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/drive/v1/trash/img1"))
        .and(bearer_token(ACCESS_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "img1",
            "status": "TRASH"
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store.supports_delete());
    store.delete_node(&rid("img1")).await.expect("Delete failed");
}

#[tokio::test]
async fn test_delete_unknown_node() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/drive/v1/trash/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such node"))
        .mount(&server)
        .await;

    let err = store.delete_node(&rid("missing")).await.unwrap_err();
    assert!(err.to_string().contains("Failed to move node missing to trash"));
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::NotFound(_))
    ));
}
