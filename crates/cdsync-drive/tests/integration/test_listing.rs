//! Integration tests for paginated node listing

use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use cdsync_core::domain::RemoteKind;
use cdsync_core::ports::{IRemoteStore, ListQuery};
use cdsync_drive::DriveError;
use cdsync_sync::lister;

use crate::common::{self, ACCESS_TOKEN};

const MD5: &str = "f97c5d29941bfb1b2fdab0874906ab82";

#[tokio::test]
async fn test_list_page_sends_filter_and_limit() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .and(bearer_token(ACCESS_TOKEN))
        .and(query_param("filters", "kind:FOLDER"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("startToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 2,
            "data": [common::root_json("root"), common::folder_json("f2020", "2020", "root")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = store
        .list_page(&ListQuery::folders(), None)
        .await
        .expect("Listing failed");

    assert_eq!(page.nodes.len(), 2);
    assert_eq!(page.count, Some(2));
    assert!(page.next_token.is_none());
    assert!(page.nodes[0].is_root);
    assert_eq!(page.nodes[1].name, "2020");
}

#[tokio::test]
async fn test_lister_follows_next_token() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .and(query_param("startToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 3,
            "data": [common::folder_json("f2021", "2021", "root")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .and(query_param_is_missing("startToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 3,
            "nextToken": "page-2",
            "data": [common::root_json("root"), common::folder_json("f2020", "2020", "root")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tree = lister::list_folders(&store).await.expect("Listing failed");

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.root().id.as_str(), "root");
    let root_id = tree.root().id.clone();
    assert!(tree.find_child(&root_id, "2021").is_some());
}

#[tokio::test]
async fn test_file_listing_uses_configured_filter() {
    let (server, store) = common::setup_drive_mock().await;
    let filter = "kind:FILE AND contentProperties.contentType:(image*)";

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .and(query_param("filters", filter))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "data": [common::file_json("img1", "IMG001.jpg", "f2020", MD5)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let files = lister::list_files(&store, Some(filter.to_string()))
        .await
        .expect("Listing failed");

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].kind, RemoteKind::File);
    assert_eq!(files[0].checksum.as_ref().unwrap().as_str(), MD5);
    assert_eq!(files[0].parents[0].as_str(), "f2020");
}

#[tokio::test]
async fn test_server_error_fails_listing() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = store
        .list_page(&ListQuery::folders(), None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Listing request failed"));
    match err.downcast_ref::<DriveError>() {
        Some(DriveError::UnexpectedStatus { status, body }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "internal");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "message": "Token has expired"
        })))
        .mount(&server)
        .await;

    let err = store
        .list_page(&ListQuery::files(None), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_listing_before_open_fails() {
    let server = wiremock::MockServer::start().await;
    let client = cdsync_drive::DriveClient::new(
        std::sync::Arc::new(common::StaticCredentials),
        common::discovery_url(&server),
    );
    let store = cdsync_drive::CloudDriveStore::new(client, 200, common::LABEL);

    let err = store
        .list_page(&ListQuery::folders(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::MissingEndpoint(_))
    ));
}
