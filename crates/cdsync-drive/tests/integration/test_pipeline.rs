//! Full sync runs against the mocked drive

use std::sync::Arc;

use wiremock::matchers::{body_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cdsync_core::config::ConfigBuilder;
use cdsync_sync::pipeline::{PipelineOptions, PipelineOutcome, SyncPipeline};

use crate::common::{self, LABEL};

/// md5("one")
const ONE_MD5: &str = "f97c5d29941bfb1b2fdab0874906ab82";

/// `<tmp>/Pictures/2021/IMG002.jpg` containing "one"
fn local_pictures() -> (tempfile::TempDir, std::path::PathBuf) {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path().join("Pictures");
    std::fs::create_dir_all(root.join("2021")).unwrap();
    std::fs::write(root.join("2021").join("IMG002.jpg"), b"one").unwrap();
    std::fs::write(root.join("2021").join("notes.txt"), b"skip me").unwrap();
    (tmp, root)
}

async fn mount_listings(
    server: &MockServer,
    folders: Vec<serde_json::Value>,
    files: Vec<serde_json::Value>,
) {
    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .and(query_param("filters", "kind:FOLDER"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": folders.len(),
            "data": folders
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .and(query_param("filters", "kind:FILE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": files.len(),
            "data": files
        })))
        .mount(server)
        .await;
}

fn pipeline(server: &MockServer, root: std::path::PathBuf, dry_run: bool) -> SyncPipeline {
    let mut config = ConfigBuilder::new()
        .sync_path(root)
        .sync_dry_run(dry_run)
        .build();
    config.drive.file_filter = String::new();

    let options = PipelineOptions::from_config(&config).expect("Invalid options");
    SyncPipeline::new(Arc::new(common::store_for(server)), options)
}

#[tokio::test]
async fn test_missing_folder_is_created_then_file_uploaded() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    mount_listings(
        &server,
        vec![
            common::root_json("root"),
            common::folder_json("fpics", "Pictures", "root"),
        ],
        vec![],
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/drive/v1/nodes"))
        .and(body_json(serde_json::json!({
            "name": "2021",
            "kind": "FOLDER",
            "labels": [LABEL],
            "parents": ["fpics"]
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(common::folder_json("f2021", "2021", "fpics")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cdproxy/nodes"))
        .and(body_string_contains(r#""name":"IMG002.jpg""#))
        .and(body_string_contains(r#""parents":["f2021"]"#))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json(
            "img2",
            "IMG002.jpg",
            "f2021",
            ONE_MD5,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (_tmp, root) = local_pictures();
    let result = pipeline(&server, root, false).run().await.expect("Sync failed");

    assert_eq!(result.outcome, PipelineOutcome::Completed);
    assert_eq!(result.report.files_scanned, 2);
    assert_eq!(result.report.files_matched, 1);
    assert_eq!(result.report.folders_matched, 1);
    assert_eq!(result.report.folders_created, 1);
    assert_eq!(result.report.files_uploaded, 1);
}

#[tokio::test]
async fn test_matching_remote_state_is_nothing_to_do() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    mount_listings(
        &server,
        vec![
            common::root_json("root"),
            common::folder_json("fpics", "Pictures", "root"),
            common::folder_json("f2021", "2021", "fpics"),
        ],
        vec![common::file_json("img2", "img002.JPG", "f2021", ONE_MD5)],
    )
    .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (_tmp, root) = local_pictures();
    let result = pipeline(&server, root, false).run().await.expect("Sync failed");

    assert_eq!(result.outcome, PipelineOutcome::NothingToDo);
    assert_eq!(result.report.files_kept, 1);
    assert_eq!(result.report.files_uploaded, 0);
    assert_eq!(result.report.folders_created, 0);
}

#[tokio::test]
async fn test_dry_run_issues_no_mutations() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;
    mount_listings(&server, vec![common::root_json("root")], vec![]).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (_tmp, root) = local_pictures();
    let result = pipeline(&server, root, true).run().await.expect("Sync failed");

    assert!(result.report.dry_run);
    assert_eq!(result.report.folders_planned, 2);
    assert_eq!(result.report.files_uploaded, 1);
}

#[tokio::test]
async fn test_listing_failure_names_stage() {
    let server = MockServer::start().await;
    common::mount_discovery(&server).await;

    Mock::given(method("GET"))
        .and(path("/drive/v1/nodes"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_tmp, root) = local_pictures();
    let err = pipeline(&server, root, false).run().await.unwrap_err();
    assert_eq!(err.to_string(), "stage ListRemoteFolders failed");
}
