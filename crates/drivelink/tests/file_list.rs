mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{drive, fields};

async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "c", "title": "C"}]
        })))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v2/files"))
        .and(query_param("supportsAllDrives", "true"))
        .and(query_param("includeItemsFromAllDrives", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "a", "title": "A"}, {"id": "b", "title": "B"}],
            "nextPageToken": "page-2"
        })))
        .mount(server)
        .await;
}

fn ids(files: &[drivelink::DriveFile]) -> Vec<String> {
    files
        .iter()
        .filter_map(|f| f.id().map(str::to_owned))
        .collect()
}

#[tokio::test]
async fn get_list_walks_every_page() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let drive = drive(&server);
    let mut list = drive.list_file(Some(fields(json!({"q": "trashed=false"}))));
    let files = list.get_list().await.unwrap();

    assert_eq!(ids(&files), vec!["a", "b", "c"]);
    assert!(files.iter().all(|f| f.is_uploaded()));
    assert!(files.iter().all(|f| f.get_changes().is_empty()));
    assert!(list.param("maxResults").is_none());
    assert!(list.is_exhausted());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first = requests[0].url.query().unwrap_or_default().to_string();
    assert!(first.contains("maxResults=1000"));
    assert!(first.contains("q=trashed%3Dfalse"));
}

#[tokio::test]
async fn null_page_size_walks_every_page() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let drive = drive(&server);
    let mut list = drive.list_file(Some(fields(json!({"maxResults": null}))));
    let files = list.get_list().await.unwrap();

    assert_eq!(ids(&files), vec!["a", "b", "c"]);
    assert_eq!(list.param("maxResults"), Some(&json!(null)));

    let requests = server.received_requests().await.unwrap();
    let first = requests[0].url.query().unwrap_or_default().to_string();
    assert!(first.contains("maxResults=1000"));
}

#[tokio::test]
async fn explicit_page_size_returns_one_page_at_a_time() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let drive = drive(&server);
    let mut list = drive.list_file(None);
    list.set_param("maxResults", 2);

    assert_eq!(ids(&list.get_list().await.unwrap()), vec!["a", "b"]);
    assert_eq!(ids(&list.get_list().await.unwrap()), vec!["c"]);
    assert!(list.get_list().await.unwrap().is_empty());

    list.reset();
    assert_eq!(ids(&list.get_list().await.unwrap()), vec!["a", "b"]);
}

#[tokio::test]
async fn next_page_signals_the_end() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let drive = drive(&server);
    let mut list = drive.list_file(None);

    assert_eq!(list.next_page().await.unwrap().map(|p| p.len()), Some(2));
    assert_eq!(list.next_page().await.unwrap().map(|p| p.len()), Some(1));
    assert!(list.next_page().await.unwrap().is_none());
}
