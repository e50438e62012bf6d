mod common;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{settings, valid_token};
use drivelink::client::{DriveClient, NO_QUERY};
use drivelink::DriveErrorKind;

fn client(server: &MockServer, max_retries: u32) -> DriveClient {
    let mut config = settings(server).http;
    config.max_retries = max_retries;
    let mut client = DriveClient::new(config).unwrap();
    client.set_token(valid_token());
    client
}

#[tokio::test]
async fn transient_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v2/about"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v2/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "me"})))
        .mount(&server)
        .await;

    let client = client(&server, 1);
    let about: Value = client
        .get_json(&client.api_url("about"), NO_QUERY)
        .await
        .unwrap();
    assert_eq!(about["name"], "me");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v2/about"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client(&server, 0);
    let err = client
        .get_json::<Value, _>(&client.api_url("about"), NO_QUERY)
        .await
        .unwrap_err();
    assert_eq!(err.kind, DriveErrorKind::ServerError);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn forbidden_reasons_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v2/files/scoped"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "Insufficient Permission",
                "errors": [{"reason": "insufficientPermissions"}]
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server, 0);
    let err = client
        .get_json::<Value, _>(&client.api_url("files/scoped"), NO_QUERY)
        .await
        .unwrap_err();
    assert_eq!(err.kind, DriveErrorKind::InsufficientScope);
    assert_eq!(err.reason.as_deref(), Some("insufficientPermissions"));
    assert_eq!(err.message, "Insufficient Permission");
}

#[tokio::test]
async fn requests_need_a_token() {
    let server = MockServer::start().await;
    let client = DriveClient::new(settings(&server).http).unwrap();
    let err = client
        .get_json::<Value, _>(&client.api_url("about"), NO_QUERY)
        .await
        .unwrap_err();
    assert_eq!(err.kind, DriveErrorKind::NotAuthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
}
