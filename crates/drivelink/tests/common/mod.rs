#![allow(dead_code)]

use chrono::{Duration, Utc};
use serde_json::Value;
use wiremock::MockServer;

use drivelink::{
    ClientConfig, ClientConfigBackend, DriveConfig, Fields, GoogleAuth, GoogleDrive, OAuthToken,
    Settings,
};

pub const ACCESS_TOKEN: &str = "ya29.test-token";
pub const REFRESH_TOKEN: &str = "refresh-token-1";

/// Settings pointing every endpoint at the mock server.
pub fn settings(server: &MockServer) -> Settings {
    let mut client_config = ClientConfig::new("test-client-id", "test-secret");
    client_config.token_uri = format!("{}/token", server.uri());
    client_config.revoke_uri = Some(format!("{}/revoke", server.uri()));
    Settings {
        client_config_backend: ClientConfigBackend::Settings,
        client_config: Some(client_config),
        http: DriveConfig {
            api_base: format!("{}/drive/v2", server.uri()),
            upload_base: format!("{}/upload/drive/v2", server.uri()),
            max_retries: 0,
            rate_limit_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn valid_token() -> OAuthToken {
    OAuthToken {
        access_token: ACCESS_TOKEN.into(),
        refresh_token: Some(REFRESH_TOKEN.into()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        ..Default::default()
    }
}

pub fn expired_token() -> OAuthToken {
    OAuthToken {
        access_token: "ya29.stale".into(),
        refresh_token: Some(REFRESH_TOKEN.into()),
        expires_at: Some(Utc::now() - Duration::minutes(5)),
        ..Default::default()
    }
}

/// An authenticated drive backed by the mock server.
pub fn drive(server: &MockServer) -> GoogleDrive {
    let mut auth = GoogleAuth::new(settings(server)).unwrap();
    auth.set_credentials(valid_token());
    GoogleDrive::new(auth)
}

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn bearer() -> String {
    format!("Bearer {}", ACCESS_TOKEN)
}
