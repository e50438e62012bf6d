//! Core types for the Drive client.
//!
//! Remote resources (files, permissions, list pages) stay dynamic
//! `serde_json` maps so that every field the API returns round-trips through
//! change tracking untouched. Only the pieces the client itself interprets
//! (errors, tokens, HTTP configuration) are typed here.

use chrono::{DateTime, Utc};
use drivelink_core::ResourceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for Drive operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveErrorKind {
    /// HTTP-level error with an unmapped status code.
    HttpError(u16),
    /// 401 from the API, or a rejected code exchange.
    AuthenticationFailed,
    /// 403 without a more specific reason.
    PermissionDenied,
    /// 403 `insufficientPermissions`.
    InsufficientScope,
    /// 403 `storageQuotaExceeded`.
    QuotaExceeded,
    /// 404.
    FileNotFound,
    /// 429.
    RateLimitExceeded,
    /// 5xx.
    ServerError,
    /// Access token expired and could not be refreshed.
    TokenExpired,
    /// No credentials available.
    NotAuthenticated,
    InvalidParameter,
    /// Settings or client configuration are inconsistent.
    InvalidConfig,
    /// Settings file could not be read or parsed.
    Settings,
    /// Stored credentials are unusable.
    InvalidCredentials,
    NetworkError,
    UploadFailed,
    DownloadFailed,
    /// Metadata offers neither a download URL nor a matching export link.
    FileNotDownloadable,
    /// The file has no remote identity yet.
    FileNotUploaded,
    FieldNotAvailable,
    KeyNotFound,
    /// The remote file was permanently deleted through this handle.
    ResourceDeleted,
    Io,
    Other,
}

impl std::fmt::Display for DriveErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpError(code) => write!(f, "HTTP {}", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A Drive error.
///
/// `reason` carries the first `errors[].reason` of an API error body, e.g.
/// `fileNotDownloadable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{kind}] {message}")]
pub struct DriveError {
    pub kind: DriveErrorKind,
    pub message: String,
    pub reason: Option<String>,
}

/// Shape of an API error body.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

impl DriveError {
    pub fn new(kind: DriveErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reason: None,
        }
    }

    /// Classify an HTTP failure from its status and body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|b| b.error);
        let reason = detail
            .as_ref()
            .and_then(|d| d.errors.first())
            .and_then(|e| e.reason.clone());

        let kind = match (status, reason.as_deref()) {
            (401, _) => DriveErrorKind::AuthenticationFailed,
            (403, Some("insufficientPermissions")) => DriveErrorKind::InsufficientScope,
            (403, Some("storageQuotaExceeded")) => DriveErrorKind::QuotaExceeded,
            (403, Some("rateLimitExceeded" | "userRateLimitExceeded")) => {
                DriveErrorKind::RateLimitExceeded
            }
            (403, _) => DriveErrorKind::PermissionDenied,
            (404, _) => DriveErrorKind::FileNotFound,
            (429, _) => DriveErrorKind::RateLimitExceeded,
            (500..=599, _) => DriveErrorKind::ServerError,
            _ => DriveErrorKind::HttpError(status),
        };
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| body.chars().take(500).collect());

        Self {
            kind,
            message,
            reason,
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::AuthenticationFailed, msg)
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::InvalidParameter, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::InvalidConfig, msg)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(DriveErrorKind::NetworkError, msg)
    }

    /// The API refused a media download because the file must be exported.
    pub fn is_not_downloadable(&self) -> bool {
        self.kind == DriveErrorKind::PermissionDenied
            && self.reason.as_deref() == Some("fileNotDownloadable")
    }
}

impl From<ResourceError> for DriveError {
    fn from(e: ResourceError) -> Self {
        let kind = match &e {
            ResourceError::ResourceNotPersisted => DriveErrorKind::FileNotUploaded,
            ResourceError::FieldNotAvailable(_) => DriveErrorKind::FieldNotAvailable,
            ResourceError::KeyNotFound(_) => DriveErrorKind::KeyNotFound,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<std::io::Error> for DriveError {
    fn from(e: std::io::Error) -> Self {
        Self::new(DriveErrorKind::Io, e.to_string())
    }
}

/// Convenience type alias.
pub type DriveResult<T> = Result<T, DriveError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  OAuth2
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Google OAuth2 scopes for Drive.
pub mod scopes {
    /// Full access to all files.
    pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";
    /// Per-file access to files created or opened by the app.
    pub const DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";
}

/// OAuth2 token pair, also the on-disk credentials format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthToken {
    /// Bearer access token.
    pub access_token: String,
    /// Refresh token (used to obtain new access tokens).
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Default for OAuthToken {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            scope: None,
        }
    }
}

impl OAuthToken {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() >= exp,
            None => false,
        }
    }
}

/// Raw JSON response from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MIME types & byte order marks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod mime_types {
    pub const FOLDER: &str = "application/vnd.google-apps.folder";
    pub const DOCUMENT: &str = "application/vnd.google-apps.document";
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Known byte order marks, keyed by (Drive MIME type, download MIME type).
pub const MIME_TYPE_TO_BOM: &[(&str, &str, &[u8])] = &[(
    mime_types::DOCUMENT,
    mime_types::TEXT_PLAIN,
    drivelink_core::UTF8_BOM,
)];

/// BOM prepended when a file of `drive_mime` is exported as `download_mime`.
pub fn bom_for(drive_mime: &str, download_mime: &str) -> Option<&'static [u8]> {
    MIME_TYPE_TO_BOM
        .iter()
        .find(|(drive, download, _)| *drive == drive_mime && *download == download_mime)
        .map(|(_, _, bom)| *bom)
}

/// BOM for a download MIME type regardless of the source type.
pub fn bom_for_download(download_mime: &str) -> Option<&'static [u8]> {
    MIME_TYPE_TO_BOM
        .iter()
        .find(|(_, download, _)| *download == download_mime)
        .map(|(_, _, bom)| *bom)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Base URL for Drive API v2 metadata endpoints.
pub const API_BASE: &str = "https://www.googleapis.com/drive/v2";
/// Base URL for Drive API v2 upload endpoints.
pub const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v2";

/// HTTP behaviour of the Drive client (`http:` block of the settings file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub api_base: String,
    pub upload_base: String,
    /// Request timeout (seconds).
    pub timeout_seconds: u64,
    /// Maximum retries for transient failures.
    pub max_retries: u32,
    /// Rate-limit delay between requests (ms).
    pub rate_limit_ms: u64,
    /// `maxResults` used when a file list is walked to the end.
    pub list_page_size: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            rate_limit_ms: 100,
            list_page_size: 1000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
