//! Metadata and content uploads.
//!
//! Metadata-only writes are plain JSON requests; writes that carry content
//! use a single `multipart/related` request (metadata part, then media part).

use log::{debug, info};
use reqwest::Method;
use serde_json::Value;

use drivelink_core::resource::Fields;
use drivelink_core::Content;

use crate::client::{DriveClient, ALL_DRIVES};
use crate::types::{DriveError, DriveErrorKind, DriveResult};

/// Read upload content into memory.
pub async fn read_content(content: &Content) -> DriveResult<Vec<u8>> {
    match content {
        Content::Bytes(bytes) => Ok(bytes.clone()),
        Content::File(path) => tokio::fs::read(path).await.map_err(|e| {
            DriveError::new(
                DriveErrorKind::UploadFailed,
                format!("Cannot read '{}': {e}", path.display()),
            )
        }),
    }
}

/// Build a `multipart/related` body. Returns `(content_type, body)`.
pub fn multipart_body(
    metadata: &Fields,
    data: &[u8],
    mime_type: &str,
) -> DriveResult<(String, Vec<u8>)> {
    let metadata_json = serde_json::to_vec(metadata)
        .map_err(|e| DriveError::invalid(format!("Metadata serialization: {e}")))?;
    let boundary = format!("drivelink_{}", uuid::Uuid::new_v4().simple());
    let content_type = format!("multipart/related; boundary={}", boundary);

    let mut body = Vec::with_capacity(metadata_json.len() + data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&metadata_json);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--", boundary).as_bytes());

    Ok((content_type, body))
}

fn with_multipart<'a>(params: &'a [(String, String)]) -> Vec<(&'a str, &'a str)> {
    let mut query = vec![("uploadType", "multipart"), ALL_DRIVES];
    query.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    query
}

fn with_all_drives<'a>(params: &'a [(String, String)]) -> Vec<(&'a str, &'a str)> {
    let mut query = vec![ALL_DRIVES];
    query.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    query
}

/// `files.insert` without content.
pub async fn insert_metadata(
    client: &DriveClient,
    metadata: &Fields,
    params: &[(String, String)],
) -> DriveResult<Fields> {
    debug!("Inserting file metadata");
    client
        .post_json(&client.api_url("files"), &with_all_drives(params), metadata)
        .await
}

/// `files.insert` with content.
pub async fn insert_multipart(
    client: &DriveClient,
    metadata: &Fields,
    data: &[u8],
    mime_type: &str,
    params: &[(String, String)],
) -> DriveResult<Fields> {
    debug!("Starting multipart insert ({} bytes)", data.len());
    let (content_type, body) = multipart_body(metadata, data, mime_type)?;
    let file: Fields = client
        .send_bytes(
            Method::POST,
            &client.upload_url("files"),
            &with_multipart(params),
            &content_type,
            body,
        )
        .await?;
    info!(
        "Uploaded new file {}",
        file.get("id").and_then(Value::as_str).unwrap_or("?")
    );
    Ok(file)
}

/// `files.update` with content.
pub async fn update_multipart(
    client: &DriveClient,
    file_id: &str,
    metadata: &Fields,
    data: &[u8],
    mime_type: &str,
    params: &[(String, String)],
) -> DriveResult<Fields> {
    debug!("Starting multipart update of {} ({} bytes)", file_id, data.len());
    let (content_type, body) = multipart_body(metadata, data, mime_type)?;
    client
        .send_bytes(
            Method::PUT,
            &client.upload_url(&format!("files/{}", file_id)),
            &with_multipart(params),
            &content_type,
            body,
        )
        .await
}

/// `files.patch`: metadata only.
pub async fn patch_metadata(
    client: &DriveClient,
    file_id: &str,
    changes: &Fields,
    params: &[(String, String)],
) -> DriveResult<Fields> {
    debug!("Patching {} ({} changed fields)", file_id, changes.len());
    client
        .patch_json(
            &client.api_url(&format!("files/{}", file_id)),
            &with_all_drives(params),
            changes,
        )
        .await
}

/// `files.trash` / `files.untrash`.
pub async fn set_trashed(
    client: &DriveClient,
    file_id: &str,
    trashed: bool,
    params: &[(String, String)],
) -> DriveResult<Fields> {
    let verb = if trashed { "trash" } else { "untrash" };
    debug!("{} {}", verb, file_id);
    client
        .post_empty(
            &client.api_url(&format!("files/{}/{}", file_id, verb)),
            &with_all_drives(params),
        )
        .await
}

/// `files.delete`: permanent.
pub async fn delete_file(
    client: &DriveClient,
    file_id: &str,
    params: &[(String, String)],
) -> DriveResult<()> {
    info!("Permanently deleting {}", file_id);
    client
        .delete(
            &client.api_url(&format!("files/{}", file_id)),
            &with_all_drives(params),
        )
        .await
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
