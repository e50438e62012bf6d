//! Sharing permissions on a file.

use serde_json::Value;

use drivelink_core::resource::Fields;

use crate::client::{DriveClient, ALL_DRIVES};
use crate::types::DriveResult;

/// `permissions.insert`.
pub async fn insert_permission(
    client: &DriveClient,
    file_id: &str,
    permission: &Fields,
    params: &[(String, String)],
) -> DriveResult<Fields> {
    let mut query = vec![ALL_DRIVES];
    query.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    client
        .post_json(
            &client.api_url(&format!("files/{}/permissions", file_id)),
            &query,
            permission,
        )
        .await
}

/// `permissions.list`. Returns the `items` of the single page the API sends.
pub async fn list_permissions(client: &DriveClient, file_id: &str) -> DriveResult<Vec<Value>> {
    let page: Fields = client
        .get_json(
            &client.api_url(&format!("files/{}/permissions", file_id)),
            &[ALL_DRIVES],
        )
        .await?;
    Ok(match page.get("items") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    })
}

/// `permissions.delete`.
pub async fn delete_permission(
    client: &DriveClient,
    file_id: &str,
    permission_id: &str,
) -> DriveResult<()> {
    client
        .delete(
            &client.api_url(&format!("files/{}/permissions/{}", file_id, permission_id)),
            &[ALL_DRIVES],
        )
        .await
}

/// `permissions` without the entry whose `id` is `permission_id`.
pub fn without_permission(permissions: &Value, permission_id: &str) -> Value {
    match permissions {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|p| p.get("id").and_then(Value::as_str) != Some(permission_id))
                .cloned()
                .collect(),
        ),
        other => other.clone(),
    }
}
