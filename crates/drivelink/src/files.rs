//! Remote file objects.
//!
//! A [`DriveFile`] is an [`ApiResource`] bound to the shared auth state. Local
//! edits are plain `set` calls; [`DriveFile::upload`] sends only what changed
//! since the last synchronisation and folds the server's answer back in.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use drivelink_core::resource::Fields;
use drivelink_core::{
    insert_prefix, remove_prefix, ApiResource, Content, MetadataFetch, ResourceError, BLOCK_SIZE,
};

use crate::auth::{authorized_client, SharedAuth};
use crate::client::{query_pairs, DriveClient, ALL_DRIVES};
use crate::downloads::{self, ContentStream, OpenDownload, Progress};
use crate::permissions;
use crate::types::{
    bom_for, bom_for_download, mime_types, DriveError, DriveErrorKind, DriveResult,
};
use crate::uploads;

/// `files.get`.
pub async fn get_metadata(
    client: &DriveClient,
    file_id: &str,
    fields: Option<&str>,
) -> DriveResult<Fields> {
    let mut query = vec![ALL_DRIVES];
    if let Some(fields) = fields {
        query.push(("fields", fields));
    }
    client
        .get_json(&client.api_url(&format!("files/{}", file_id)), &query)
        .await
}

/// Lazy metadata source for [`ApiResource::get_or_fetch`].
struct RemoteMetadata {
    auth: SharedAuth,
}

#[async_trait]
impl MetadataFetch for RemoteMetadata {
    type Error = DriveError;

    async fn fetch_metadata(&self, id: &str) -> DriveResult<Fields> {
        let client = authorized_client(&self.auth).await?;
        get_metadata(&client, id, None).await
    }
}

/// A file on Google Drive.
#[derive(Clone)]
pub struct DriveFile {
    auth: SharedAuth,
    resource: ApiResource,
    /// Prefix stripped from the cached content, restorable in place.
    stripped_prefix: Option<&'static [u8]>,
    /// Download MIME type the cached content was fetched as.
    content_mime: Option<String>,
    deleted: bool,
}

impl std::fmt::Debug for DriveFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveFile")
            .field("resource", &self.resource)
            .field("deleted", &self.deleted)
            .finish()
    }
}

impl DriveFile {
    /// `uploaded` marks `metadata` as a server response (e.g. a list item).
    pub fn new(auth: SharedAuth, metadata: Option<Fields>, uploaded: bool) -> Self {
        let metadata = metadata.unwrap_or_default();
        let resource = if uploaded {
            ApiResource::persisted(metadata)
        } else {
            ApiResource::from_fields(metadata)
        };
        Self {
            auth,
            resource,
            stripped_prefix: None,
            content_mime: None,
            deleted: false,
        }
    }

    pub fn resource(&self) -> &ApiResource {
        &self.resource
    }

    pub fn is_uploaded(&self) -> bool {
        self.resource.is_persisted()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn id(&self) -> Option<&str> {
        self.resource.id()
    }

    // ── Metadata ─────────────────────────────────────────────────

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.resource.set(key, value);
    }

    /// Local lookup, never touches the network.
    pub fn peek(&self, key: &str) -> Option<&Value> {
        self.resource.peek(key)
    }

    /// Field lookup. A file known only by id fetches its metadata on the
    /// first miss.
    pub async fn get(&mut self, key: &str) -> DriveResult<&Value> {
        self.check_live()?;
        let fetcher = RemoteMetadata {
            auth: self.auth.clone(),
        };
        self.resource.get_or_fetch(key, &fetcher).await
    }

    pub fn get_changes(&self) -> Fields {
        self.resource.get_changes()
    }

    /// `files.get`; `fetch_all` asks for every field.
    pub async fn fetch_metadata(&mut self, fields: Option<&str>, fetch_all: bool) -> DriveResult<()> {
        self.check_live()?;
        let id = self.require_id()?;
        let fields = if fetch_all { Some("*") } else { fields };
        let client = self.client().await?;
        let metadata = get_metadata(&client, &id, fields).await?;
        self.resource.mark_persisted();
        self.resource.synchronize(Some(metadata));
        Ok(())
    }

    /// Load metadata once for a file known only by id. Pending local edits
    /// are kept on top of the fetched values.
    async fn ensure_metadata(&mut self) -> DriveResult<()> {
        if self.resource.is_persisted() {
            return Ok(());
        }
        let pending = self.resource.get_changes();
        self.fetch_metadata(None, false).await?;
        for (key, value) in pending {
            self.resource.set(key, value);
        }
        Ok(())
    }

    // ── Content (local) ──────────────────────────────────────────

    pub fn content(&self) -> Option<&Content> {
        self.resource.content()
    }

    /// Use `content` (UTF-8) as the file body. `mimeType` defaults to
    /// `text/plain`.
    pub fn set_content_string(&mut self, content: &str) {
        self.set_local_content(Content::Bytes(content.as_bytes().to_vec()));
        if self.field_is_unset("mimeType") {
            self.resource.set("mimeType", mime_types::TEXT_PLAIN);
        }
    }

    /// Use a local file as the body. `title` defaults to the path and
    /// `mimeType` is guessed from the extension.
    pub fn set_content_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.set_local_content(Content::File(path.to_path_buf()));
        if self.field_is_unset("title") {
            self.resource.set("title", path.to_string_lossy().into_owned());
        }
        if self.field_is_unset("mimeType") {
            if let Some(mime) = mime_guess::from_path(path).first_raw() {
                self.resource.set("mimeType", mime);
            }
        }
    }

    fn set_local_content(&mut self, content: Content) {
        self.resource.set_content(content);
        self.stripped_prefix = None;
        self.content_mime = None;
    }

    fn field_is_unset(&self, key: &str) -> bool {
        matches!(self.resource.peek(key), None | Some(Value::Null))
    }

    // ── Content (remote) ─────────────────────────────────────────

    /// Download the content into memory through `downloadUrl`, or through
    /// `exportLinks[mimetype]` for native documents.
    pub async fn fetch_content(&mut self, mimetype: Option<&str>, remove_bom: bool) -> DriveResult<()> {
        self.check_live()?;
        self.ensure_metadata().await?;

        let download_url = self
            .resource
            .peek("downloadUrl")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let export_url = mimetype.and_then(|m| {
            self.resource
                .peek("exportLinks")
                .and_then(|links| links.get(m))
                .and_then(Value::as_str)
                .map(str::to_owned)
        });
        let url = download_url.or(export_url).ok_or_else(|| {
            DriveError::new(
                DriveErrorKind::FileNotDownloadable,
                "No downloadUrl/exportLinks for mimetype found in metadata",
            )
        })?;

        let client = self.client().await?;
        let mut bytes = client.get_bytes(&url).await?;
        debug!("Fetched {} bytes of content", bytes.len());

        self.stripped_prefix = None;
        if remove_bom && mimetype == Some(mime_types::TEXT_PLAIN) {
            if let Some(bom) = self.document_bom(mime_types::TEXT_PLAIN) {
                if remove_prefix(&mut Cursor::new(&mut bytes), bom, BLOCK_SIZE)? {
                    self.stripped_prefix = Some(bom);
                }
            }
        }
        self.resource.load_content(Content::Bytes(bytes));
        self.content_mime = mimetype.map(str::to_owned);
        Ok(())
    }

    /// Content as a UTF-8 string. A cached download is reused, with its BOM
    /// added or removed in place as requested.
    pub async fn get_content_string(
        &mut self,
        mimetype: Option<&str>,
        remove_bom: bool,
    ) -> DriveResult<String> {
        self.check_live()?;
        let cached = matches!(self.resource.content(), Some(Content::Bytes(_)))
            && (mimetype.is_none()
                || self.resource.is_content_dirty()
                || self.content_mime.as_deref() == mimetype);

        if cached {
            if !self.resource.is_content_dirty() {
                self.toggle_cached_bom(mimetype, remove_bom)?;
            }
        } else {
            self.fetch_content(mimetype, remove_bom).await?;
        }

        match self.resource.content() {
            Some(Content::Bytes(bytes)) => String::from_utf8(bytes.clone()).map_err(|e| {
                DriveError::new(
                    DriveErrorKind::DownloadFailed,
                    format!("Content is not valid UTF-8: {e}"),
                )
            }),
            _ => Err(DriveError::new(
                DriveErrorKind::DownloadFailed,
                "No content in memory",
            )),
        }
    }

    fn toggle_cached_bom(&mut self, mimetype: Option<&str>, remove_bom: bool) -> DriveResult<()> {
        let bom = match mimetype {
            Some(m) if m == mime_types::TEXT_PLAIN => self.document_bom(m),
            _ => None,
        };
        let Some(Content::Bytes(bytes)) = self.resource.content_mut() else {
            return Ok(());
        };
        match (remove_bom, self.stripped_prefix) {
            (false, Some(prefix)) => {
                insert_prefix(&mut Cursor::new(bytes), prefix, BLOCK_SIZE)?;
                self.stripped_prefix = None;
            }
            (true, None) => {
                if let Some(bom) = bom {
                    if remove_prefix(&mut Cursor::new(bytes), bom, BLOCK_SIZE)? {
                        self.stripped_prefix = Some(bom);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn document_bom(&self, download_mime: &str) -> Option<&'static [u8]> {
        self.resource
            .peek("mimeType")
            .and_then(Value::as_str)
            .and_then(|drive_mime| bom_for(drive_mime, download_mime))
    }

    /// Save the content to `path`. Native documents are exported as
    /// `mimetype` (default `text/plain`); with `remove_bom` a `text/plain`
    /// BOM is stripped from the written file. Returns the bytes downloaded.
    pub async fn get_content_file(
        &mut self,
        path: impl AsRef<Path>,
        mimetype: Option<&str>,
        remove_bom: bool,
        progress: Option<Progress<'_>>,
    ) -> DriveResult<u64> {
        self.check_live()?;
        let path = path.as_ref();
        let id = self.require_id()?;
        let client = self.client().await?;

        let OpenDownload {
            response,
            export_mime,
        } = downloads::open(&client, &id, mimetype).await?;
        let written = downloads::write_to_file(response, path, progress).await?;

        let effective = export_mime.as_deref().or(mimetype);
        if remove_bom && effective == Some(mime_types::TEXT_PLAIN) {
            if let Some(bom) = bom_for_download(mime_types::TEXT_PLAIN) {
                downloads::strip_file_prefix(path, bom).await?;
            }
        }
        Ok(written)
    }

    /// Stream the content chunk by chunk. For exported documents a
    /// `text/plain` BOM is stripped from the first chunk when requested.
    pub async fn get_content_stream(
        &mut self,
        mimetype: Option<&str>,
        remove_bom: bool,
    ) -> DriveResult<ContentStream> {
        self.check_live()?;
        let id = self.require_id()?;
        let client = self.client().await?;

        let OpenDownload {
            response,
            export_mime,
        } = downloads::open(&client, &id, mimetype).await?;
        let strip = match export_mime.as_deref() {
            Some(m) if remove_bom && m == mime_types::TEXT_PLAIN => bom_for_download(m),
            _ => None,
        };
        ContentStream::new(response, strip).await
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Create or update the remote file with the pending changes.
    ///
    /// New files are inserted; existing ones are updated when content is
    /// pending, patched otherwise. `params` become extra query parameters
    /// (e.g. `{"convert": true}`).
    pub async fn upload(&mut self, params: Option<&Fields>) -> DriveResult<()> {
        self.check_live()?;
        let params = params.map(query_pairs).unwrap_or_default();
        if self.resource.is_persisted() || self.id().is_some() {
            if self.resource.is_content_dirty() {
                self.files_update(&params).await
            } else {
                self.files_patch(&params).await
            }
        } else {
            self.files_insert(&params).await
        }
    }

    async fn files_insert(&mut self, params: &[(String, String)]) -> DriveResult<()> {
        let client = self.client().await?;
        let file = if self.resource.is_content_dirty() {
            let mime = self.upload_mime_type();
            let data = self.pending_content().await?;
            uploads::insert_multipart(&client, &self.resource.get_changes(), &data, &mime, params)
                .await?
        } else {
            uploads::insert_metadata(&client, &self.resource.get_changes(), params).await?
        };
        self.resource.mark_persisted();
        self.resource.mark_content_clean();
        self.resource.synchronize(Some(file));
        Ok(())
    }

    async fn files_update(&mut self, params: &[(String, String)]) -> DriveResult<()> {
        self.ensure_metadata().await?;
        let id = self.require_id()?;
        let client = self.client().await?;
        let mime = self.upload_mime_type();
        let data = self.pending_content().await?;
        let file = uploads::update_multipart(
            &client,
            &id,
            &self.resource.get_changes(),
            &data,
            &mime,
            params,
        )
        .await?;
        self.resource.mark_content_clean();
        self.resource.synchronize(Some(file));
        Ok(())
    }

    async fn files_patch(&mut self, params: &[(String, String)]) -> DriveResult<()> {
        self.ensure_metadata().await?;
        let id = self.require_id()?;
        let client = self.client().await?;
        let file =
            uploads::patch_metadata(&client, &id, &self.resource.get_changes(), params).await?;
        self.resource.synchronize(Some(file));
        Ok(())
    }

    /// `mimeType` for the media part, defaulting it to
    /// `application/octet-stream`.
    fn upload_mime_type(&mut self) -> String {
        if self.field_is_unset("mimeType") {
            self.resource.set("mimeType", mime_types::OCTET_STREAM);
        }
        self.resource
            .peek("mimeType")
            .and_then(Value::as_str)
            .unwrap_or(mime_types::OCTET_STREAM)
            .to_string()
    }

    async fn pending_content(&self) -> DriveResult<Vec<u8>> {
        match self.resource.content() {
            Some(content) => uploads::read_content(content).await,
            None => Err(DriveError::new(
                DriveErrorKind::UploadFailed,
                "No content to upload",
            )),
        }
    }

    /// Move the file to the trash.
    pub async fn trash(&mut self, params: Option<&Fields>) -> DriveResult<()> {
        self.set_trashed(true, params).await
    }

    /// Restore the file from the trash.
    pub async fn untrash(&mut self, params: Option<&Fields>) -> DriveResult<()> {
        self.set_trashed(false, params).await
    }

    async fn set_trashed(&mut self, trashed: bool, params: Option<&Fields>) -> DriveResult<()> {
        self.check_live()?;
        let id = self.require_id()?;
        let client = self.client().await?;
        let params = params.map(query_pairs).unwrap_or_default();
        let response = uploads::set_trashed(&client, &id, trashed, &params).await?;

        let labels = match response.get("labels") {
            Some(labels @ Value::Object(_)) => labels.clone(),
            _ => {
                let mut labels = self.resource.peek("labels").cloned().unwrap_or_else(|| json!({}));
                if let Some(map) = labels.as_object_mut() {
                    map.insert("trashed".to_string(), Value::Bool(trashed));
                }
                labels
            }
        };
        let mut fresh = Fields::new();
        fresh.insert("labels".to_string(), labels);
        self.resource.synchronize_partial(fresh);
        Ok(())
    }

    /// Permanently delete the file. The handle is unusable afterwards.
    pub async fn delete(&mut self, params: Option<&Fields>) -> DriveResult<()> {
        self.check_live()?;
        let id = self.require_id()?;
        let client = self.client().await?;
        let params = params.map(query_pairs).unwrap_or_default();
        uploads::delete_file(&client, &id, &params).await?;
        self.deleted = true;
        Ok(())
    }

    // ── Permissions ──────────────────────────────────────────────

    /// Share the file, then refresh the `permissions` field.
    pub async fn insert_permission(
        &mut self,
        permission: &Fields,
        params: Option<&Fields>,
    ) -> DriveResult<Fields> {
        self.check_live()?;
        let id = self.require_id()?;
        let client = self.client().await?;
        let params = params.map(query_pairs).unwrap_or_default();
        let created = permissions::insert_permission(&client, &id, permission, &params).await?;
        self.get_permissions().await?;
        Ok(created)
    }

    /// Fetch the permissions and store them in the `permissions` field.
    pub async fn get_permissions(&mut self) -> DriveResult<Vec<Value>> {
        self.check_live()?;
        let id = self.require_id()?;
        let client = self.client().await?;
        let items = permissions::list_permissions(&client, &id).await?;
        if !items.is_empty() {
            let mut fresh = Fields::new();
            fresh.insert("permissions".to_string(), Value::Array(items.clone()));
            self.resource.synchronize_partial(fresh);
        }
        Ok(items)
    }

    /// Revoke a permission and drop it from the `permissions` field.
    pub async fn delete_permission(&mut self, permission_id: &str) -> DriveResult<bool> {
        self.check_live()?;
        let id = self.require_id()?;
        let client = self.client().await?;
        permissions::delete_permission(&client, &id, permission_id).await?;

        if self.resource.snapshot().contains_key("permissions") {
            if let Some(current) = self.resource.peek("permissions") {
                let remaining = permissions::without_permission(current, permission_id);
                let mut fresh = Fields::new();
                fresh.insert("permissions".to_string(), remaining);
                self.resource.synchronize_partial(fresh);
            }
        }
        Ok(true)
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn check_live(&self) -> DriveResult<()> {
        if self.deleted {
            return Err(DriveError::new(
                DriveErrorKind::ResourceDeleted,
                format!("File {} was deleted", self.id().unwrap_or("?")),
            ));
        }
        Ok(())
    }

    fn require_id(&self) -> DriveResult<String> {
        self.id()
            .map(str::to_owned)
            .ok_or_else(|| ResourceError::ResourceNotPersisted.into())
    }

    async fn client(&self) -> DriveResult<DriveClient> {
        authorized_client(&self.auth).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
