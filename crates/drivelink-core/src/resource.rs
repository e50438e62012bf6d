//! Change-tracking resource model.
//!
//! An [`ApiResource`] keeps the fields a caller sees and edits next to a
//! snapshot of the last state known to match the server. The difference
//! between the two is the body of the next partial update.

use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};

use crate::error::{ResourceError, ResourceResult};

/// Field map of a remote resource.
pub type Fields = Map<String, Value>;

/// Content attached to a resource, kept apart from its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// In-memory bytes.
    Bytes(Vec<u8>),
    /// A local file read at upload time.
    File(PathBuf),
}

/// Source of fresh field values for a resource identified by `id`.
#[async_trait]
pub trait MetadataFetch: Send + Sync {
    type Error: From<ResourceError> + Send;

    async fn fetch_metadata(&self, id: &str) -> Result<Fields, Self::Error>;
}

/// Remote entity with dirty-field tracking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResource {
    fields: Fields,
    snapshot: Fields,
    content: Option<Content>,
    content_dirty: bool,
    persisted: bool,
}

impl ApiResource {
    /// An empty, not yet persisted resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// A local resource seeded with `fields` (e.g. just an `id`). Nothing is
    /// considered synchronized, so every field counts as a change.
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// A resource built from a server response.
    pub fn persisted(fields: Fields) -> Self {
        let mut resource = Self::default();
        resource.persisted = true;
        resource.synchronize(Some(fields));
        resource
    }

    // ── Fields ───────────────────────────────────────────────────

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Drop a field locally. The removal is not reported by
    /// [`get_changes`](Self::get_changes).
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Plain lookup without any error classification.
    pub fn peek(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look a field up locally.
    ///
    /// A missing field on a resource that is not persisted yet but has an id
    /// yields [`ResourceError::FieldNotAvailable`]: the value may exist
    /// remotely and [`get_or_fetch`](Self::get_or_fetch) can load it.
    pub fn get(&self, key: &str) -> ResourceResult<&Value> {
        match self.fields.get(key) {
            Some(value) => Ok(value),
            None if self.persisted => Err(ResourceError::KeyNotFound(key.to_string())),
            None if self.id().is_some() => Err(ResourceError::FieldNotAvailable(key.to_string())),
            None => Err(ResourceError::ResourceNotPersisted),
        }
    }

    /// Look a field up, fetching the remote metadata once when the field is
    /// missing on a resource that is not persisted yet.
    pub async fn get_or_fetch<F>(&mut self, key: &str, fetcher: &F) -> Result<&Value, F::Error>
    where
        F: MetadataFetch + ?Sized,
    {
        if self.fields.contains_key(key) {
            return Ok(&self.fields[key]);
        }
        if self.persisted {
            return Err(ResourceError::KeyNotFound(key.to_string()).into());
        }
        let id = self
            .id()
            .map(str::to_owned)
            .ok_or(ResourceError::ResourceNotPersisted)?;

        debug!("Field '{}' missing, fetching metadata for {}", key, id);
        let fresh = fetcher.fetch_metadata(&id).await?;
        self.persisted = true;
        self.synchronize(Some(fresh));

        self.fields
            .get(key)
            .ok_or_else(|| ResourceError::FieldNotAvailable(key.to_string()).into())
    }

    /// Remote identifier, preferring the synchronized value.
    pub fn id(&self) -> Option<&str> {
        self.snapshot
            .get("id")
            .and_then(Value::as_str)
            .or_else(|| self.fields.get("id").and_then(Value::as_str))
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn snapshot(&self) -> &Fields {
        &self.snapshot
    }

    // ── Synchronisation ──────────────────────────────────────────

    /// Merge server-authoritative `fresh` fields (if any) and take the result
    /// as the new clean baseline.
    pub fn synchronize(&mut self, fresh: Option<Fields>) {
        if let Some(fresh) = fresh {
            self.fields.extend(fresh);
        }
        self.snapshot = self.fields.clone();
    }

    /// Advance only the given fields, in both the working set and the
    /// baseline. Other pending edits stay dirty.
    pub fn synchronize_partial(&mut self, fresh: Fields) {
        for (key, value) in fresh {
            self.fields.insert(key.clone(), value.clone());
            self.snapshot.insert(key, value);
        }
    }

    /// Fields that are new or differ from the last synchronized state.
    pub fn get_changes(&self) -> Fields {
        self.fields
            .iter()
            .filter(|(key, value)| self.snapshot.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.fields
            .iter()
            .any(|(key, value)| self.snapshot.get(key.as_str()) != Some(value))
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    // ── Content ──────────────────────────────────────────────────

    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut Content> {
        self.content.as_mut()
    }

    /// Attach locally produced content; it will be sent on the next write.
    pub fn set_content(&mut self, content: Content) {
        self.content = Some(content);
        self.content_dirty = true;
    }

    /// Attach content that came from the server.
    pub fn load_content(&mut self, content: Content) {
        self.content = Some(content);
        self.content_dirty = false;
    }

    pub fn is_content_dirty(&self) -> bool {
        self.content_dirty
    }

    pub fn mark_content_clean(&mut self) {
        self.content_dirty = false;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
