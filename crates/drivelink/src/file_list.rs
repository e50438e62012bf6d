//! Paged file listings (`files.list`).

use log::debug;
use serde_json::Value;

use drivelink_core::resource::Fields;
use drivelink_core::ApiResource;

use crate::auth::{authorized_client, SharedAuth};
use crate::client::{query_pairs, ALL_DRIVES};
use crate::files::DriveFile;
use crate::types::DriveResult;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    Start,
    Token(String),
    Done,
}

/// A `files.list` query (`q`, `maxResults`, `orderBy`, ...) and its paging
/// cursor.
#[derive(Debug, Clone)]
pub struct FileList {
    auth: SharedAuth,
    params: ApiResource,
    state: PageState,
}

impl FileList {
    pub fn new(auth: SharedAuth, params: Option<Fields>) -> Self {
        Self {
            auth,
            params: ApiResource::from_fields(params.unwrap_or_default()),
            state: PageState::Start,
        }
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.set(key, value);
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.peek(key)
    }

    /// True once the last page has been fetched.
    pub fn is_exhausted(&self) -> bool {
        self.state == PageState::Done
    }

    /// Start over from the first page.
    pub fn reset(&mut self) {
        self.state = PageState::Start;
    }

    /// Fetch the next page. Returns `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> DriveResult<Option<Vec<DriveFile>>> {
        let token = match &self.state {
            PageState::Done => return Ok(None),
            PageState::Start => None,
            PageState::Token(t) => Some(t.clone()),
        };

        let client = authorized_client(&self.auth).await?;
        let params = query_pairs(self.params.fields());
        let mut query: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.push(ALL_DRIVES);
        query.push(("includeItemsFromAllDrives", "true"));
        if let Some(token) = token.as_deref() {
            query.push(("pageToken", token));
        }

        let page: Fields = client.get_json(&client.api_url("files"), &query).await?;

        self.state = match page.get("nextPageToken").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => PageState::Token(t.to_string()),
            _ => PageState::Done,
        };
        let files: Vec<DriveFile> = match page.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .map(|item| DriveFile::new(self.auth.clone(), Some(item), true))
                .collect(),
            _ => Vec::new(),
        };
        debug!("Listed {} files (more: {})", files.len(), !self.is_exhausted());
        Ok(Some(files))
    }

    /// Without a `maxResults` parameter (absent or null), walk every page
    /// (1000 items per request unless configured otherwise) and return all
    /// files. With one, return just the next page.
    pub async fn get_list(&mut self) -> DriveResult<Vec<DriveFile>> {
        if !matches!(self.params.peek("maxResults"), None | Some(Value::Null)) {
            return Ok(self.next_page().await?.unwrap_or_default());
        }

        let page_size = self.auth.lock().await.settings().http.list_page_size;
        let previous = self.params.remove("maxResults");
        self.params.set("maxResults", page_size);
        let mut all = Vec::new();
        let result = loop {
            match self.next_page().await {
                Ok(Some(page)) => all.extend(page),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.params.remove("maxResults");
        if let Some(previous) = previous {
            self.params.set("maxResults", previous);
        }
        result?;
        Ok(all)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
