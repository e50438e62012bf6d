//! Entry point tying authentication to file objects.

use drivelink_core::resource::Fields;

use crate::auth::{GoogleAuth, SharedAuth};
use crate::file_list::FileList;
use crate::files::DriveFile;

/// A Google Drive account. Every file and listing created here shares its
/// authentication state.
#[derive(Debug, Clone)]
pub struct GoogleDrive {
    auth: SharedAuth,
}

impl GoogleDrive {
    pub fn new(auth: GoogleAuth) -> Self {
        Self {
            auth: auth.into_shared(),
        }
    }

    pub fn from_auth(auth: SharedAuth) -> Self {
        Self { auth }
    }

    pub fn auth(&self) -> &SharedAuth {
        &self.auth
    }

    /// A local file handle. Pass `{"id": ...}` to address an existing file;
    /// its metadata is fetched on first use.
    pub fn create_file(&self, metadata: Option<Fields>) -> DriveFile {
        DriveFile::new(self.auth.clone(), metadata, false)
    }

    /// A `files.list` query, e.g. `{"q": "'root' in parents and trashed=false"}`.
    pub fn list_file(&self, params: Option<Fields>) -> FileList {
        FileList::new(self.auth.clone(), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn handles_share_auth() {
        let drive = GoogleDrive::new(GoogleAuth::new(Settings::default()).unwrap());
        let file = drive.create_file(json!({"id": "abc"}).as_object().cloned());
        assert_eq!(file.id(), Some("abc"));
        assert!(!file.is_uploaded());

        let other = GoogleDrive::from_auth(drive.auth().clone());
        assert!(Arc::ptr_eq(drive.auth(), other.auth()));
        assert!(drive.list_file(None).param("q").is_none());
    }
}
