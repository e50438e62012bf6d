//! # drivelink – Google Drive convenience layer
//!
//! Object-style access to the Google Drive API v2 on top of OAuth2.
//!
//! ## Features
//!
//! - **Settings** – YAML settings with client config and credential backends
//! - **OAuth2 Authentication** – auth URL, code exchange, refresh, revoke,
//!   saved credentials
//! - **Files** – lazy metadata, change-tracked patches, trash, delete
//! - **Uploads** – metadata-only inserts and multipart content uploads
//! - **Downloads** – media downloads with export fallback for native
//!   documents, BOM stripping, streaming with progress
//! - **Permissions** – insert, list, delete
//! - **Listings** – paged `files.list` queries

pub mod types;
pub mod client;
pub mod settings;
pub mod auth;
pub mod uploads;
pub mod downloads;
pub mod permissions;
pub mod files;
pub mod file_list;
pub mod drive;

pub use auth::{GoogleAuth, SharedAuth};
pub use client::DriveClient;
pub use downloads::{ContentStream, Progress};
pub use drive::GoogleDrive;
pub use drivelink_core::resource::Fields;
pub use drivelink_core::{ApiResource, Content};
pub use file_list::FileList;
pub use files::DriveFile;
pub use settings::{ClientConfig, ClientConfigBackend, CredentialsBackend, Settings};
pub use types::{DriveConfig, DriveError, DriveErrorKind, DriveResult, OAuthToken};
