//! YAML settings for authentication and the HTTP client.
//!
//! ```yaml
//! client_config_backend: settings
//! client_config:
//!   client_id: 9637341109347.apps.googleusercontent.com
//!   client_secret: psDskOoWr1P602PXRTHi
//! save_credentials: true
//! save_credentials_backend: file
//! save_credentials_file: credentials.json
//! get_refresh_token: true
//! oauth_scope:
//!   - https://www.googleapis.com/auth/drive.file
//! http:
//!   max_retries: 5
//! ```

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::types::{scopes, DriveConfig, DriveError, DriveErrorKind, DriveResult};

/// Default settings file name.
pub const SETTINGS_FILE: &str = "settings.yaml";
/// Default client secrets file name.
pub const CLIENT_SECRETS_FILE: &str = "client_secrets.json";

/// Google OAuth2 authorization endpoint.
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Google OAuth2 token revocation endpoint.
pub const REVOKE_URI: &str = "https://oauth2.googleapis.com/revoke";
/// Out-of-band redirect for copy/paste authorization codes.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Where the OAuth client configuration comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientConfigBackend {
    /// A Google client secrets JSON file.
    #[default]
    File,
    /// The `client_config` block of the settings.
    Settings,
    /// A service account.
    Service,
}

/// Where credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsBackend {
    File,
}

/// OAuth2 client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_revoke_uri")]
    pub revoke_uri: Option<String>,
}

fn default_auth_uri() -> String {
    AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    TOKEN_URI.to_string()
}

fn default_redirect_uri() -> String {
    OOB_REDIRECT_URI.to_string()
}

fn default_revoke_uri() -> Option<String> {
    Some(REVOKE_URI.to_string())
}

impl ClientConfig {
    /// A config with Google's default endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uri: default_redirect_uri(),
            revoke_uri: default_revoke_uri(),
        }
    }
}

/// Service account configuration. Parsed and validated but not usable for
/// authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub client_user_email: Option<String>,
    pub client_service_email: String,
    pub client_pkcs12_file_path: PathBuf,
}

/// Library settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client_config_backend: ClientConfigBackend,
    pub client_config_file: PathBuf,
    pub client_config: Option<ClientConfig>,
    pub service_config: Option<ServiceConfig>,
    pub save_credentials: bool,
    pub save_credentials_backend: Option<CredentialsBackend>,
    pub save_credentials_file: Option<PathBuf>,
    /// Request offline access so a refresh token is issued.
    pub get_refresh_token: bool,
    pub oauth_scope: Vec<String>,
    pub http: DriveConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_config_backend: ClientConfigBackend::File,
            client_config_file: PathBuf::from(CLIENT_SECRETS_FILE),
            client_config: None,
            service_config: None,
            save_credentials: false,
            save_credentials_backend: None,
            save_credentials_file: None,
            get_refresh_token: false,
            oauth_scope: vec![scopes::DRIVE.to_string()],
            http: DriveConfig::default(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> DriveResult<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            DriveError::new(DriveErrorKind::Settings, format!("Invalid settings: {e}"))
        })
    }

    /// Read and parse a settings file.
    pub fn load(path: impl AsRef<Path>) -> DriveResult<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            DriveError::new(
                DriveErrorKind::Settings,
                format!("Cannot read settings file '{}': {e}", path.display()),
            )
        })?;
        Self::from_yaml(&text)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> DriveResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "Settings file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Check that every setting the chosen backends depend on is present.
    pub fn validate(&self) -> DriveResult<()> {
        match self.client_config_backend {
            ClientConfigBackend::File => {
                if self.client_config_file.as_os_str().is_empty() {
                    return Err(DriveError::config(
                        "client_config_backend 'file' requires client_config_file",
                    ));
                }
            }
            ClientConfigBackend::Settings => {
                if self.client_config.is_none() {
                    return Err(DriveError::config(
                        "client_config_backend 'settings' requires client_config",
                    ));
                }
            }
            ClientConfigBackend::Service => {
                if self.service_config.is_none() {
                    return Err(DriveError::config(
                        "client_config_backend 'service' requires service_config",
                    ));
                }
            }
        }

        if self.save_credentials {
            match self.save_credentials_backend {
                None => {
                    return Err(DriveError::config(
                        "save_credentials requires save_credentials_backend",
                    ))
                }
                Some(CredentialsBackend::File) if self.save_credentials_file.is_none() => {
                    return Err(DriveError::config(
                        "save_credentials_backend 'file' requires save_credentials_file",
                    ))
                }
                Some(CredentialsBackend::File) => {}
            }
        }

        if self.oauth_scope.is_empty() {
            return Err(DriveError::config("oauth_scope must not be empty"));
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
