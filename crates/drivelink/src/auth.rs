//! OAuth2 authentication for Google Drive.
//!
//! [`GoogleAuth`] drives the authorization-code flow:
//!   1. Load the client configuration (client secrets file or settings).
//!   2. Build an authorization URL for the user.
//!   3. Exchange the authorization code for tokens.
//!   4. Refresh expired access tokens, persist or revoke them.
//!
//! It owns the [`DriveClient`] that carries the current token; every remote
//! operation asks for a fresh copy through [`GoogleAuth::authorized_client`].

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::client::DriveClient;
use crate::settings::{
    ClientConfig, ClientConfigBackend, CredentialsBackend, Settings, AUTH_URI, REVOKE_URI,
    TOKEN_URI,
};
use crate::types::{DriveError, DriveErrorKind, DriveResult, OAuthToken, TokenResponse};

/// Authentication state shared by every file handle of a drive.
pub type SharedAuth = Arc<Mutex<GoogleAuth>>;

/// Google client secrets file: `{"installed": {...}}` or `{"web": {...}}`.
#[derive(Debug, Deserialize)]
struct ClientSecrets {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
    revoke_uri: Option<String>,
}

/// OAuth2 state: settings, client configuration and the token-carrying client.
#[derive(Debug)]
pub struct GoogleAuth {
    settings: Settings,
    client_config: Option<ClientConfig>,
    client: DriveClient,
}

impl GoogleAuth {
    // ── Construction ─────────────────────────────────────────────

    pub fn new(settings: Settings) -> DriveResult<Self> {
        settings.validate()?;
        let client = DriveClient::new(settings.http.clone())?;
        Ok(Self {
            settings,
            client_config: None,
            client,
        })
    }

    /// Build from a settings file, falling back to defaults if it is missing.
    pub fn from_settings_file(path: impl AsRef<Path>) -> DriveResult<Self> {
        Self::new(Settings::load_or_default(path)?)
    }

    pub fn into_shared(self) -> SharedAuth {
        Arc::new(Mutex::new(self))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client_config(&self) -> Option<&ClientConfig> {
        self.client_config.as_ref()
    }

    // ── Credentials ──────────────────────────────────────────────

    pub fn credentials(&self) -> Option<&OAuthToken> {
        self.client.token()
    }

    pub fn set_credentials(&mut self, token: OAuthToken) {
        self.client.set_token(token);
    }

    /// True when there are no credentials or the access token has expired.
    pub fn access_token_expired(&self) -> bool {
        self.credentials().map(OAuthToken::is_expired).unwrap_or(true)
    }

    fn has_refresh_token(&self) -> bool {
        self.credentials()
            .and_then(|t| t.refresh_token.as_deref())
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    fn credentials_file(&self) -> DriveResult<&Path> {
        match self.settings.save_credentials_backend {
            Some(CredentialsBackend::File) => self
                .settings
                .save_credentials_file
                .as_deref()
                .ok_or_else(|| DriveError::config("Please specify a credentials file")),
            None => Err(DriveError::config("Please specify a credentials backend")),
        }
    }

    /// Load saved credentials. Returns `false` when nothing was saved yet.
    pub async fn load_credentials(&mut self) -> DriveResult<bool> {
        let path = self.credentials_file()?.to_path_buf();
        reject_symlink(&path).await?;
        if !tokio::fs::try_exists(&path).await? {
            debug!("No saved credentials at {}", path.display());
            return Ok(false);
        }
        let text = tokio::fs::read_to_string(&path).await?;
        let token: OAuthToken = serde_json::from_str(&text).map_err(|e| {
            DriveError::new(
                DriveErrorKind::InvalidCredentials,
                format!("Cannot parse credentials file '{}': {e}", path.display()),
            )
        })?;
        self.set_credentials(token);
        debug!("Loaded credentials from {}", path.display());
        Ok(true)
    }

    /// Persist the current credentials.
    pub async fn save_credentials(&self) -> DriveResult<()> {
        let token = self.credentials().ok_or_else(|| {
            DriveError::new(DriveErrorKind::InvalidCredentials, "No credentials to save")
        })?;
        let path = self.credentials_file()?;
        reject_symlink(path).await?;
        let text = serde_json::to_string_pretty(token)
            .map_err(|e| DriveError::new(DriveErrorKind::InvalidCredentials, e.to_string()))?;
        tokio::fs::write(path, text).await?;
        debug!("Saved credentials to {}", path.display());
        Ok(())
    }

    // ── Client configuration ─────────────────────────────────────

    /// Load the OAuth client configuration from the configured backend.
    pub fn load_client_config(&mut self) -> DriveResult<&ClientConfig> {
        match self.settings.client_config_backend {
            ClientConfigBackend::File => {
                let path = self.settings.client_config_file.clone();
                self.load_client_config_file(&path)
            }
            ClientConfigBackend::Settings => {
                let config = self.settings.client_config.clone().ok_or_else(|| {
                    DriveError::config("Insufficient client config in settings")
                })?;
                Ok(&*self.client_config.insert(config))
            }
            ClientConfigBackend::Service => Err(DriveError::config(
                "Service account authentication is not supported",
            )),
        }
    }

    /// Load the OAuth client configuration from a client secrets file.
    pub fn load_client_config_file(&mut self, path: &Path) -> DriveResult<&ClientConfig> {
        let config = parse_client_secrets(path)?;
        Ok(&*self.client_config.insert(config))
    }

    fn ensure_client_config(&mut self) -> DriveResult<ClientConfig> {
        if let Some(config) = &self.client_config {
            return Ok(config.clone());
        }
        self.load_client_config().cloned()
    }

    // ── Authorization-code flow ──────────────────────────────────

    /// URL the user opens to grant access.
    pub fn get_auth_url(&mut self) -> DriveResult<String> {
        let config = self.ensure_client_config()?;
        if config.client_id.is_empty() {
            return Err(DriveError::invalid("client_id is required"));
        }

        let scope = self.settings.oauth_scope.join(" ");
        let mut params = vec![
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
        ];
        if self.settings.get_refresh_token {
            params.push(("access_type", "offline"));
            params.push(("prompt", "consent"));
        }

        let url = url::Url::parse_with_params(&config.auth_uri, &params)
            .map_err(|e| DriveError::config(format!("Failed to build auth URL: {e}")))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    pub async fn authenticate(&mut self, code: &str) -> DriveResult<()> {
        if code.is_empty() {
            return Err(DriveError::invalid("Authorization code is empty"));
        }
        let config = self.ensure_client_config()?;

        debug!("Exchanging authorization code for tokens");
        let params = [
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let resp: TokenResponse = self
            .client
            .post_form_unauthenticated(&config.token_uri, &params)
            .await
            .map_err(|e| DriveError::auth(format!("OAuth2 code exchange failed: {}", e.message)))?;

        self.set_credentials(token_from_response(resp));
        info!("Authentication successful");
        Ok(())
    }

    /// Obtain a new access token with the refresh token.
    pub async fn refresh(&mut self) -> DriveResult<()> {
        let refresh_token = match self.credentials() {
            None => {
                return Err(DriveError::new(
                    DriveErrorKind::NotAuthenticated,
                    "No credentials to refresh",
                ))
            }
            Some(token) => token.refresh_token.clone().unwrap_or_default(),
        };
        if refresh_token.is_empty() {
            return Err(DriveError::new(
                DriveErrorKind::TokenExpired,
                "No refresh token available, request offline access",
            ));
        }
        let config = self.ensure_client_config()?;

        debug!("Refreshing access token");
        let params = [
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let resp: TokenResponse = self
            .client
            .post_form_unauthenticated(&config.token_uri, &params)
            .await
            .map_err(|e| {
                DriveError::new(
                    DriveErrorKind::TokenExpired,
                    format!("Access token refresh failed: {}", e.message),
                )
            })?;

        let mut token = token_from_response(resp);
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token);
        }
        self.set_credentials(token);
        Ok(())
    }

    /// Revoke the current credentials and forget them.
    pub async fn revoke(&mut self) -> DriveResult<()> {
        let token = match self.credentials() {
            Some(t) => t.refresh_token.clone().unwrap_or_else(|| t.access_token.clone()),
            None => {
                return Err(DriveError::new(
                    DriveErrorKind::NotAuthenticated,
                    "No credentials to revoke",
                ))
            }
        };
        let config = self.ensure_client_config()?;
        let revoke_uri = config
            .revoke_uri
            .ok_or_else(|| DriveError::config("No revoke_uri configured"))?;

        debug!("Revoking token");
        self.client
            .post_form_discard(&revoke_uri, &[("token", token.as_str())])
            .await?;
        self.client.clear_token();
        Ok(())
    }

    /// Authenticate interactively: `code_provider` receives the authorization
    /// URL and returns the code the user pasted back.
    ///
    /// Saved credentials are reused when `save_credentials` is enabled, and
    /// expired ones are refreshed before the user is asked again.
    pub async fn command_line_auth<F>(&mut self, mut code_provider: F) -> DriveResult<()>
    where
        F: FnMut(&str) -> DriveResult<String>,
    {
        if self.settings.save_credentials {
            self.load_credentials().await?;
        }

        let changed = if self.credentials().is_none() {
            self.ask_for_code(&mut code_provider).await?;
            true
        } else if self.access_token_expired() {
            let refreshed = if self.has_refresh_token() {
                match self.refresh().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Refresh failed, asking for a new code: {}", e);
                        false
                    }
                }
            } else {
                false
            };
            if !refreshed {
                self.ask_for_code(&mut code_provider).await?;
            }
            true
        } else {
            false
        };

        if changed && self.settings.save_credentials {
            self.save_credentials().await?;
        }
        Ok(())
    }

    async fn ask_for_code<F>(&mut self, code_provider: &mut F) -> DriveResult<()>
    where
        F: FnMut(&str) -> DriveResult<String>,
    {
        let url = self.get_auth_url()?;
        let code = code_provider(&url)?;
        self.authenticate(code.trim()).await
    }

    /// A client ready for API calls. Expired tokens are refreshed (and saved
    /// when enabled) first.
    pub async fn authorized_client(&mut self) -> DriveResult<DriveClient> {
        if self.credentials().is_none() {
            return Err(DriveError::new(
                DriveErrorKind::NotAuthenticated,
                "No valid credentials provided to authorize",
            ));
        }
        if self.access_token_expired() {
            if !self.has_refresh_token() {
                return Err(DriveError::new(
                    DriveErrorKind::NotAuthenticated,
                    "Access token expired and no refresh token is available",
                ));
            }
            self.refresh().await?;
            if self.settings.save_credentials {
                self.save_credentials().await?;
            }
        }
        Ok(self.client.clone())
    }
}

/// Lock the shared auth state just long enough to get an authorized client.
pub async fn authorized_client(auth: &SharedAuth) -> DriveResult<DriveClient> {
    auth.lock().await.authorized_client().await
}

fn parse_client_secrets(path: &Path) -> DriveResult<ClientConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        DriveError::config(format!(
            "Invalid client secrets file '{}': {e}",
            path.display()
        ))
    })?;
    let secrets: ClientSecrets = serde_json::from_str(&text)
        .map_err(|e| DriveError::config(format!("Invalid client secrets file: {e}")))?;
    let entry = secrets
        .installed
        .or(secrets.web)
        .ok_or_else(|| DriveError::config("Unknown client_type of client config file"))?;

    match (entry.client_id, entry.client_secret, entry.redirect_uris.first()) {
        (Some(client_id), Some(client_secret), Some(redirect_uri)) => Ok(ClientConfig {
            client_id,
            client_secret,
            auth_uri: entry.auth_uri.unwrap_or_else(|| AUTH_URI.to_string()),
            token_uri: entry.token_uri.unwrap_or_else(|| TOKEN_URI.to_string()),
            redirect_uri: redirect_uri.clone(),
            revoke_uri: entry.revoke_uri.or_else(|| Some(REVOKE_URI.to_string())),
        }),
        _ => Err(DriveError::config("Insufficient client config in file")),
    }
}

async fn reject_symlink(path: &Path) -> DriveResult<()> {
    let is_link = tokio::fs::symlink_metadata(path)
        .await
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if is_link {
        return Err(DriveError::new(
            DriveErrorKind::InvalidCredentials,
            format!("Credentials file cannot be a symbolic link: {}", path.display()),
        ));
    }
    Ok(())
}

/// Convert the raw token response to our token type.
fn token_from_response(resp: TokenResponse) -> OAuthToken {
    let expires_at = resp.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
    OAuthToken {
        access_token: resp.access_token,
        refresh_token: resp.refresh_token,
        token_type: resp.token_type.unwrap_or_else(|| "Bearer".into()),
        expires_at,
        scope: resp.scope,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ServiceConfig, OOB_REDIRECT_URI};
    use crate::types::scopes;
    use std::path::PathBuf;

    fn settings_backend() -> Settings {
        Settings {
            client_config_backend: ClientConfigBackend::Settings,
            client_config: Some(ClientConfig::new("test-client-id", "secret")),
            ..Default::default()
        }
    }

    fn valid_token() -> OAuthToken {
        OAuthToken {
            access_token: "ya29.valid".into(),
            refresh_token: Some("1//refresh".into()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        }
    }

    fn write_secrets(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("client_secrets.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    // ── Client config ────────────────────────────────────────────

    #[test]
    fn client_secrets_installed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secrets(
            dir.path(),
            r#"{"installed":{"client_id":"id","client_secret":"s","auth_uri":"https://a/auth","token_uri":"https://a/token","redirect_uris":["http://localhost","urn:x"]}}"#,
        );
        let mut auth = GoogleAuth::new(Settings::default()).unwrap();
        let cfg = auth.load_client_config_file(&path).unwrap();
        assert_eq!(cfg.client_id, "id");
        assert_eq!(cfg.token_uri, "https://a/token");
        assert_eq!(cfg.redirect_uri, "http://localhost");
    }

    #[test]
    fn client_secrets_web_via_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secrets(
            dir.path(),
            r#"{"web":{"client_id":"web-id","client_secret":"s","redirect_uris":["https://app/cb"]}}"#,
        );
        let settings = Settings {
            client_config_file: path,
            ..Default::default()
        };
        let mut auth = GoogleAuth::new(settings).unwrap();
        let cfg = auth.load_client_config().unwrap();
        assert_eq!(cfg.client_id, "web-id");
        assert_eq!(cfg.auth_uri, AUTH_URI);
    }

    #[test]
    fn client_secrets_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secrets(dir.path(), r#"{"other":{}}"#);
        let mut auth = GoogleAuth::new(Settings::default()).unwrap();
        let err = auth.load_client_config_file(&path).unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::InvalidConfig);
        assert!(err.message.contains("client_type"));
    }

    #[test]
    fn client_secrets_insufficient() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secrets(dir.path(), r#"{"installed":{"client_id":"id"}}"#);
        let mut auth = GoogleAuth::new(Settings::default()).unwrap();
        let err = auth.load_client_config_file(&path).unwrap_err();
        assert!(err.message.contains("Insufficient"));
    }

    #[test]
    fn client_secrets_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = GoogleAuth::new(Settings::default()).unwrap();
        let err = auth
            .load_client_config_file(&dir.path().join("nope.json"))
            .unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::InvalidConfig);
    }

    #[test]
    fn settings_backend_config() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        assert!(auth.client_config().is_none());
        auth.load_client_config().unwrap();
        assert_eq!(auth.client_config().unwrap().client_id, "test-client-id");
    }

    #[test]
    fn service_backend_unsupported() {
        let settings = Settings {
            client_config_backend: ClientConfigBackend::Service,
            service_config: Some(ServiceConfig {
                client_user_email: None,
                client_service_email: "svc@example.iam.gserviceaccount.com".into(),
                client_pkcs12_file_path: PathBuf::from("key.p12"),
            }),
            ..Default::default()
        };
        let mut auth = GoogleAuth::new(settings).unwrap();
        assert_eq!(
            auth.load_client_config().unwrap_err().kind,
            DriveErrorKind::InvalidConfig
        );
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = Settings {
            client_config_backend: ClientConfigBackend::Settings,
            ..Default::default()
        };
        assert!(GoogleAuth::new(settings).is_err());
    }

    // ── Auth URL ─────────────────────────────────────────────────

    #[test]
    fn auth_url_online() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        let url = auth.get_auth_url().unwrap();
        assert!(url.starts_with(AUTH_URI));
        assert!(url.contains("client_id=test-client-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains(&url::form_urlencoded::byte_serialize(OOB_REDIRECT_URI.as_bytes()).collect::<String>()));
        assert!(!url.contains("access_type=offline"));
    }

    #[test]
    fn auth_url_offline_with_scopes() {
        let settings = Settings {
            get_refresh_token: true,
            oauth_scope: vec![scopes::DRIVE.into(), scopes::DRIVE_FILE.into()],
            ..settings_backend()
        };
        let mut auth = GoogleAuth::new(settings).unwrap();
        let url = auth.get_auth_url().unwrap();
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive+"));
    }

    // ── Credentials ──────────────────────────────────────────────

    #[test]
    fn access_token_expired_states() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        assert!(auth.access_token_expired());
        auth.set_credentials(valid_token());
        assert!(!auth.access_token_expired());
        auth.set_credentials(OAuthToken {
            expires_at: Some(Utc::now() - Duration::minutes(1)),
            ..valid_token()
        });
        assert!(auth.access_token_expired());
    }

    fn saving_settings(dir: &Path) -> Settings {
        Settings {
            save_credentials: true,
            save_credentials_backend: Some(CredentialsBackend::File),
            save_credentials_file: Some(dir.join("creds.json")),
            ..settings_backend()
        }
    }

    #[tokio::test]
    async fn save_and_load_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut auth = GoogleAuth::new(saving_settings(dir.path())).unwrap();
        assert!(!auth.load_credentials().await.unwrap());

        let token = valid_token();
        auth.set_credentials(token.clone());
        auth.save_credentials().await.unwrap();

        let mut other = GoogleAuth::new(saving_settings(dir.path())).unwrap();
        assert!(other.load_credentials().await.unwrap());
        assert_eq!(other.credentials(), Some(&token));
    }

    #[tokio::test]
    async fn save_without_credentials_fails() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GoogleAuth::new(saving_settings(dir.path())).unwrap();
        assert_eq!(
            auth.save_credentials().await.unwrap_err().kind,
            DriveErrorKind::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn credentials_need_backend() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        assert_eq!(
            auth.load_credentials().await.unwrap_err().kind,
            DriveErrorKind::InvalidConfig
        );
    }

    #[tokio::test]
    async fn corrupt_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("creds.json"), "not json").unwrap();
        let mut auth = GoogleAuth::new(saving_settings(dir.path())).unwrap();
        assert_eq!(
            auth.load_credentials().await.unwrap_err().kind,
            DriveErrorKind::InvalidCredentials
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_credentials_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.json");
        std::fs::write(&target, "{}").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("creds.json")).unwrap();

        let mut auth = GoogleAuth::new(saving_settings(dir.path())).unwrap();
        assert_eq!(
            auth.load_credentials().await.unwrap_err().kind,
            DriveErrorKind::InvalidCredentials
        );
        auth.set_credentials(valid_token());
        assert_eq!(
            auth.save_credentials().await.unwrap_err().kind,
            DriveErrorKind::InvalidCredentials
        );
    }

    // ── Authorized client ────────────────────────────────────────

    #[tokio::test]
    async fn authorized_client_without_credentials() {
        let auth = GoogleAuth::new(settings_backend()).unwrap().into_shared();
        let err = authorized_client(&auth).await.unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn authorized_client_with_valid_token() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        auth.set_credentials(valid_token());
        let client = auth.authorized_client().await.unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn authorized_client_expired_without_refresh_token() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        auth.set_credentials(OAuthToken {
            access_token: "ya29.old".into(),
            expires_at: Some(Utc::now() - Duration::minutes(1)),
            ..Default::default()
        });
        let err = auth.authorized_client().await.unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn refresh_without_refresh_token() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        auth.set_credentials(OAuthToken {
            access_token: "ya29.x".into(),
            ..Default::default()
        });
        assert_eq!(auth.refresh().await.unwrap_err().kind, DriveErrorKind::TokenExpired);
    }

    #[tokio::test]
    async fn authenticate_empty_code() {
        let mut auth = GoogleAuth::new(settings_backend()).unwrap();
        assert_eq!(
            auth.authenticate("").await.unwrap_err().kind,
            DriveErrorKind::InvalidParameter
        );
    }

    // ── Token conversion ─────────────────────────────────────────

    #[test]
    fn token_from_response_with_expiry() {
        let tok = token_from_response(TokenResponse {
            access_token: "ya29.test".into(),
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
            refresh_token: Some("1//refresh".into()),
            scope: Some(scopes::DRIVE.into()),
        });
        assert_eq!(tok.access_token, "ya29.test");
        assert!(tok.expires_at.is_some());
        assert!(!tok.is_expired());
    }

    #[test]
    fn token_from_response_defaults() {
        let tok = token_from_response(TokenResponse {
            access_token: "ya29.no_exp".into(),
            token_type: None,
            expires_in: None,
            refresh_token: None,
            scope: None,
        });
        assert_eq!(tok.token_type, "Bearer");
        assert!(tok.expires_at.is_none());
    }
}
