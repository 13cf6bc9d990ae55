//! Instagram OAuth2 provider.
//!
//! Register an application at <http://instagram.com/developer/clients/manage/>.
//!
//! The token endpoint answers with the user profile embedded next to the access token,
//! so a fresh login needs no separate profile call.

use serde_json::Value;
use socialauth_core::{
    utils, AccessToken, AuthError, ErrorInfo, OAuthProvider, ProviderConfig, TokenRequest,
    UserAttributes,
};

/// Consent endpoint.
pub const AUTHORIZE_URL: &str = "https://api.instagram.com/oauth/authorize";
/// Token endpoint, called with a form `POST`.
pub const TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";
/// Base of the v1 API.
pub const API_BASE_URL: &str = "https://api.instagram.com/v1";

const PROFILE_BASE_URL: &str = "http://instagram.com/";

pub struct InstagramProvider {
    config: ProviderConfig,
    api_base_url: String,
}

impl InstagramProvider {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            config: ProviderConfig::new("instagram", "Instagram", AUTHORIZE_URL, TOKEN_URL)
                .with_credentials(client_id, client_secret)
                .with_scope("basic")
                .with_popup(585, 350),
            api_base_url: API_BASE_URL.to_string(),
        }
    }

    /// Reads `SOCIALAUTH_INSTAGRAM_CLIENT_ID` and `SOCIALAUTH_INSTAGRAM_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self, AuthError> {
        let client_id = env("SOCIALAUTH_INSTAGRAM_CLIENT_ID")?;
        let client_secret = env("SOCIALAUTH_INSTAGRAM_CLIENT_SECRET")?;
        Ok(Self::new(client_id, client_secret))
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.config.scope = Some(scope.into());
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.config.authorize_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.token_url = url.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn env(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is not set")))
}

fn map_user(user: &Value) -> Option<UserAttributes> {
    if !user.is_object() {
        return None;
    }
    Some(UserAttributes {
        id: user.get("id").and_then(utils::as_id),
        name: user.get("full_name").and_then(utils::as_text),
        url: user
            .get("username")
            .and_then(utils::as_text)
            .filter(|username| !username.is_empty())
            .map(|username| format!("{PROFILE_BASE_URL}{username}")),
    })
}

impl OAuthProvider for InstagramProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn token_request(&self, code: &str, redirect_uri: &str) -> TokenRequest {
        TokenRequest::form(
            self.config.token_url.clone(),
            TokenRequest::authorization_code_params(&self.config, code, redirect_uri),
        )
    }

    fn token_user_id(&self, token: &AccessToken) -> Option<String> {
        token.field("user")?.get("id").and_then(utils::as_id)
    }

    fn embedded_profile(&self, token: &AccessToken) -> Option<UserAttributes> {
        token.field("user").and_then(map_user)
    }

    fn profile_url(&self, user_id: Option<&str>) -> Option<String> {
        user_id.map(|id| format!("{}/users/{}", self.api_base_url, id))
    }

    fn parse_profile(&self, body: &Value) -> Option<UserAttributes> {
        body.get("data").and_then(map_user)
    }

    fn parse_error(&self, body: &Value) -> Option<ErrorInfo> {
        utils::meta_error(body, "error_code", "error_message")
    }
}
