//! Foursquare OAuth2 provider.
//!
//! Register an application at <https://foursquare.com/developers/register>.
//!
//! Foursquare differs from the common OAuth2 shape in two ways: the token endpoint is
//! called with `GET` and every API call must carry `oauth_token` and a `v` version date
//! instead of a bearer header.

use serde_json::Value;
use socialauth_core::{
    utils, AuthError, ErrorInfo, OAuthProvider, ProviderConfig, TokenRequest, UserAttributes,
};

/// Consent endpoint.
pub const AUTHORIZE_URL: &str = "https://foursquare.com/oauth2/authenticate";
/// Token endpoint, called with `GET`.
pub const TOKEN_URL: &str = "https://foursquare.com/oauth2/access_token";
/// Base of the v2 API.
pub const API_BASE_URL: &str = "https://api.foursquare.com/v2";

const PROFILE_BASE_URL: &str = "https://foursquare.com/user/";

pub struct FoursquareProvider {
    config: ProviderConfig,
    version: String,
    api_base_url: String,
}

impl FoursquareProvider {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            config: ProviderConfig::new("foursquare", "Foursquare", AUTHORIZE_URL, TOKEN_URL)
                .with_credentials(client_id, client_secret)
                .with_popup(700, 350),
            version: current_version(),
            api_base_url: API_BASE_URL.to_string(),
        }
    }

    /// Reads `SOCIALAUTH_FOURSQUARE_CLIENT_ID`, `SOCIALAUTH_FOURSQUARE_CLIENT_SECRET`
    /// and, optionally, `SOCIALAUTH_FOURSQUARE_API_VERSION`.
    pub fn from_env() -> Result<Self, AuthError> {
        let client_id = env("SOCIALAUTH_FOURSQUARE_CLIENT_ID")?;
        let client_secret = env("SOCIALAUTH_FOURSQUARE_CLIENT_SECRET")?;
        let provider = Self::new(client_id, client_secret);
        match std::env::var("SOCIALAUTH_FOURSQUARE_API_VERSION") {
            Ok(version) if !version.trim().is_empty() => Ok(provider.with_version(version.trim())),
            _ => Ok(provider),
        }
    }

    /// Pin the API version date (`YYYYMMDD`). Defaults to today's date.
    ///
    /// See <https://developer.foursquare.com/overview/versioning>.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
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

    pub fn version(&self) -> &str {
        &self.version
    }
}

fn current_version() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

fn env(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is not set")))
}

impl OAuthProvider for FoursquareProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn token_request(&self, code: &str, redirect_uri: &str) -> TokenRequest {
        TokenRequest::query(
            self.config.token_url.clone(),
            TokenRequest::authorization_code_params(&self.config, code, redirect_uri),
        )
    }

    fn profile_url(&self, _user_id: Option<&str>) -> Option<String> {
        Some(format!("{}/users/self", self.api_base_url))
    }

    fn parse_profile(&self, body: &Value) -> Option<UserAttributes> {
        let user = body.get("response")?.get("user")?;
        let id = user.get("id").and_then(utils::as_id);

        let name_parts: Vec<String> = ["firstName", "lastName"]
            .iter()
            .filter_map(|key| user.get(*key).and_then(utils::as_text))
            .filter(|part| !part.is_empty())
            .collect();
        let name = (!name_parts.is_empty()).then(|| name_parts.join(" "));

        Some(UserAttributes {
            url: id.as_ref().map(|id| format!("{PROFILE_BASE_URL}{id}")),
            id,
            name,
        })
    }

    fn parse_error(&self, body: &Value) -> Option<ErrorInfo> {
        utils::meta_error(body, "code", "errorDetail")
    }

    fn signed_request_params(&self, access_token: &str) -> Vec<(String, String)> {
        vec![
            ("oauth_token".to_string(), access_token.to_string()),
            ("v".to_string(), self.version.clone()),
        ]
    }
}
