use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Popup window sizing hints handed to the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupOptions {
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            width: 500,
            height: 450,
        }
    }
}

/// Static, per-provider configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Machine name, e.g. `foursquare`. Also used to namespace session state.
    pub name: String,
    /// Human readable title shown in provider pickers.
    pub title: String,
    /// Consent endpoint the browser is redirected to.
    pub authorize_url: String,
    /// Endpoint exchanging an authorization code for an access token.
    pub token_url: String,
    /// OAuth2 client identifier.
    #[serde(default)]
    pub client_id: String,
    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Scope requested on the consent screen.
    #[serde(default)]
    pub scope: Option<String>,
    /// Popup sizing hints.
    #[serde(default)]
    pub popup: PopupOptions,
}

impl ProviderConfig {
    /// Create a configuration with empty credentials.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: None,
            popup: PopupOptions::default(),
        }
    }

    /// Set the client credentials.
    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Set the requested scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the popup sizing hints.
    pub fn with_popup(mut self, width: u32, height: u32) -> Self {
        self.popup = PopupOptions { width, height };
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("popup", &self.popup)
            .finish()
    }
}

/// An access token together with the raw token endpoint response.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessToken {
    /// The bearer credential.
    pub access_token: String,
    /// The full JSON body returned by the token endpoint.
    pub raw: Value,
}

impl AccessToken {
    /// Build a token from a token endpoint response.
    ///
    /// Fails when the body carries no non-empty `access_token` string.
    pub fn from_json(raw: Value) -> Result<Self, AuthError> {
        let access_token = raw
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidResponse("token response missing access_token".to_string())
            })?
            .to_string();
        Ok(Self { access_token, raw })
    }

    /// Look up an auxiliary field of the raw response.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

/// Normalized profile of the authenticated user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributes {
    /// Provider user id.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Public profile URL.
    pub url: Option<String>,
}

/// An application error extracted from a provider JSON body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Provider error code, `0` when absent.
    pub code: i64,
    /// Provider error message, empty when absent.
    pub message: String,
}

/// How the token endpoint expects its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenMethod {
    /// `GET` with the parameters in the query string.
    Query,
    /// `POST` with the parameters as an `application/x-www-form-urlencoded` body.
    Form,
}

/// A fully described token exchange request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
    /// Transport shape of the request.
    pub method: TokenMethod,
    /// Token endpoint, without query string.
    pub url: String,
    /// Exchange parameters in send order.
    pub params: Vec<(String, String)>,
}

impl TokenRequest {
    /// A `GET` request carrying `params` in the query string.
    pub fn query(url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: TokenMethod::Query,
            url: url.into(),
            params,
        }
    }

    /// A `POST` request carrying `params` as form data.
    pub fn form(url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: TokenMethod::Form,
            url: url.into(),
            params,
        }
    }

    /// The standard `authorization_code` grant parameters.
    pub fn authorization_code_params(
        config: &ProviderConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Vec<(String, String)> {
        vec![
            ("client_id".to_string(), config.client_id.clone()),
            ("client_secret".to_string(), config.client_secret.clone()),
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("code".to_string(), code.to_string()),
        ]
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_token_requires_access_token_field() {
        let err = AccessToken::from_json(json!({ "token_type": "bearer" })).unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));

        let err = AccessToken::from_json(json!({ "access_token": "" })).unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[test]
    fn access_token_keeps_raw_response() {
        let token = AccessToken::from_json(json!({
            "access_token": "abc",
            "user": { "id": "42" }
        }))
        .unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.field("user").unwrap()["id"], "42");
    }

    #[test]
    fn debug_redacts_client_secret() {
        let config = ProviderConfig::new("p", "P", "https://a", "https://t")
            .with_credentials("id", "super-secret");
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ProviderConfig = serde_json::from_value(json!({
            "name": "instagram",
            "title": "Instagram",
            "authorize_url": "https://api.instagram.com/oauth/authorize",
            "token_url": "https://api.instagram.com/oauth/access_token"
        }))
        .unwrap();
        assert_eq!(config.client_id, "");
        assert_eq!(config.scope, None);
        assert_eq!(config.popup, PopupOptions::default());
    }
}
