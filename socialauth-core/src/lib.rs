//! # Socialauth Core
//!
//! `socialauth-core` provides the foundational traits and types shared by the socialauth
//! flow controller and the provider adapters. A provider is a static configuration plus a
//! handful of pure hooks; everything that performs I/O lives in `socialauth-flow`.

#![warn(missing_docs)]

use async_trait::async_trait;
use serde_json::Value;

/// Errors that can occur during the authentication process.
pub mod error;
pub use crate::error::AuthError;

/// Provider configuration, tokens, profiles and error payloads.
pub mod state;
pub use crate::state::{
    AccessToken, ErrorInfo, PopupOptions, ProviderConfig, TokenMethod, TokenRequest,
    UserAttributes,
};

/// The set of hooks a provider plugs into the generic OAuth2 flow.
///
/// Implementations hold no session data and perform no I/O: the flow controller asks
/// them to describe requests and to interpret responses.
pub trait OAuthProvider: Send + Sync {
    /// Static configuration of the provider.
    fn config(&self) -> &ProviderConfig;

    /// Get the provider identifier.
    fn provider_id(&self) -> &str {
        &self.config().name
    }

    /// Scope sent to the consent screen, if any.
    fn scope(&self) -> Option<&str> {
        self.config().scope.as_deref()
    }

    /// Build the consent URL for `redirect_uri`, carrying the CSRF `state` token.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let config = self.config();
        let mut url = url::Url::parse(&config.authorize_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &config.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("response_type", "code");
            if let Some(scope) = self.scope() {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", state);
        }
        Ok(url.into())
    }

    /// Describe the request exchanging `code` for an access token.
    ///
    /// `redirect_uri` is the value stored when the consent URL was built.
    fn token_request(&self, code: &str, redirect_uri: &str) -> TokenRequest;

    /// User id carried by the token response itself, if the provider embeds one.
    fn token_user_id(&self, _token: &AccessToken) -> Option<String> {
        None
    }

    /// Profile carried by the token response itself, if the provider embeds one.
    fn embedded_profile(&self, _token: &AccessToken) -> Option<UserAttributes> {
        None
    }

    /// URL of the profile endpoint for the current user.
    ///
    /// Returns `None` when the endpoint cannot be addressed without a known user id.
    fn profile_url(&self, user_id: Option<&str>) -> Option<String>;

    /// Map a profile endpoint response to normalized attributes.
    ///
    /// Returns `None` when the response does not contain a user object.
    fn parse_profile(&self, body: &Value) -> Option<UserAttributes>;

    /// Classify a response body: `Some` when it carries an application error.
    fn parse_error(&self, body: &Value) -> Option<ErrorInfo>;

    /// Parameters attached to every authenticated API call.
    fn signed_request_params(&self, access_token: &str) -> Vec<(String, String)> {
        vec![("access_token".to_string(), access_token.to_string())]
    }
}

impl<T: OAuthProvider + ?Sized> OAuthProvider for std::sync::Arc<T> {
    fn config(&self) -> &ProviderConfig {
        (**self).config()
    }

    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn scope(&self) -> Option<&str> {
        (**self).scope()
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        (**self).authorization_url(redirect_uri, state)
    }

    fn token_request(&self, code: &str, redirect_uri: &str) -> TokenRequest {
        (**self).token_request(code, redirect_uri)
    }

    fn token_user_id(&self, token: &AccessToken) -> Option<String> {
        (**self).token_user_id(token)
    }

    fn embedded_profile(&self, token: &AccessToken) -> Option<UserAttributes> {
        (**self).embedded_profile(token)
    }

    fn profile_url(&self, user_id: Option<&str>) -> Option<String> {
        (**self).profile_url(user_id)
    }

    fn parse_profile(&self, body: &Value) -> Option<UserAttributes> {
        (**self).parse_profile(body)
    }

    fn parse_error(&self, body: &Value) -> Option<ErrorInfo> {
        (**self).parse_error(body)
    }

    fn signed_request_params(&self, access_token: &str) -> Vec<(String, String)> {
        (**self).signed_request_params(access_token)
    }
}

/// Session-scoped key/value storage bridging the authorize redirect and the callback.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), AuthError>;

    /// Whether a value exists for `key`.
    async fn has(&self, key: &str) -> Result<bool, AuthError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        (**self).remove(key).await
    }

    async fn has(&self, key: &str) -> Result<bool, AuthError> {
        (**self).has(key).await
    }
}

/// Helpers for reading loosely typed provider JSON.
pub mod utils {
    use crate::state::ErrorInfo;
    use serde_json::Value;

    /// Whether a value counts as "empty" the way provider payloads use it:
    /// `null`, `false`, `0`, `""` and `"0"`.
    pub fn is_falsy(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty() || s == "0",
            Value::Array(_) | Value::Object(_) => false,
        }
    }

    /// Read an identifier that providers send either as a string or as a number.
    pub fn as_id(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Read a string field, accepting numbers and booleans as their textual form.
    pub fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Extract an error from `body.meta` when `meta.<message_key>` is present.
    ///
    /// The code falls back to `0` and the message to `""` when the provider sends
    /// falsy values.
    pub fn meta_error(body: &Value, code_key: &str, message_key: &str) -> Option<ErrorInfo> {
        let meta = body.get("meta")?;
        let message = meta.get(message_key).filter(|v| !v.is_null())?;

        let code = meta
            .get(code_key)
            .filter(|v| !is_falsy(v))
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                Value::Bool(true) => Some(1),
                _ => None,
            })
            .unwrap_or(0);

        let message = if is_falsy(message) {
            String::new()
        } else {
            as_text(message).unwrap_or_default()
        };

        Some(ErrorInfo { code, message })
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn falsy_values() {
            assert!(is_falsy(&json!(null)));
            assert!(is_falsy(&json!(0)));
            assert!(is_falsy(&json!("")));
            assert!(is_falsy(&json!("0")));
            assert!(is_falsy(&json!(false)));
            assert!(!is_falsy(&json!(5)));
            assert!(!is_falsy(&json!("bad")));
        }

        #[test]
        fn ids_accept_strings_and_numbers() {
            assert_eq!(as_id(&json!("42")), Some("42".to_string()));
            assert_eq!(as_id(&json!(42)), Some("42".to_string()));
            assert_eq!(as_id(&json!("")), None);
            assert_eq!(as_id(&json!(null)), None);
        }

        #[test]
        fn meta_error_requires_message_key() {
            assert_eq!(meta_error(&json!({ "meta": { "code": 200 } }), "code", "detail"), None);
            assert_eq!(meta_error(&json!({ "data": {} }), "code", "detail"), None);
            assert_eq!(
                meta_error(&json!({ "meta": { "code": 400, "detail": null } }), "code", "detail"),
                None
            );
        }

        #[test]
        fn meta_error_defaults_falsy_values() {
            let info = meta_error(
                &json!({ "meta": { "code": "0", "detail": false } }),
                "code",
                "detail",
            )
            .unwrap();
            assert_eq!(info, ErrorInfo { code: 0, message: String::new() });

            let info = meta_error(&json!({ "meta": { "detail": "boom" } }), "code", "detail").unwrap();
            assert_eq!(info, ErrorInfo { code: 0, message: "boom".to_string() });

            let info = meta_error(
                &json!({ "meta": { "code": "400", "detail": "boom" } }),
                "code",
                "detail",
            )
            .unwrap();
            assert_eq!(info.code, 400);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(ProviderConfig);

    impl OAuthProvider for Dummy {
        fn config(&self) -> &ProviderConfig {
            &self.0
        }

        fn token_request(&self, code: &str, redirect_uri: &str) -> TokenRequest {
            TokenRequest::form(
                self.0.token_url.clone(),
                TokenRequest::authorization_code_params(&self.0, code, redirect_uri),
            )
        }

        fn profile_url(&self, _user_id: Option<&str>) -> Option<String> {
            None
        }

        fn parse_profile(&self, _body: &Value) -> Option<UserAttributes> {
            None
        }

        fn parse_error(&self, _body: &Value) -> Option<ErrorInfo> {
            None
        }
    }

    fn dummy(scope: Option<&str>) -> Dummy {
        let mut config = ProviderConfig::new(
            "dummy",
            "Dummy",
            "https://example.com/oauth/authorize",
            "https://example.com/oauth/token",
        )
        .with_credentials("client", "secret");
        config.scope = scope.map(str::to_string);
        Dummy(config)
    }

    #[test]
    fn authorization_url_carries_standard_parameters() {
        let url = dummy(Some("basic"))
            .authorization_url("https://app.test/cb?x=1/2", "csrf")
            .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/oauth/authorize");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "client".to_string()),
                ("redirect_uri".to_string(), "https://app.test/cb?x=1/2".to_string()),
                ("response_type".to_string(), "code".to_string()),
                ("scope".to_string(), "basic".to_string()),
                ("state".to_string(), "csrf".to_string()),
            ]
        );
    }

    #[test]
    fn authorization_url_omits_missing_scope() {
        let url = dummy(None).authorization_url("https://app.test/cb", "s").unwrap();
        assert!(!url.contains("scope="));
    }

    #[test]
    fn default_signed_params_use_access_token() {
        assert_eq!(
            dummy(None).signed_request_params("tok"),
            vec![("access_token".to_string(), "tok".to_string())]
        );
    }
}
