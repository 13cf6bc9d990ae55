use crate::request::{classify_response, ApiRequest};
use serde::Deserialize;
use serde_json::Value;
use socialauth_core::{
    AccessToken, AuthError, OAuthProvider, PopupOptions, StateStore, TokenMethod, UserAttributes,
};
use socialauth_session::ScopedState;

const REDIRECT_URI_KEY: &str = "redirect_uri";
const CSRF_STATE_KEY: &str = "state";
const AUTH_TOKEN_KEY: &str = "auth_token";
const ID_KEY: &str = "id";
const EXPIRES_KEY: &str = "expires";

/// How the `expires` timestamp of a saved token is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// `now * 2` in unix seconds. Far enough in the future to never expire in practice,
    /// and compatible with sessions written by earlier deployments.
    #[default]
    LegacyDoubled,
    /// `now + lifetime`.
    Lifetime(chrono::Duration),
}

impl ExpiryPolicy {
    /// The `expires` value for a token saved at unix time `now`.
    pub fn expires_at(&self, now: i64) -> i64 {
        match self {
            ExpiryPolicy::LegacyDoubled => now.saturating_mul(2),
            ExpiryPolicy::Lifetime(lifetime) => now.saturating_add(lifetime.num_seconds()),
        }
    }
}

/// Query parameters the provider appends when redirecting back to the application.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// CSRF token echoed back by the provider.
    pub state: Option<String>,
    /// OAuth2 error code, e.g. `access_denied`.
    pub error: Option<String>,
    /// Human readable error description.
    pub error_description: Option<String>,
}

/// The authenticated half of the service state. Token and id only ever travel together.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Credentials {
    id: String,
    access_token: String,
}

/// Drives one provider through the OAuth2 Authorization Code flow.
///
/// A service is meant to be built per incoming request. Everything that must outlive the
/// request goes through the [`StateStore`] handed to each call, namespaced by provider id.
pub struct OAuth2Service<P: OAuthProvider> {
    provider: P,
    client: reqwest::Client,
    expiry: ExpiryPolicy,
    credentials: Option<Credentials>,
    raw_token: Option<AccessToken>,
    attributes: Option<UserAttributes>,
}

impl<P: OAuthProvider> OAuth2Service<P> {
    /// Create a new unauthenticated service for `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
            expiry: ExpiryPolicy::default(),
            credentials: None,
            raw_token: None,
            attributes: None,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, user agent).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set how saved tokens expire.
    pub fn with_expiry_policy(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Provider machine name.
    pub fn name(&self) -> &str {
        self.provider.provider_id()
    }

    /// Provider display title.
    pub fn title(&self) -> &str {
        &self.provider.config().title
    }

    /// Popup sizing hints.
    pub fn popup(&self) -> PopupOptions {
        self.provider.config().popup
    }

    /// Authenticated user id.
    pub fn id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.id.as_str())
    }

    /// Current access token.
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }

    /// Whether a token and a user id are held.
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Attributes fetched so far, without touching the network.
    pub fn attributes(&self) -> Option<&UserAttributes> {
        self.attributes.as_ref()
    }

    fn scoped<'a>(&self, store: &'a dyn StateStore) -> ScopedState<'a> {
        ScopedState::new(store, self.provider.provider_id())
    }

    /// Build the consent URL the browser must be sent to.
    ///
    /// `redirect_uri` and a fresh CSRF token are written to `store` first; both are read
    /// back when the provider calls the application again.
    pub async fn get_code_url(
        &self,
        store: &dyn StateStore,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        let state = self.scoped(store);
        state.set(REDIRECT_URI_KEY, redirect_uri).await?;

        let csrf = uuid::Uuid::new_v4().to_string();
        state.set(CSRF_STATE_KEY, &csrf).await?;

        let url = self.provider.authorization_url(redirect_uri, &csrf)?;
        log::debug!("{}: built authorization url", self.name());
        Ok(url)
    }

    /// Complete the flow when the provider redirects back.
    ///
    /// A session restorable from `store` short-circuits the exchange.
    pub async fn handle_callback(
        &mut self,
        store: &dyn StateStore,
        params: &CallbackParams,
    ) -> Result<bool, AuthError> {
        if let Some(error) = params.error.as_deref() {
            if error == "access_denied" {
                log::debug!("{}: user declined consent", self.name());
                return Err(AuthError::Cancelled);
            }
            return Err(AuthError::Provider {
                code: 0,
                message: params
                    .error_description
                    .clone()
                    .unwrap_or_else(|| error.to_string()),
            });
        }

        if self.restore_access_token(store).await? {
            return Ok(true);
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::InvalidResponse("callback carries no code".to_string()))?;

        let state = self.scoped(store);
        let expected = state.get(CSRF_STATE_KEY).await?;
        match (expected.as_deref(), params.state.as_deref()) {
            (Some(expected), Some(received)) if expected == received => {}
            _ => {
                log::warn!("{}: callback state does not match", self.name());
                return Err(AuthError::CsrfMismatch);
            }
        }

        let token = self.exchange_code(store, code).await?;
        self.save_access_token(store, token).await?;
        state.remove(CSRF_STATE_KEY).await?;
        Ok(true)
    }

    /// Exchange an authorization code for an access token.
    ///
    /// The `redirect_uri` sent is the one stored by [`get_code_url`](Self::get_code_url);
    /// providers reject the exchange when it differs.
    pub async fn exchange_code(
        &self,
        store: &dyn StateStore,
        code: &str,
    ) -> Result<AccessToken, AuthError> {
        let redirect_uri = self
            .scoped(store)
            .get(REDIRECT_URI_KEY)
            .await?
            .ok_or_else(|| AuthError::Session("redirect_uri missing from state".to_string()))?;

        let token_request = self.provider.token_request(code, &redirect_uri);
        let request = match token_request.method {
            TokenMethod::Query => ApiRequest::get(token_request.url).query(token_request.params),
            TokenMethod::Form => ApiRequest::post(token_request.url, token_request.params),
        };

        log::debug!("{}: exchanging authorization code", self.name());
        let body = self.make_request(request).await?;
        AccessToken::from_json(body)
    }

    /// Persist a freshly exchanged token and mark the service authenticated.
    ///
    /// The user id comes from the token response when the provider embeds it, otherwise
    /// from a profile fetch made with the new token. Without an id nothing is saved, and a
    /// store failure part way through puts the previous values back.
    pub async fn save_access_token(
        &mut self,
        store: &dyn StateStore,
        token: AccessToken,
    ) -> Result<(), AuthError> {
        let (id, attributes) = match self.provider.token_user_id(&token) {
            Some(id) => (id, None),
            None => {
                let attributes = self.fetch_profile(&token.access_token, None).await?;
                let id = attributes.id.clone().ok_or(AuthError::ProfileUnavailable)?;
                (id, Some(attributes))
            }
        };

        let expires = self.expiry.expires_at(chrono::Utc::now().timestamp());
        let state = self.scoped(store);
        let entries = [
            (AUTH_TOKEN_KEY, token.access_token.clone()),
            (ID_KEY, id.clone()),
            (EXPIRES_KEY, expires.to_string()),
        ];
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in &entries {
            previous.push((*key, state.get(key).await?));
        }
        for (key, value) in &entries {
            if let Err(e) = state.set(key, value).await {
                log::warn!("{}: saving access token failed, restoring state", self.name());
                roll_back(&state, &previous).await;
                return Err(e);
            }
        }

        log::debug!("{}: saved access token for user {}", self.name(), id);
        self.credentials = Some(Credentials {
            id,
            access_token: token.access_token.clone(),
        });
        self.raw_token = Some(token);
        self.attributes = attributes;
        Ok(())
    }

    /// Rebuild the authenticated state from `store`.
    ///
    /// Succeeds only when an `id` is stored and the stored token has not expired;
    /// otherwise, including when the store fails, the in-memory credentials are cleared.
    pub async fn restore_access_token(&mut self, store: &dyn StateStore) -> Result<bool, AuthError> {
        let state = self.scoped(store);

        let restored = match stored_credentials(&state).await {
            Ok(restored) => restored,
            Err(e) => {
                self.clear();
                return Err(e);
            }
        };

        match restored {
            Some(credentials) => {
                log::debug!("{}: restored session for user {}", self.name(), credentials.id);
                if self.id() != Some(credentials.id.as_str()) {
                    self.raw_token = None;
                    self.attributes = None;
                }
                self.credentials = Some(credentials);
                Ok(true)
            }
            None => {
                self.clear();
                Ok(false)
            }
        }
    }

    /// Forget the authenticated user, in memory and in `store`.
    pub async fn logout(&mut self, store: &dyn StateStore) -> Result<(), AuthError> {
        let state = self.scoped(store);
        for key in [AUTH_TOKEN_KEY, ID_KEY, EXPIRES_KEY] {
            state.remove(key).await?;
        }
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.credentials = None;
        self.raw_token = None;
        self.attributes = None;
    }

    /// Return the user attributes, fetching them on first use.
    ///
    /// Profile data embedded in the token response is reused before any network call.
    /// Fields the provider omits stay unset.
    pub async fn fetch_attributes(&mut self) -> Result<&UserAttributes, AuthError> {
        if self.attributes.is_none() {
            let credentials = self.credentials.clone().ok_or(AuthError::NotAuthenticated)?;
            let embedded = self
                .raw_token
                .as_ref()
                .and_then(|token| self.provider.embedded_profile(token));
            let attributes = match embedded {
                Some(attributes) => attributes,
                None => {
                    self.fetch_profile(&credentials.access_token, Some(&credentials.id))
                        .await?
                }
            };
            self.attributes = Some(attributes);
        }
        Ok(self.attributes.get_or_insert_with(UserAttributes::default))
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: Option<&str>,
    ) -> Result<UserAttributes, AuthError> {
        let Some(url) = self.provider.profile_url(user_id) else {
            return Ok(UserAttributes::default());
        };
        let body = self.signed_request(access_token, &url, Vec::new()).await?;
        let attributes = self.provider.parse_profile(&body).unwrap_or_default();
        if attributes.id.is_none() {
            log::warn!("{}: profile response carries no user id", self.name());
        }
        Ok(attributes)
    }

    /// Call a provider API on behalf of the authenticated user.
    pub async fn make_signed_request(
        &self,
        url: &str,
        params: Vec<(String, String)>,
    ) -> Result<Value, AuthError> {
        let credentials = self.credentials.as_ref().ok_or(AuthError::NotAuthenticated)?;
        self.signed_request(&credentials.access_token, url, params)
            .await
    }

    async fn signed_request(
        &self,
        access_token: &str,
        url: &str,
        params: Vec<(String, String)>,
    ) -> Result<Value, AuthError> {
        let request = ApiRequest::get(url)
            .query(params)
            .query(self.provider.signed_request_params(access_token));
        self.make_request(request).await
    }

    /// Send an unauthenticated request and classify the response.
    pub async fn make_request(&self, request: ApiRequest) -> Result<Value, AuthError> {
        let url = request.full_url()?;
        log::debug!(
            "{}: {} {}{}",
            self.name(),
            if request.form.is_some() { "POST" } else { "GET" },
            url.origin().ascii_serialization(),
            url.path()
        );

        let builder = match &request.form {
            Some(form) => self.client.post(url).form(form),
            None => self.client.get(url),
        };
        let response = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        classify_response(&self.provider, status, &text)
    }
}

async fn stored_credentials(state: &ScopedState<'_>) -> Result<Option<Credentials>, AuthError> {
    let Some(id) = state.get(ID_KEY).await? else {
        return Ok(None);
    };
    Ok(stored_token(state)
        .await?
        .map(|access_token| Credentials { id, access_token }))
}

/// Put back the values a failed save overwrote. Keys that were absent are removed.
async fn roll_back(state: &ScopedState<'_>, previous: &[(&str, Option<String>)]) {
    for (key, value) in previous {
        let restored = match value {
            Some(value) => state.set(key, value).await,
            None => state.remove(key).await,
        };
        if let Err(e) = restored {
            log::warn!("could not restore {}: {e}", state.key(key));
        }
    }
}

async fn stored_token(state: &ScopedState<'_>) -> Result<Option<String>, AuthError> {
    let Some(token) = state.get(AUTH_TOKEN_KEY).await? else {
        return Ok(None);
    };
    let expires = state
        .get(EXPIRES_KEY)
        .await?
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0);

    if expires > chrono::Utc::now().timestamp() {
        Ok(Some(token))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_expiry_doubles_now() {
        assert_eq!(ExpiryPolicy::LegacyDoubled.expires_at(1_700_000_000), 3_400_000_000);
        assert_eq!(ExpiryPolicy::LegacyDoubled.expires_at(i64::MAX), i64::MAX);
    }

    #[test]
    fn lifetime_expiry_adds_duration() {
        let policy = ExpiryPolicy::Lifetime(chrono::Duration::hours(1));
        assert_eq!(policy.expires_at(1_000), 4_600);
    }

    #[test]
    fn callback_params_deserialize_from_query() {
        let params: CallbackParams =
            serde_json::from_value(serde_json::json!({ "code": "abc", "state": "s" })).unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.error, None);
    }
}
