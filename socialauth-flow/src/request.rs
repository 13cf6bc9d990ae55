use serde_json::Value;
use socialauth_core::{AuthError, OAuthProvider};

/// Longest slice of an unrecognised error body kept in [`AuthError::Http`].
const ERROR_BODY_LIMIT: usize = 240;

/// An outbound call to a provider endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiRequest {
    /// Target URL. Parameters in `query` are appended to any query it already has.
    pub url: String,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// Form body. When set the request is sent as a `POST`.
    pub form: Option<Vec<(String, String)>>,
}

impl ApiRequest {
    /// A `GET` request to `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// A `POST` request to `url` carrying `form` as its body.
    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            form: Some(form),
            ..Default::default()
        }
    }

    /// Append query string parameters.
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The final URL including the query string.
    pub fn full_url(&self) -> Result<url::Url, AuthError> {
        let mut url = url::Url::parse(&self.url)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}

/// Turn a raw provider response into JSON, consulting the provider's error classifier.
///
/// An error payload wins over the transport status: providers report failures with
/// `200 OK` as well as with `4xx`.
pub(crate) fn classify_response<P: OAuthProvider + ?Sized>(
    provider: &P,
    status: u16,
    text: &str,
) -> Result<Value, AuthError> {
    let parsed = serde_json::from_str::<Value>(text);

    if let Ok(body) = &parsed {
        if let Some(info) = provider.parse_error(body) {
            log::warn!(
                "{} reported error {}: {}",
                provider.provider_id(),
                info.code,
                info.message
            );
            return Err(info.into());
        }
    }

    if !(200..300).contains(&status) {
        return Err(AuthError::Http {
            status,
            body: text.chars().take(ERROR_BODY_LIMIT).collect(),
        });
    }

    parsed.map_err(|e| AuthError::InvalidResponse(format!("response is not JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialauth_core::{ErrorInfo, ProviderConfig, TokenRequest, UserAttributes};

    struct MetaErrors(ProviderConfig);

    impl OAuthProvider for MetaErrors {
        fn config(&self) -> &ProviderConfig {
            &self.0
        }

        fn token_request(&self, code: &str, redirect_uri: &str) -> TokenRequest {
            TokenRequest::query(
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

        fn parse_error(&self, body: &Value) -> Option<ErrorInfo> {
            socialauth_core::utils::meta_error(body, "code", "detail")
        }
    }

    fn provider() -> MetaErrors {
        MetaErrors(ProviderConfig::new("meta", "Meta", "https://a.test", "https://t.test"))
    }

    #[test]
    fn error_payload_with_success_status_is_an_error() {
        let err = classify_response(&provider(), 200, r#"{"meta":{"code":7,"detail":"nope"}}"#)
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider { code: 7, ref message } if message == "nope"));
    }

    #[test]
    fn error_payload_wins_over_status() {
        let err = classify_response(&provider(), 400, r#"{"meta":{"code":400,"detail":"bad"}}"#)
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider { code: 400, .. }));
    }

    #[test]
    fn non_json_failure_is_http_error() {
        let long = "x".repeat(1000);
        let err = classify_response(&provider(), 502, &long).unwrap_err();
        match err {
            AuthError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_json_success_is_invalid_response() {
        let err = classify_response(&provider(), 200, "access_token=abc").unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[test]
    fn post_carries_form_without_query() {
        let request = ApiRequest::post(
            "https://api.test/oauth/access_token",
            vec![("code".to_string(), "abc".to_string())],
        );
        assert_eq!(request.form.as_deref(), Some(&[("code".to_string(), "abc".to_string())][..]));
        assert_eq!(request.full_url().unwrap().query(), None);
    }

    #[test]
    fn full_url_appends_query() {
        let request = ApiRequest::get("https://api.test/v2/users/self?locale=en")
            .query([("oauth_token", "t"), ("v", "20240101")]);
        assert_eq!(
            request.full_url().unwrap().as_str(),
            "https://api.test/v2/users/self?locale=en&oauth_token=t&v=20240101"
        );
    }
}
