//! # Socialauth Flow
//!
//! `socialauth-flow` drives provider adapters through the OAuth2 Authorization Code flow.
//! It owns everything the adapters deliberately leave out: HTTP calls, session state,
//! CSRF protection and token persistence.
//!
//! ## Key Components
//!
//! - **[`OAuth2Service`]**: Per-request flow controller wrapping one provider.
//! - **[`Socialauth`]**: Registry of configured providers, used to list them in a UI and
//!   to build services on demand.
//! - **[`SocialauthBuilder`]**: A builder for configuring and creating a [`Socialauth`] instance.

#![warn(missing_docs)]

use serde::Serialize;
pub use socialauth_core::{OAuthProvider, StateStore};
pub use socialauth_session::{MemoryStateStore, ScopedState};
use std::collections::BTreeMap;
use std::sync::Arc;

/// OAuth2 Authorization Code flow implementation.
pub mod oauth2;
/// Outbound provider requests.
pub mod request;

pub use oauth2::{CallbackParams, ExpiryPolicy, OAuth2Service};
pub use request::ApiRequest;
pub use socialauth_core::PopupOptions;

/// What a UI needs to offer a provider to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    /// Provider machine name.
    pub name: String,
    /// Provider display title.
    pub title: String,
    /// Popup sizing hints.
    pub popup: PopupOptions,
}

/// A service wrapping a type-erased provider, as handed out by [`Socialauth`].
pub type DynOAuth2Service = OAuth2Service<Arc<dyn OAuthProvider>>;

/// The set of configured providers.
#[derive(Clone)]
pub struct Socialauth {
    /// Registered providers keyed by provider id.
    pub providers: BTreeMap<String, Arc<dyn OAuthProvider>>,
    client: reqwest::Client,
    expiry: ExpiryPolicy,
}

impl Socialauth {
    /// Create a new [`SocialauthBuilder`] to configure the registry.
    pub fn builder() -> SocialauthBuilder {
        SocialauthBuilder::default()
    }

    /// Providers in name order.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        self.providers
            .values()
            .map(|provider| {
                let config = provider.config();
                ServiceDescriptor {
                    name: config.name.clone(),
                    title: config.title.clone(),
                    popup: config.popup,
                }
            })
            .collect()
    }

    /// Build a fresh, unauthenticated service for the provider named `name`.
    pub fn service(&self, name: &str) -> Option<DynOAuth2Service> {
        let provider = self.providers.get(name)?.clone();
        Some(
            OAuth2Service::new(provider)
                .with_client(self.client.clone())
                .with_expiry_policy(self.expiry),
        )
    }
}

/// A builder for configuring and creating a [`Socialauth`] instance.
#[derive(Default)]
pub struct SocialauthBuilder {
    providers: BTreeMap<String, Arc<dyn OAuthProvider>>,
    client: Option<reqwest::Client>,
    expiry: ExpiryPolicy,
}

impl SocialauthBuilder {
    /// Register a provider. A provider with the same id replaces the previous one.
    pub fn provider<P>(mut self, provider: P) -> Self
    where
        P: OAuthProvider + 'static,
    {
        let id = provider.provider_id().to_string();
        self.providers.insert(id, Arc::new(provider));
        self
    }

    /// Share a preconfigured HTTP client between all services.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set how saved tokens expire.
    pub fn expiry_policy(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    /// Build the [`Socialauth`] instance.
    pub fn build(self) -> Socialauth {
        Socialauth {
            providers: self.providers,
            client: self.client.unwrap_or_default(),
            expiry: self.expiry,
        }
    }
}
