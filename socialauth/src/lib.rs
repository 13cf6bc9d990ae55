//! # Socialauth
//!
//! Foursquare and Instagram sign-in for web applications, built on a small OAuth2
//! Authorization Code flow controller.
//!
//! ```no_run
//! use socialauth::flow::{MemoryStateStore, OAuth2Service};
//! use socialauth::providers::instagram::InstagramProvider;
//!
//! # async fn run() -> Result<(), socialauth::AuthError> {
//! let store = MemoryStateStore::new();
//! let service = OAuth2Service::new(InstagramProvider::new("client-id", "client-secret"));
//! let url = service.get_code_url(&store, "https://example.com/auth/instagram").await?;
//! println!("redirect the browser to {url}");
//! # Ok(())
//! # }
//! ```

pub use socialauth_core::*;

#[cfg(feature = "flow")]
pub use socialauth_flow as flow;

#[cfg(feature = "session")]
pub use socialauth_session as session;

/// Provider adapters.
pub mod providers {
    #[cfg(feature = "foursquare")]
    pub use socialauth_providers_foursquare as foursquare;

    #[cfg(feature = "instagram")]
    pub use socialauth_providers_instagram as instagram;
}
