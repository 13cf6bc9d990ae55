//! # Console Login Example
//!
//! Walks through one complete login without a web server:
//! 1. Prints the consent URL for the chosen provider.
//! 2. Waits for the URL the browser was redirected to, pasted on stdin.
//! 3. Exchanges the code and prints the normalized user attributes.
//!
//! ```sh
//! SOCIALAUTH_INSTAGRAM_CLIENT_ID=... SOCIALAUTH_INSTAGRAM_CLIENT_SECRET=... \
//!     cargo run --bin console_login -- instagram http://localhost:3000/callback
//! ```

use socialauth::flow::{CallbackParams, MemoryStateStore, Socialauth};
use socialauth::providers::{foursquare::FoursquareProvider, instagram::InstagramProvider};
use std::io::BufRead;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut builder = Socialauth::builder();

    // --- Foursquare ---
    match FoursquareProvider::from_env() {
        Ok(provider) => builder = builder.provider(provider),
        Err(e) => log::info!("foursquare disabled: {e}"),
    }

    // --- Instagram ---
    match InstagramProvider::from_env() {
        Ok(provider) => builder = builder.provider(provider),
        Err(e) => log::info!("instagram disabled: {e}"),
    }

    let socialauth = builder.build();

    let mut args = std::env::args().skip(1);
    let Some(name) = args.next() else {
        println!("usage: console_login <provider> [redirect_uri]");
        for service in socialauth.services() {
            println!(
                "  {:<12} {} (popup {}x{})",
                service.name, service.title, service.popup.width, service.popup.height
            );
        }
        return Ok(());
    };
    let redirect_uri = args
        .next()
        .unwrap_or_else(|| format!("http://localhost:3000/auth/{name}/callback"));

    let mut service = socialauth
        .service(&name)
        .ok_or_else(|| format!("provider {name} is not configured"))?;
    let store = MemoryStateStore::new();

    let url = service.get_code_url(&store, &redirect_uri).await?;
    println!("Open this URL and approve access:\n\n  {url}\n");
    println!("Then paste the URL you were redirected to:");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let callback = url::Url::parse(line.trim())?;

    let mut params = CallbackParams::default();
    for (key, value) in callback.query_pairs() {
        let value = Some(value.into_owned());
        match key.as_ref() {
            "code" => params.code = value,
            "state" => params.state = value,
            "error" => params.error = value,
            "error_description" => params.error_description = value,
            _ => {}
        }
    }

    service.handle_callback(&store, &params).await?;
    let attributes = service.fetch_attributes().await?;
    println!("{}", serde_json::to_string_pretty(attributes)?);

    Ok(())
}
