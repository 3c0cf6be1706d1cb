use std::env;
use std::path::PathBuf;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Secret key for the payment gateway API.
    pub stripe_secret_key: String,
    /// Shared secret for webhook signature verification.
    pub stripe_webhook_secret: String,
    /// Key signing guest exchange credentials.
    pub token_signing_secret: String,
    /// Base URL of the guest-facing web app (join links).
    pub web_base_url: String,
    /// Root directory for generated download archives.
    pub archive_root: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/moments".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            token_signing_secret: env::var("TOKEN_SIGNING_SECRET")
                .unwrap_or_else(|_| "dev-signing-secret".to_string()),
            web_base_url: env::var("WEB_APP_URL")
                .unwrap_or_else(|_| "https://weddingmoments.app".to_string()),
            archive_root: env::var("ARCHIVE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./archives")),
        }
    }
}
