//! CLI command implementations.

pub mod admin;
pub mod migrate;

use secrecy::SecretString;

/// Read the database URL the site uses, loading `.env` first.
pub(crate) fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();
    std::env::var("SAVERS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "SAVERS_DATABASE_URL")
}
